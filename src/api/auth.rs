use axum::{
    Json,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::str::FromStr;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, MessageResponse, RefreshRequest, SendOtpRequest,
    SendOtpResponse, SessionResponse, VerifyOtpRequest,
};
use crate::entities::users::Role;
use crate::services::session::SessionTokens;

pub const ACCESS_COOKIE: &str = "access_token";

// ============================================================================
// Middleware
// ============================================================================

/// Strict per-route auth: a valid access token or 401. The verified
/// claims land in request extensions for handlers to pick up.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_token(request.headers()) else {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    let Some(claims) = state.tokens.verify_access_token(&token) else {
        return Err(ApiError::TokenRejected);
    };

    tracing::Span::current().record("user_id", claims.sub.as_str());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Single place a bearer credential is pulled from a request: the
/// `access_token` cookie first, then `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookie_value(headers, ACCESS_COOKIE) {
        return Some(token);
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    None
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/send-otp
/// Issue a one-time code for the phone, creating no account yet.
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse<SendOtpResponse>>, ApiError> {
    let role = Role::from_str(&payload.role)
        .map_err(|_| ApiError::validation(format!("Unknown role '{}'", payload.role)))?;

    let otp = state.sessions.request_otp(&payload.phone, role).await?;

    Ok(Json(ApiResponse::success(SendOtpResponse {
        message: "OTP sent".to_string(),
        otp,
    })))
}

/// POST /auth/verify-otp
/// Exchange a valid code for a token pair; first login creates the
/// account with the requested role.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .sessions
        .verify_otp(&payload.phone, &payload.otp)
        .await?;

    Ok(session_response(&state, session))
}

/// POST /auth/refresh-token
/// Rotate the refresh token; the presented one is spent either way.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(raw) = refresh_token_from(&body) else {
        return Err(ApiError::validation("Missing refresh token"));
    };

    let session = state.sessions.refresh(&raw).await?;

    Ok(session_response(&state, session))
}

/// POST /auth/logout
/// Revoke the refresh token and clear the access cookie. Idempotent.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(raw) = refresh_token_from(&body) {
        state.sessions.logout(&raw).await?;
    }

    let mut response = Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
    .into_response();

    append_cookie(&mut response, &clear_cookie(ACCESS_COOKIE));

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

/// Refresh credential from the request body. The refresh token is never
/// carried in a cookie: it would ride along on every site request, while
/// it belongs only to the dedicated refresh and logout calls.
fn refresh_token_from(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<RefreshRequest>(body)
        .ok()
        .and_then(|payload| payload.refresh_token)
}

fn session_response(state: &AppState, session: SessionTokens) -> Response {
    let access_ttl_secs = state.config.auth.access_ttl_minutes * 60;

    let body = SessionResponse {
        access_token: session.access_token.clone(),
        refresh_token: session.refresh_token,
        user: session.user.into(),
    };

    let mut response = Json(ApiResponse::success(body)).into_response();

    append_cookie(
        &mut response,
        &session_cookie(ACCESS_COOKIE, &session.access_token, access_ttl_secs),
    );

    response
}

fn session_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!("{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax")
}

pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

pub fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}
