use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::AppState;
use super::auth::{ACCESS_COOKIE, append_cookie, clear_cookie, extract_token};
use crate::services::token::TokenCheck;

/// Page prefixes that require a session before the app shell is served.
const PROTECTED_PREFIXES: &[&str] = &[
    "/dashboard",
    "/breakdowns",
    "/mechanics",
    "/workshops",
    "/marketplace",
    "/orders",
    "/disputes",
    "/analytics",
    "/settings",
];

const LOGIN_PATH: &str = "/login";

/// Edge gate over page navigation. API routes carry their own strict
/// auth and pass straight through; protected pages bounce to the login
/// page when no credible token is present.
///
/// An expired token with a good signature is let through: the page
/// shell loads and the client refreshes the session in the background,
/// instead of punting a returning user to the login screen.
pub async fn edge_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if !is_protected_page(&path) {
        return next.run(request).await;
    }

    let Some(token) = extract_token(request.headers()) else {
        debug!(path = %path, "no token on protected page, redirecting");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    match state.tokens.check_access_token(&token) {
        TokenCheck::Valid(_) | TokenCheck::Expired => next.run(request).await,
        TokenCheck::Invalid => {
            debug!(path = %path, "invalid token on protected page, clearing cookie");
            let mut response = Redirect::to(LOGIN_PATH).into_response();
            append_cookie(&mut response, &clear_cookie(ACCESS_COOKIE));
            response
        }
    }
}

fn is_protected_page(path: &str) -> bool {
    if path.starts_with("/api/") || is_static_asset(path) {
        return false;
    }

    PROTECTED_PREFIXES.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn is_static_asset(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.to_str().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_prefix_matching() {
        assert!(is_protected_page("/dashboard"));
        assert!(is_protected_page("/dashboard/overview"));
        assert!(is_protected_page("/mechanics/42"));
        assert!(!is_protected_page("/"));
        assert!(!is_protected_page("/login"));
        assert!(!is_protected_page("/dashboarding"));
    }

    #[test]
    fn test_api_routes_are_not_gated() {
        assert!(!is_protected_page("/api/auth/send-otp"));
        assert!(!is_protected_page("/api/mechanics/nearby"));
    }

    #[test]
    fn test_static_assets_pass_through() {
        assert!(!is_protected_page("/dashboard/app.js"));
        assert!(!is_protected_page("/settings/logo.png"));
    }
}
