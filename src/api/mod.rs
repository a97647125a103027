use axum::{
    Json,
    Router,
    extract::State,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
mod error;
pub mod gate;
mod mechanics;
mod types;

pub use error::ApiError;
pub use types::*;

use crate::config::Config;
use crate::db::Store;
use crate::services::geo::GeoService;
use crate::services::session::SessionService;
use crate::services::token::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub tokens: TokenService,

    pub sessions: SessionService,

    pub geo: GeoService,

    pub start_time: std::time::Instant,
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    create_app_state(config, store)
}

pub fn create_app_state(config: Config, store: Store) -> anyhow::Result<Arc<AppState>> {
    let tokens = TokenService::new(
        &Config::access_secret(),
        &Config::refresh_secret(),
        Duration::minutes(config.auth.access_ttl_minutes),
        Duration::days(config.auth.refresh_ttl_days),
    );

    let sessions = SessionService::new(store.clone(), tokens.clone(), &config.auth);
    let geo = GeoService::new(store.clone());

    Ok(Arc::new(AppState {
        config,
        store,
        tokens,
        sessions,
        geo,
        start_time: std::time::Instant::now(),
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = Router::new()
        .route("/mechanics/nearby", get(mechanics::nearby))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/send-otp", post(auth::send_otp))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/system/status", get(system_status))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn_with_state(state, gate::edge_gate))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemStatus {
    status: &'static str,
    database: &'static str,
    uptime_seconds: u64,
}

/// GET /system/status
async fn system_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let database = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "unreachable"
    };

    Json(ApiResponse::success(SystemStatus {
        status: "running",
        database,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }))
}
