use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, NearbyMechanicDto};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Kilometers; falls back to the configured platform default.
    pub radius: Option<f64>,
}

/// GET /mechanics/nearby
/// Online, approved mechanics within the radius, closest first.
pub async fn nearby(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<ApiResponse<Vec<NearbyMechanicDto>>>, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) {
        return Err(ApiError::validation("Latitude must be within [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&query.lng) {
        return Err(ApiError::validation("Longitude must be within [-180, 180]"));
    }

    let radius_km = query.radius.unwrap_or(state.config.geo.default_radius_km);

    if radius_km <= 0.0 {
        return Err(ApiError::validation("Radius must be positive"));
    }

    let radius_km = radius_km.min(state.config.geo.max_radius_km);

    let nearby = state.geo.find_nearby(query.lat, query.lng, radius_km).await?;

    Ok(Json(ApiResponse::success(
        nearby.into_iter().map(NearbyMechanicDto::from).collect(),
    )))
}
