use serde::{Deserialize, Serialize};

use crate::entities::{mechanics, users};
use crate::services::geo::NearbyMechanic;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub phone: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub message: String,
    /// Only present in demo mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
    /// Accepted for wire compatibility; the role bound at send-otp wins.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Optional so an omitted field maps to one "missing token" branch.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub phone: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<users::Model> for UserDto {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            phone: user.phone,
            role: user.role.to_string(),
            name: user.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyMechanicDto {
    pub id: i32,
    pub workshop_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

impl From<NearbyMechanic> for NearbyMechanicDto {
    fn from(nearby: NearbyMechanic) -> Self {
        let mechanics::Model {
            id,
            workshop_name,
            latitude,
            longitude,
            ..
        } = nearby.mechanic;

        Self {
            id,
            workshop_name,
            latitude,
            longitude,
            // Two decimals is plenty for a map pin.
            distance_km: (nearby.distance_km * 100.0).round() / 100.0,
        }
    }
}
