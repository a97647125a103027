use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::mechanics;

/// Lat/lng rectangle used by the proximity pre-filter.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

pub struct MechanicRepository {
    conn: DatabaseConnection,
}

impl MechanicRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(
        &self,
        user_id: &str,
        workshop_name: &str,
        latitude: f64,
        longitude: f64,
        online: bool,
        approved: bool,
    ) -> Result<mechanics::Model> {
        mechanics::ActiveModel {
            user_id: Set(user_id.to_string()),
            workshop_name: Set(workshop_name.to_string()),
            latitude: Set(latitude),
            longitude: Set(longitude),
            online: Set(online),
            approved: Set(approved),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert mechanic")
    }

    /// Status filtering happens in the same query as the box comparison,
    /// before the Haversine pass ever sees a candidate.
    pub async fn find_available_in_box(&self, bbox: BoundingBox) -> Result<Vec<mechanics::Model>> {
        mechanics::Entity::find()
            .filter(mechanics::Column::Online.eq(true))
            .filter(mechanics::Column::Approved.eq(true))
            .filter(mechanics::Column::Latitude.between(bbox.min_lat, bbox.max_lat))
            .filter(mechanics::Column::Longitude.between(bbox.min_lng, bbox.max_lng))
            .all(&self.conn)
            .await
            .context("Failed to query mechanics in bounding box")
    }
}
