use anyhow::Result;

use crate::db::{BoundingBox, Store};
use crate::entities::mechanics;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Coarse pre-filter box around a center point. Longitude degrees shrink
/// with latitude, so the box widens accordingly; near the poles the
/// cosine collapses and we fall back to a full longitude sweep.
#[must_use]
pub fn bounding_box(lat: f64, lng: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();

    let cos_lat = lat.to_radians().cos();
    let lng_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        lat_delta / cos_lat
    };

    BoundingBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lng: (lng - lng_delta).max(-180.0),
        max_lng: (lng + lng_delta).min(180.0),
    }
}

/// A mechanic together with their distance from the query point.
#[derive(Debug, Clone)]
pub struct NearbyMechanic {
    pub mechanic: mechanics::Model,
    pub distance_km: f64,
}

#[derive(Clone)]
pub struct GeoService {
    store: Store,
}

impl GeoService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Online, approved mechanics within `radius_km` of the query point,
    /// closest first. The box query trims candidates; the exact distance
    /// check decides membership.
    pub async fn find_nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyMechanic>> {
        let bbox = bounding_box(lat, lng, radius_km);
        let candidates = self.store.find_available_mechanics_in_box(bbox).await?;

        let mut nearby: Vec<NearbyMechanic> = candidates
            .into_iter()
            .filter_map(|mechanic| {
                let distance_km = haversine_km(lat, lng, mechanic.latitude, mechanic.longitude);
                (distance_km <= radius_km).then_some(NearbyMechanic {
                    mechanic,
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        Ok(nearby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_for_same_point() {
        let d = haversine_km(12.9716, 77.5946, 12.9716, 77.5946);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_haversine_within_city() {
        // MG Road to Koramangala, Bengaluru: roughly 5 km apart.
        let d = haversine_km(12.9716, 77.5946, 12.9352, 77.6245);
        assert!(d > 3.0 && d < 7.0, "got {d}");
    }

    #[test]
    fn test_haversine_between_cities() {
        // Bengaluru to Mumbai: roughly 840 km.
        let d = haversine_km(12.9716, 77.5946, 19.1136, 72.8697);
        assert!(d > 800.0 && d < 900.0, "got {d}");
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_km(12.9716, 77.5946, 19.1136, 72.8697);
        let b = haversine_km(19.1136, 72.8697, 12.9716, 77.5946);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_contains_points_within_radius() {
        let bbox = bounding_box(12.9716, 77.5946, 10.0);

        // A point ~5 km away must survive the coarse filter.
        assert!(bbox.min_lat <= 12.9352 && 12.9352 <= bbox.max_lat);
        assert!(bbox.min_lng <= 77.6245 && 77.6245 <= bbox.max_lng);
    }

    #[test]
    fn test_bounding_box_widens_longitude_at_high_latitude() {
        let equator = bounding_box(0.0, 0.0, 10.0);
        let arctic = bounding_box(70.0, 0.0, 10.0);

        let equator_width = equator.max_lng - equator.min_lng;
        let arctic_width = arctic.max_lng - arctic.min_lng;
        assert!(arctic_width > equator_width);
    }

    #[test]
    fn test_bounding_box_clamps_at_pole() {
        let bbox = bounding_box(89.99, 0.0, 50.0);
        assert!(bbox.max_lat <= 90.0);
        assert!(bbox.min_lng >= -180.0 && bbox.max_lng <= 180.0);
    }
}
