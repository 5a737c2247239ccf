//! Haversine distance function (used when no road network is available).
//!
//! Great-circle distance ignores roads, which is adequate for comparing
//! stop orders but not for navigation.

use crate::models::Coordinate;
use crate::traits::{DistanceFunction, StoreResult};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineDistance;

impl HaversineDistance {
    /// Calculate haversine distance between two (lat, lng) points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

impl DistanceFunction for HaversineDistance {
    fn distance_meters(&self, from: &Coordinate, to: &Coordinate) -> StoreResult<f64> {
        if from.same_position(to) {
            return Ok(0.0);
        }
        Ok(Self::haversine_km(from.lat_lng(), to.lat_lng()) * 1000.0)
    }
}
