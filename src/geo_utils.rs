//! Geographic utilities.

use crate::GpsPoint;

/// Great-circle distance between two GPS points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    use geo::{Distance, Haversine, Point};
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Offset a point by `meters` due north.
///
/// Uses the spherical approximation `1° latitude ≈ 111 195 m`, which matches
/// [`haversine_distance`] along a meridian.
pub fn offset_north(point: &GpsPoint, meters: f64) -> GpsPoint {
    GpsPoint::new(point.latitude + meters / METERS_PER_DEGREE, point.longitude)
}

/// Meters per degree of latitude on the mean-radius sphere used by `geo`.
const METERS_PER_DEGREE: f64 = 6_371_008.8 * std::f64::consts::PI / 180.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // London to Paris: ~344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!((dist - 343_500.0).abs() < 2_000.0);
    }

    #[test]
    fn test_zero_distance() {
        let p = GpsPoint::new(47.0, 8.0);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_offset_north_round_trip() {
        let start = GpsPoint::new(47.3769, 8.5417);
        let moved = offset_north(&start, 12.0);
        assert!((haversine_distance(&start, &moved) - 12.0).abs() < 1e-3);
    }
}
