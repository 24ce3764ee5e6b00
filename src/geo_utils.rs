//! # Geographic Utilities
//!
//! Distance and averaging helpers shared by the gazetteer and the visit
//! aggregator.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points in meters |
//! | [`haversine_km`] | Same, in kilometers |
//! | [`CoordinateSum`] | Running sum of coordinates for an arithmetic centroid |
//! | [`compute_center`] | Centroid of a slice of points |
//!
//! ## Example
//!
//! ```rust
//! use visit_analytics::{GpsPoint, geo_utils};
//!
//! let london = GpsPoint::new(51.5074, -0.1278);
//! let paris = GpsPoint::new(48.8566, 2.3522);
//!
//! let km = geo_utils::haversine_km(&london, &paris);
//! assert!((km - 343.5).abs() < 5.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine formula on a sphere with the IUGG mean Earth
//! radius of 6371.0088 km, the radius `geo`'s [`Haversine`] uses.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use geo::{Distance, Haversine, Point};
use crate::GpsPoint;

/// Mean Earth radius used for all great-circle distances.
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0088;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use visit_analytics::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance in kilometers.
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Running sum of coordinates, used to average the pings attributed to a place.
///
/// Non-finite coordinates are ignored so that one corrupt sample cannot turn
/// the whole average into NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateSum {
    sum_lat: f64,
    sum_lng: f64,
    count: u32,
}

impl CoordinateSum {
    /// Add a sample. Returns `false` if the sample was ignored.
    pub fn add(&mut self, lat: f64, lng: f64) -> bool {
        if !lat.is_finite() || !lng.is_finite() {
            return false;
        }
        self.sum_lat += lat;
        self.sum_lng += lng;
        self.count += 1;
        true
    }

    /// Number of samples accumulated.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Arithmetic mean of the samples, `None` if there are none.
    pub fn mean(&self) -> Option<GpsPoint> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(GpsPoint::new(self.sum_lat / n, self.sum_lng / n))
    }
}

/// Compute the arithmetic centroid of a set of points.
///
/// Returns `None` for empty input.
///
/// # Notes
///
/// For points spanning the antimeridian (180°/-180° longitude) this simple
/// averaging is wrong. Visits to a single city never span it in practice.
///
/// # Example
///
/// ```rust
/// use visit_analytics::{GpsPoint, geo_utils};
///
/// let points = vec![
///     GpsPoint::new(51.50, -0.10),
///     GpsPoint::new(51.52, -0.12),
/// ];
///
/// let center = geo_utils::compute_center(&points).unwrap();
/// assert!((center.latitude - 51.51).abs() < 0.001);
/// assert!((center.longitude - (-0.11)).abs() < 0.001);
/// ```
pub fn compute_center(points: &[GpsPoint]) -> Option<GpsPoint> {
    let mut sum = CoordinateSum::default();
    for p in points {
        sum.add(p.latitude, p.longitude);
    }
    sum.mean()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
    }

    #[test]
    fn test_haversine_km_uses_mean_radius() {
        // A quarter of a great circle along the equator
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 90.0);
        let expected = MEAN_EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!(approx_eq(haversine_km(&a, &b), expected, 0.01));
    }

    #[test]
    fn test_coordinate_sum_mean() {
        let mut sum = CoordinateSum::default();
        sum.add(10.0, 20.0);
        sum.add(12.0, 22.0);
        let mean = sum.mean().unwrap();
        assert_eq!(sum.count(), 2);
        assert!(approx_eq(mean.latitude, 11.0, 1e-12));
        assert!(approx_eq(mean.longitude, 21.0, 1e-12));
    }

    #[test]
    fn test_coordinate_sum_ignores_non_finite() {
        let mut sum = CoordinateSum::default();
        assert!(!sum.add(f64::NAN, 1.0));
        assert!(sum.mean().is_none());
        assert!(sum.add(1.0, 1.0));
        assert_eq!(sum.count(), 1);
    }

    #[test]
    fn test_compute_center_empty() {
        let empty: Vec<GpsPoint> = vec![];
        assert!(compute_center(&empty).is_none());
    }
}
