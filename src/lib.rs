//! # Visit Analytics
//!
//! Travel-visit statistics from a chronological sequence of GPS pings.
//!
//! This library provides:
//! - Point-in-polygon containment over country and city boundary polygons
//! - Gazetteer lookup to pin homonymous city names to canonical coordinates
//! - Run-length visit aggregation per city and per country
//! - Stable single-column sorting for statistics tables
//!
//! ## Features
//!
//! - **`parallel`** - Resolve countries for large ping sets with rayon
//! - **`http`** - Load reference data over HTTP and reverse geocode with Nominatim
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use visit_analytics::{compute_visit_stats, Ping, ReferenceData, VisitConfig};
//!
//! let pings = vec![
//!     Ping::new(48.8566, 2.3522, Some(1_700_000_000_000)).with_city("Paris"),
//!     Ping::new(48.8600, 2.3400, Some(1_700_000_600_000)).with_city("Paris"),
//!     Ping::new(51.5074, -0.1278, Some(1_700_100_000_000)).with_city("London"),
//! ];
//!
//! let stats = compute_visit_stats(&pings, &ReferenceData::default(), &VisitConfig::default());
//! assert_eq!(stats.cities.len(), 2);
//! assert_eq!(stats.cities[0].visits, 1);
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Result, VisitError};

pub mod geo_utils;

// Crossing-number containment over geo polygons
pub mod geometry;
pub use geometry::{contains, geometry_from_geojson, multi_polygon_contains, polygon_contains};

// Ordered named polygons (countries, city boundaries)
pub mod regions;
pub use regions::{resolve_country, Region, RegionIndex};

// GeoNames-style reference table for city coordinates
pub mod gazetteer;
pub use gazetteer::{Gazetteer, GazetteerEntry, Resolution};

// Run-length visit aggregation
pub mod aggregate;
pub use aggregate::{
    calendar_day, compute_visit_stats, sort_pings, CitySummary, CountrySummary, ReferenceData,
    VisitStats, VisitTotals,
};

// Sorting and formatting for statistics tables
pub mod projection;
pub use projection::{
    format_last_visited, sort_cities, sort_countries, CitySortKey, CountrySortKey, SortDirection,
    SortState,
};

// Ping source collaborator and update subscriptions
pub mod source;
pub use source::{
    annotate_missing_cities, has_ping_on_day, parse_pings_json, parse_point_features, PingSource,
    PingStore, ReverseGeocoder, Subscribers, Subscription, UpdateCallback,
};

// Generation-guarded recomputation
pub mod refresh;
pub use refresh::{RefreshOutcome, RefreshTicket, StatsRefresher};

// HTTP module for reference data and reverse geocoding
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{annotate_missing_cities_buffered, load_reference, NominatimGeocoder};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("VisitAnalyticsRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use visit_analytics::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One timestamped geolocation sample.
///
/// `timestamp` is epoch milliseconds. A missing timestamp is its own state:
/// such pings sort after every timestamped ping and never count towards
/// days present or last-visited times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Ping {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// City name, usually filled in by reverse geocoding when the ping was saved
    #[serde(default, alias = "City")]
    pub city: Option<String>,
    /// Pre-resolved country name; resolved from polygons when absent
    #[serde(default)]
    pub country: Option<String>,
}

impl Ping {
    /// Create a ping without city or country information.
    pub fn new(lat: f64, lng: f64, timestamp: Option<i64>) -> Self {
        Self {
            lat,
            lng,
            timestamp,
            accuracy: None,
            city: None,
            country: None,
        }
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lng)
    }

    /// Trimmed city name, `None` when missing or blank.
    pub fn city_name(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Trimmed country name, `None` when missing or blank.
    pub fn country_name(&self) -> Option<&str> {
        self.country.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Configuration for visit aggregation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VisitConfig {
    /// Maximum distance between a city's averaged position and a gazetteer
    /// entry of the same name for the entry to be accepted.
    /// Default: 200.0 km
    pub gazetteer_max_distance_km: f64,

    /// Fixed offset from UTC, in minutes, used to derive calendar days.
    /// Default: 0 (UTC). Never the host's local zone.
    pub day_offset_minutes: i32,

    /// Bucket name for pings whose country could not be resolved.
    /// Tracked for visit runs but never emitted as a country row.
    /// Default: "Unknown"
    pub unknown_country_label: String,

    /// Name pings that lack a city from the city boundary polygons, if any.
    /// Default: true
    pub resolve_city_boundaries: bool,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            gazetteer_max_distance_km: 200.0,
            day_offset_minutes: 0,
            unknown_country_label: "Unknown".to_string(),
            resolve_city_boundaries: true,
        }
    }
}

impl VisitConfig {
    /// Reject configurations that would make results meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.gazetteer_max_distance_km.is_finite() || self.gazetteer_max_distance_km < 0.0 {
            return Err(VisitError::Config {
                message: format!(
                    "gazetteer_max_distance_km must be a non-negative number, got {}",
                    self.gazetteer_max_distance_km
                ),
            });
        }
        if aggregate::clamp_day_offset(self.day_offset_minutes) != self.day_offset_minutes {
            return Err(VisitError::Config {
                message: format!(
                    "day_offset_minutes must be within +-{}, got {}",
                    aggregate::MAX_DAY_OFFSET_MINUTES,
                    self.day_offset_minutes
                ),
            });
        }
        Ok(())
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Compute visit statistics from pings and optional raw reference data.
    ///
    /// `gazetteer_tsv` is the content of a GeoNames cities file and
    /// `countries_geojson` a country FeatureCollection. Unreadable reference
    /// data degrades to an empty gazetteer / no country resolution.
    #[uniffi::export]
    pub fn ffi_compute_visit_stats(
        pings: Vec<Ping>,
        gazetteer_tsv: Option<String>,
        countries_geojson: Option<String>,
        config: VisitConfig,
    ) -> VisitStats {
        init_logging();
        info!("[VisitAnalyticsRust] compute_visit_stats called with {} pings", pings.len());

        let gazetteer = gazetteer_tsv
            .map(|text| Gazetteer::parse(&text))
            .unwrap_or_default();
        let countries = countries_geojson
            .and_then(|text| match RegionIndex::from_geojson(&text) {
                Ok(index) => Some(index),
                Err(e) => {
                    log::warn!("[VisitAnalyticsRust] Ignoring country polygons: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        let reference = ReferenceData {
            countries,
            gazetteer,
            ..ReferenceData::default()
        };
        compute_visit_stats(&pings, &reference, &config)
    }

    /// Parse stored pings from JSON, skipping malformed records.
    #[uniffi::export]
    pub fn ffi_parse_pings_json(text: String) -> Vec<Ping> {
        init_logging();
        source::parse_pings_json(&text).unwrap_or_default()
    }

    /// Sort city rows by a single column.
    #[uniffi::export]
    pub fn ffi_sort_cities(
        rows: Vec<CitySummary>,
        key: CitySortKey,
        direction: SortDirection,
    ) -> Vec<CitySummary> {
        sort_cities(&rows, key, direction)
    }

    /// Sort country rows by a single column.
    #[uniffi::export]
    pub fn ffi_sort_countries(
        rows: Vec<CountrySummary>,
        key: CountrySortKey,
        direction: SortDirection,
    ) -> Vec<CountrySummary> {
        sort_countries(&rows, key, direction)
    }

    /// Fill in missing city names by reverse geocoding with Nominatim.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn ffi_annotate_missing_cities(pings: Vec<Ping>) -> Vec<Ping> {
        init_logging();
        info!("[VisitAnalyticsRust] annotate_missing_cities called with {} pings", pings.len());
        http::annotate_missing_cities_sync(pings)
    }

    /// Display string for a last-visited timestamp.
    #[uniffi::export]
    pub fn ffi_format_last_visited(timestamp: Option<i64>) -> String {
        format_last_visited(timestamp)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_visit_config() -> VisitConfig {
        init_logging();
        info!("[VisitAnalyticsRust] default_visit_config called - Rust is active!");
        VisitConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_ping_names_are_trimmed() {
        let ping = Ping::new(0.0, 0.0, None).with_city("  Lyon ").with_country("   ");
        assert_eq!(ping.city_name(), Some("Lyon"));
        assert_eq!(ping.country_name(), None);
    }

    #[test]
    fn test_ping_deserialize_without_timestamp() {
        let ping: Ping = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5, "City": "Oslo"}"#).unwrap();
        assert_eq!(ping.timestamp, None);
        assert_eq!(ping.city_name(), Some("Oslo"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(VisitConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let config = VisitConfig {
            gazetteer_max_distance_km: f64::NAN,
            ..VisitConfig::default()
        };
        assert!(matches!(config.validate(), Err(VisitError::Config { .. })));

        let config = VisitConfig {
            day_offset_minutes: 20 * 60,
            ..VisitConfig::default()
        };
        assert!(config.validate().is_err());

        let edge = VisitConfig {
            day_offset_minutes: -aggregate::MAX_DAY_OFFSET_MINUTES,
            ..VisitConfig::default()
        };
        assert!(edge.validate().is_ok());
        let past_edge = VisitConfig {
            day_offset_minutes: i32::MIN,
            ..VisitConfig::default()
        };
        assert!(past_edge.validate().is_err());
    }
}
