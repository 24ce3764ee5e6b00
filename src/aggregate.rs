//! Visit aggregation.
//!
//! Turns a ping history into per-city and per-country statistics. A *visit*
//! is a maximal run of consecutive pings (in time order) attributed to the
//! same place: arriving in Lyon, dwelling, leaving and coming back a week
//! later is two visits, however many pings each stay produced.
//!
//! The pass is an explicit fold. A [`FoldState`] owning one arena of tallies
//! per place kind is moved through the sorted pings; each arena addresses
//! its tallies by integer index and remembers which place the previous ping
//! was in. Output order is the order in which places first appear, so the
//! same input always produces the same output.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, FixedOffset, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::gazetteer::Gazetteer;
use crate::geo_utils::CoordinateSum;
use crate::regions::RegionIndex;
use crate::{GpsPoint, Ping, VisitConfig};

/// Per-city statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CitySummary {
    /// City name; "" is reserved for "no city known" and never emitted
    pub key: String,
    /// Number of separate runs of consecutive pings in this city
    pub visits: u32,
    /// Most recent timestamp seen in this city (epoch ms)
    pub last_visited_ts: Option<i64>,
    /// Distinct calendar days with at least one timestamped ping
    pub days_present: u32,
    /// Representative coordinate: gazetteer match if plausible, else average
    pub representative_lat: Option<f64>,
    pub representative_lng: Option<f64>,
    /// Pings attributed to this city with usable coordinates
    pub sample_count: u32,
    /// True if the representative coordinate came from the gazetteer
    pub resolved_from_gazetteer: bool,
}

/// Per-country statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CountrySummary {
    pub country: String,
    pub visits: u32,
    pub last_visited_ts: Option<i64>,
    pub days_present: u32,
    /// Distinct named cities seen while in this country
    pub distinct_cities_visited: u32,
}

/// Headline numbers for a statistics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VisitTotals {
    pub total_pings: u32,
    pub distinct_cities: u32,
    pub distinct_countries: u32,
}

/// Complete aggregation result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VisitStats {
    pub cities: Vec<CitySummary>,
    pub countries: Vec<CountrySummary>,
    pub totals: VisitTotals,
}

/// Reference data the aggregator resolves places against.
///
/// Every part may be empty: no country polygons means every country is
/// unknown, an empty gazetteer means every city keeps its averaged position.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Country polygons, in match-priority order
    pub countries: RegionIndex,
    /// Optional city boundary polygons naming pings that carry no city
    pub city_boundaries: RegionIndex,
    pub gazetteer: Gazetteer,
}

impl ReferenceData {
    /// Load reference files, degrading any unreadable file to empty data.
    pub fn load_or_default(
        gazetteer_path: Option<&std::path::Path>,
        countries_path: Option<&std::path::Path>,
    ) -> Self {
        Self {
            countries: countries_path
                .map(RegionIndex::from_path_or_empty)
                .unwrap_or_default(),
            city_boundaries: RegionIndex::default(),
            gazetteer: gazetteer_path
                .map(Gazetteer::from_path_or_empty)
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Ordering and calendar days
// ============================================================================

/// Chronological order: timestamp ascending, pings without a timestamp last,
/// ties (and the untimestamped tail) in original order.
pub fn sort_pings(pings: &[Ping]) -> Vec<&Ping> {
    let mut sorted: Vec<&Ping> = pings.iter().collect();
    // Stable: equal keys keep insertion order
    sorted.sort_by_key(|p| (p.timestamp.is_none(), p.timestamp));
    sorted
}

/// Largest accepted distance from UTC for day boundaries, in minutes (18h).
pub const MAX_DAY_OFFSET_MINUTES: i32 = 18 * 60;

/// Offset clamped to +-[`MAX_DAY_OFFSET_MINUTES`].
pub fn clamp_day_offset(offset_minutes: i32) -> i32 {
    offset_minutes.clamp(-MAX_DAY_OFFSET_MINUTES, MAX_DAY_OFFSET_MINUTES)
}

/// Calendar day of an epoch-millisecond timestamp at a fixed UTC offset.
///
/// Offsets beyond +-18h are clamped to +-18h.
pub fn calendar_day(timestamp_ms: i64, offset_minutes: i32) -> Option<NaiveDate> {
    let utc = DateTime::from_timestamp_millis(timestamp_ms)?;
    let offset = FixedOffset::east_opt(clamp_day_offset(offset_minutes) * 60)?;
    Some(utc.with_timezone(&offset).date_naive())
}

// ============================================================================
// Fold state
// ============================================================================

/// Where one ping was.
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    city: Option<String>,
    city_from_boundary: bool,
    country: Option<String>,
}

/// Resolve city and country for one ping. Runs once per ping.
fn locate(ping: &Ping, reference: &ReferenceData, config: &VisitConfig) -> Placement {
    let point = ping.point();

    let (city, city_from_boundary) = match ping.city_name() {
        Some(city) => (Some(city.to_string()), false),
        None if config.resolve_city_boundaries => {
            let city = reference.city_boundaries.resolve(&point).map(str::to_string);
            let from_boundary = city.is_some();
            (city, from_boundary)
        }
        None => (None, false),
    };

    let country = match ping.country_name() {
        Some(country) => Some(country.to_string()),
        None => reference.countries.resolve(&point).map(str::to_string),
    };

    Placement {
        city,
        city_from_boundary,
        country,
    }
}

#[cfg(feature = "parallel")]
fn locate_all(sorted: &[&Ping], reference: &ReferenceData, config: &VisitConfig) -> Vec<Placement> {
    use rayon::prelude::*;
    sorted
        .par_iter()
        .map(|ping| locate(ping, reference, config))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn locate_all(sorted: &[&Ping], reference: &ReferenceData, config: &VisitConfig) -> Vec<Placement> {
    sorted
        .iter()
        .map(|ping| locate(ping, reference, config))
        .collect()
}

/// What one ping contributes to the tally of the place it is in.
struct Observation<'a> {
    lat: f64,
    lng: f64,
    timestamp: Option<i64>,
    day: Option<NaiveDate>,
    city: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct PlaceTally {
    name: String,
    visits: u32,
    coords: CoordinateSum,
    days: BTreeSet<NaiveDate>,
    last_ts: Option<i64>,
    cities: BTreeSet<String>,
    from_boundary: bool,
}

impl PlaceTally {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visits: 0,
            coords: CoordinateSum::default(),
            days: BTreeSet::new(),
            last_ts: None,
            cities: BTreeSet::new(),
            from_boundary: false,
        }
    }
}

/// Arena of tallies for one kind of place, plus the run cursor.
#[derive(Debug, Default)]
struct PlaceRuns {
    tallies: Vec<PlaceTally>,
    index: HashMap<String, usize>,
    /// Tally of the place the previous ping was in
    last: Option<usize>,
}

impl PlaceRuns {
    /// The ping is in no known place: any current run ends.
    fn leave(mut self) -> Self {
        self.last = None;
        self
    }

    fn observe(mut self, name: &str, obs: &Observation<'_>) -> Self {
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                self.tallies.push(PlaceTally::new(name));
                let slot = self.tallies.len() - 1;
                self.index.insert(name.to_string(), slot);
                slot
            }
        };

        let tally = &mut self.tallies[slot];
        if self.last != Some(slot) {
            tally.visits += 1;
        }
        tally.coords.add(obs.lat, obs.lng);
        if let Some(ts) = obs.timestamp {
            tally.last_ts = Some(tally.last_ts.map_or(ts, |last| last.max(ts)));
        }
        if let Some(day) = obs.day {
            tally.days.insert(day);
        }
        if let Some(city) = obs.city {
            tally.cities.insert(city.to_string());
        }

        self.last = Some(slot);
        self
    }

    fn mark_from_boundary(mut self, name: &str) -> Self {
        if let Some(&slot) = self.index.get(name) {
            self.tallies[slot].from_boundary = true;
        }
        self
    }
}

#[derive(Debug, Default)]
struct FoldState {
    cities: PlaceRuns,
    countries: PlaceRuns,
}

impl FoldState {
    fn step(self, ping: &Ping, placement: &Placement, config: &VisitConfig) -> Self {
        let obs = Observation {
            lat: ping.lat,
            lng: ping.lng,
            timestamp: ping.timestamp,
            day: ping
                .timestamp
                .and_then(|ts| calendar_day(ts, config.day_offset_minutes)),
            city: placement.city.as_deref(),
        };

        let cities = match placement.city.as_deref() {
            Some(city) => {
                let runs = self.cities.observe(city, &obs);
                if placement.city_from_boundary {
                    runs.mark_from_boundary(city)
                } else {
                    runs
                }
            }
            None => self.cities.leave(),
        };

        let country = placement
            .country
            .as_deref()
            .unwrap_or(config.unknown_country_label.as_str());
        let countries = self.countries.observe(country, &obs);

        Self { cities, countries }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Aggregate a ping history into city and country statistics.
///
/// Pings may arrive in any order; they are sorted chronologically first.
/// This never fails: unresolvable places, malformed reference data and
/// missing timestamps are all absorbed.
///
/// # Example
///
/// ```rust
/// use visit_analytics::{compute_visit_stats, Ping, ReferenceData, VisitConfig};
///
/// let pings = vec![
///     Ping::new(45.76, 4.83, Some(1)).with_city("Lyon"),
///     Ping::new(48.85, 2.35, Some(2)).with_city("Paris"),
///     Ping::new(45.75, 4.84, Some(3)).with_city("Lyon"),
/// ];
///
/// let stats = compute_visit_stats(&pings, &ReferenceData::default(), &VisitConfig::default());
/// let lyon = stats.cities.iter().find(|c| c.key == "Lyon").unwrap();
/// assert_eq!(lyon.visits, 2);
/// ```
pub fn compute_visit_stats(
    pings: &[Ping],
    reference: &ReferenceData,
    config: &VisitConfig,
) -> VisitStats {
    let start = Instant::now();

    if clamp_day_offset(config.day_offset_minutes) != config.day_offset_minutes {
        warn!(
            "[VisitStats] day_offset_minutes {} out of range, clamped to {}",
            config.day_offset_minutes,
            clamp_day_offset(config.day_offset_minutes)
        );
    }

    let sorted = sort_pings(pings);
    let placements = locate_all(&sorted, reference, config);

    let state = sorted
        .iter()
        .zip(placements.iter())
        .fold(FoldState::default(), |state, (ping, placement)| {
            state.step(ping, placement, config)
        });

    let cities: Vec<CitySummary> = state
        .cities
        .tallies
        .iter()
        .map(|tally| summarize_city(tally, reference, config))
        .collect();

    let countries: Vec<CountrySummary> = state
        .countries
        .tallies
        .iter()
        .filter(|tally| !tally.name.is_empty() && tally.name != config.unknown_country_label)
        .map(summarize_country)
        .collect();

    let unknown = placements.iter().filter(|p| p.country.is_none()).count();
    if unknown > 0 {
        debug!("[VisitStats] {} pings with unresolved country", unknown);
    }

    let totals = VisitTotals {
        total_pings: pings.len() as u32,
        distinct_cities: cities.len() as u32,
        distinct_countries: countries.len() as u32,
    };

    info!(
        "[VisitStats] {} pings -> {} cities, {} countries in {:?}",
        totals.total_pings,
        totals.distinct_cities,
        totals.distinct_countries,
        start.elapsed()
    );

    VisitStats {
        cities,
        countries,
        totals,
    }
}

fn summarize_city(tally: &PlaceTally, reference: &ReferenceData, config: &VisitConfig) -> CitySummary {
    let (representative, resolved_from_gazetteer) = match tally.coords.mean() {
        Some(avg) => representative_point(tally, avg, reference, config),
        None => (None, false),
    };

    CitySummary {
        key: tally.name.clone(),
        visits: tally.visits,
        last_visited_ts: tally.last_ts,
        days_present: tally.days.len() as u32,
        representative_lat: representative.map(|p| p.latitude),
        representative_lng: representative.map(|p| p.longitude),
        sample_count: tally.coords.count(),
        resolved_from_gazetteer,
    }
}

/// Gazetteer match near the average, else the boundary centroid for cities
/// named by boundary polygons, else the average itself.
fn representative_point(
    tally: &PlaceTally,
    avg: GpsPoint,
    reference: &ReferenceData,
    config: &VisitConfig,
) -> (Option<GpsPoint>, bool) {
    let resolution = reference.gazetteer.resolve_within(
        &tally.name,
        avg.latitude,
        avg.longitude,
        config.gazetteer_max_distance_km,
    );
    if resolution.matched {
        return (Some(GpsPoint::new(resolution.lat, resolution.lng)), true);
    }

    if tally.from_boundary {
        if let Some(centroid) = reference
            .city_boundaries
            .get(&tally.name)
            .and_then(|region| region.centroid())
        {
            return (Some(centroid), false);
        }
    }

    (Some(avg), false)
}

fn summarize_country(tally: &PlaceTally) -> CountrySummary {
    CountrySummary {
        country: tally.name.clone(),
        visits: tally.visits,
        last_visited_ts: tally.last_ts,
        days_present: tally.days.len() as u32,
        distinct_cities_visited: tally.cities.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::GazetteerEntry;
    use crate::regions::Region;
    use geo::{polygon, MultiPolygon};

    const DAY_MS: i64 = 86_400_000;
    /// 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200_000;

    fn city_ping(city: &str, ts: i64) -> Ping {
        Ping::new(10.0, 10.0, Some(ts)).with_city(city)
    }

    fn stats(pings: &[Ping]) -> VisitStats {
        compute_visit_stats(pings, &ReferenceData::default(), &VisitConfig::default())
    }

    fn city<'a>(stats: &'a VisitStats, key: &str) -> &'a CitySummary {
        stats.cities.iter().find(|c| c.key == key).unwrap()
    }

    fn country<'a>(stats: &'a VisitStats, name: &str) -> Option<&'a CountrySummary> {
        stats.countries.iter().find(|c| c.country == name)
    }

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x, y: min_y + size),
            (x: min_x + size, y: min_y + size),
            (x: min_x + size, y: min_y),
        ]])
    }

    #[test]
    fn test_sort_pings_missing_timestamps_last() {
        let pings = vec![
            Ping::new(0.0, 0.0, None).with_city("n1"),
            Ping::new(0.0, 0.0, Some(5)).with_city("t5"),
            Ping::new(0.0, 0.0, Some(0)).with_city("t0"),
            Ping::new(0.0, 0.0, None).with_city("n2"),
            Ping::new(0.0, 0.0, Some(5)).with_city("t5b"),
        ];
        let order: Vec<&str> = sort_pings(&pings).iter().filter_map(|p| p.city_name()).collect();
        assert_eq!(order, vec!["t0", "t5", "t5b", "n1", "n2"]);
    }

    #[test]
    fn test_calendar_day_utc_and_offset() {
        // 2024-01-01T23:30:00Z
        let ts = JAN_1 + 23 * 3_600_000 + 30 * 60_000;
        assert_eq!(calendar_day(ts, 0), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(calendar_day(ts, 60), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(calendar_day(ts, -60), NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_calendar_day_clamps_offset_to_18h() {
        // 2024-01-01T07:00:00Z: 18h east is 01:00 the next day, 20h east 03:00
        let ts = JAN_1 + 7 * 3_600_000;
        assert_eq!(calendar_day(ts, 18 * 60), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(calendar_day(ts, 20 * 60), calendar_day(ts, 18 * 60));
        assert_eq!(calendar_day(ts, i32::MAX), calendar_day(ts, MAX_DAY_OFFSET_MINUTES));
        // Never silently UTC: -18h from 07:00 is 13:00 the previous day
        assert_eq!(calendar_day(ts, i32::MIN), NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    #[test]
    fn test_out_of_range_offset_is_clamped_not_utc() {
        // 2024-01-01T23:00:00Z is 2024-01-02 at any offset of +1h or more
        let pings = vec![
            city_ping("A", JAN_1 + 23 * 3_600_000),
            city_ping("A", JAN_1 + DAY_MS + 3_600_000),
        ];
        let config = VisitConfig {
            day_offset_minutes: 30 * 60,
            ..VisitConfig::default()
        };
        let stats = compute_visit_stats(&pings, &ReferenceData::default(), &config);
        // UTC would count two days; clamped +18h puts both on 2024-01-02
        assert_eq!(city(&stats, "A").days_present, 1);
    }

    #[test]
    fn test_visits_count_separate_runs() {
        let pings = vec![
            city_ping("A", 1),
            city_ping("A", 2),
            city_ping("B", 3),
            city_ping("A", 4),
        ];
        let stats = stats(&pings);
        assert_eq!(city(&stats, "A").visits, 2);
        assert_eq!(city(&stats, "B").visits, 1);
    }

    #[test]
    fn test_unnamed_ping_ends_run() {
        let pings = vec![city_ping("A", 1), city_ping("", 2), city_ping("A", 3)];
        let stats = stats(&pings);
        assert_eq!(city(&stats, "A").visits, 2);
        assert_eq!(stats.cities.len(), 1);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let pings = vec![city_ping("A", 4), city_ping("B", 3), city_ping("A", 1), city_ping("A", 2)];
        let stats = stats(&pings);
        assert_eq!(city(&stats, "A").visits, 2);
        assert_eq!(stats.cities[0].key, "A");
    }

    #[test]
    fn test_days_present_and_last_visited() {
        let pings = vec![
            city_ping("A", JAN_1 + 1_000),
            city_ping("A", JAN_1 + 2_000),
            city_ping("A", JAN_1 + DAY_MS),
            Ping::new(10.0, 10.0, None).with_city("A"),
        ];
        let stats = stats(&pings);
        let a = city(&stats, "A");
        assert_eq!(a.days_present, 2);
        assert_eq!(a.last_visited_ts, Some(JAN_1 + DAY_MS));
        assert_eq!(a.sample_count, 4);
        assert_eq!(a.visits, 1);
    }

    #[test]
    fn test_untimestamped_city_has_no_days() {
        let pings = vec![Ping::new(1.0, 2.0, None).with_city("Nowhen")];
        let stats = stats(&pings);
        let c = city(&stats, "Nowhen");
        assert_eq!(c.visits, 1);
        assert_eq!(c.days_present, 0);
        assert_eq!(c.last_visited_ts, None);
        assert_eq!(c.representative_lat, Some(1.0));
    }

    #[test]
    fn test_representative_is_average_without_gazetteer() {
        let pings = vec![
            Ping::new(10.0, 20.0, Some(1)).with_city("A"),
            Ping::new(12.0, 22.0, Some(2)).with_city("A"),
        ];
        let stats = stats(&pings);
        let a = city(&stats, "A");
        assert_eq!(a.representative_lat, Some(11.0));
        assert_eq!(a.representative_lng, Some(21.0));
        assert!(!a.resolved_from_gazetteer);
    }

    #[test]
    fn test_representative_from_gazetteer() {
        let gazetteer = Gazetteer::from_entries(vec![
            GazetteerEntry {
                name: "Portland".to_string(),
                lat: 45.52345,
                lng: -122.67621,
                country_code: Some("US".to_string()),
                admin_region: Some("OR".to_string()),
            },
            GazetteerEntry {
                name: "Portland".to_string(),
                lat: 43.66147,
                lng: -70.25533,
                country_code: Some("US".to_string()),
                admin_region: Some("ME".to_string()),
            },
        ]);
        let reference = ReferenceData {
            gazetteer,
            ..ReferenceData::default()
        };
        let pings = vec![
            Ping::new(43.65, -70.26, Some(1)).with_city("Portland"),
            Ping::new(43.67, -70.24, Some(2)).with_city("Portland"),
        ];
        let stats = compute_visit_stats(&pings, &reference, &VisitConfig::default());
        let p = city(&stats, "Portland");
        assert!(p.resolved_from_gazetteer);
        assert_eq!(p.representative_lat, Some(43.66147));
        assert_eq!(p.representative_lng, Some(-70.25533));
    }

    #[test]
    fn test_country_runs_and_unknown_excluded() {
        let reference = ReferenceData {
            countries: RegionIndex::new(vec![
                Region::new("Westland", square(0.0, 0.0, 10.0)),
                Region::new("Eastland", square(20.0, 0.0, 10.0)),
            ]),
            ..ReferenceData::default()
        };
        let pings = vec![
            Ping::new(5.0, 5.0, Some(1)).with_city("W1"),
            Ping::new(5.0, 25.0, Some(2)).with_city("E1"),
            Ping::new(50.0, 50.0, Some(3)),
            Ping::new(5.0, 25.0, Some(4)).with_city("E2"),
            Ping::new(5.0, 5.0, Some(5)).with_city("W1"),
        ];
        let stats = compute_visit_stats(&pings, &reference, &VisitConfig::default());

        assert_eq!(stats.countries.len(), 2);
        assert!(country(&stats, "Unknown").is_none());
        let east = country(&stats, "Eastland").unwrap();
        // The unknown ping in between splits the Eastland stay in two
        assert_eq!(east.visits, 2);
        assert_eq!(east.distinct_cities_visited, 2);
        assert_eq!(country(&stats, "Westland").unwrap().visits, 2);
        assert_eq!(stats.totals.distinct_countries, 2);
        assert_eq!(stats.totals.total_pings, 5);
    }

    #[test]
    fn test_explicit_country_takes_precedence() {
        let reference = ReferenceData {
            countries: RegionIndex::new(vec![Region::new("Polygonia", square(0.0, 0.0, 10.0))]),
            ..ReferenceData::default()
        };
        let pings = vec![Ping::new(5.0, 5.0, Some(1)).with_country("Declared")];
        let stats = compute_visit_stats(&pings, &reference, &VisitConfig::default());
        assert!(country(&stats, "Declared").is_some());
        assert!(country(&stats, "Polygonia").is_none());
    }

    #[test]
    fn test_city_from_boundary_uses_centroid() {
        let reference = ReferenceData {
            city_boundaries: RegionIndex::new(vec![Region::new("Boxville", square(0.0, 0.0, 2.0))]),
            ..ReferenceData::default()
        };
        let pings = vec![
            Ping::new(0.5, 0.5, Some(1)),
            Ping::new(0.6, 0.5, Some(2)),
        ];
        let stats = compute_visit_stats(&pings, &reference, &VisitConfig::default());
        let b = city(&stats, "Boxville");
        assert_eq!(b.visits, 1);
        assert!((b.representative_lat.unwrap() - 1.0).abs() < 1e-9);
        assert!((b.representative_lng.unwrap() - 1.0).abs() < 1e-9);

        let config = VisitConfig {
            resolve_city_boundaries: false,
            ..VisitConfig::default()
        };
        assert!(compute_visit_stats(&pings, &reference, &config).cities.is_empty());
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let pings: Vec<Ping> = (0..200)
            .map(|i| {
                let name = ["A", "B", "C", ""][i % 4];
                let ts = if i % 7 == 0 { None } else { Some(JAN_1 + i as i64 * 3_600_000) };
                Ping::new(10.0 + i as f64 * 0.01, 20.0, ts).with_city(name)
            })
            .collect();
        let first = stats(&pings);
        let second = stats(&pings);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_input() {
        let stats = stats(&[]);
        assert!(stats.cities.is_empty());
        assert!(stats.countries.is_empty());
        assert_eq!(stats.totals, VisitTotals::default());
    }
}
