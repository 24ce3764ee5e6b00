//! # Statistics Projection
//!
//! Single-column sorting and display formatting for the city and country
//! tables.
//!
//! Sorting is stable and never mutates its input. Numeric columns compare
//! numerically, treating a missing last-visited time as 0. Name columns use
//! a locale-aware comparison: accents are folded and case ignored for the
//! primary order, with the raw string breaking ties so the order is total.

use std::cmp::Ordering;

use chrono::DateTime;
use deunicode::deunicode;

use crate::aggregate::{CitySummary, CountrySummary};

/// Sort direction of the active column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Sortable columns of the city table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum CitySortKey {
    City,
    LastVisited,
    Visits,
    Days,
}

/// Sortable columns of the country table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum CountrySortKey {
    Country,
    LastVisited,
    Visits,
    Days,
    Cities,
}

/// Active column and direction of an interactive table.
///
/// Selecting a new column sorts it ascending; selecting the active column
/// again flips the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<K> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: Copy + PartialEq> SortState<K> {
    pub fn new(key: K, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn toggle(&mut self, key: K) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = SortDirection::Ascending;
        }
    }
}

impl Default for SortState<CitySortKey> {
    fn default() -> Self {
        Self::new(CitySortKey::Visits, SortDirection::Descending)
    }
}

impl Default for SortState<CountrySortKey> {
    fn default() -> Self {
        Self::new(CountrySortKey::Days, SortDirection::Descending)
    }
}

impl SortState<CitySortKey> {
    pub fn sort(&self, rows: &[CitySummary]) -> Vec<CitySummary> {
        sort_cities(rows, self.key, self.direction)
    }
}

impl SortState<CountrySortKey> {
    pub fn sort(&self, rows: &[CountrySummary]) -> Vec<CountrySummary> {
        sort_countries(rows, self.key, self.direction)
    }
}

/// Accent-folded, case-insensitive comparison with a raw tie-break.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded_a = deunicode(a).to_lowercase();
    let folded_b = deunicode(b).to_lowercase();
    folded_a.cmp(&folded_b).then_with(|| a.cmp(b))
}

/// Sort city rows by one column. Returns a new vector.
pub fn sort_cities(rows: &[CitySummary], key: CitySortKey, direction: SortDirection) -> Vec<CitySummary> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = match key {
            CitySortKey::City => compare_names(&a.key, &b.key),
            CitySortKey::LastVisited => a
                .last_visited_ts
                .unwrap_or(0)
                .cmp(&b.last_visited_ts.unwrap_or(0)),
            CitySortKey::Visits => a.visits.cmp(&b.visits),
            CitySortKey::Days => a.days_present.cmp(&b.days_present),
        };
        direction.apply(ordering)
    });
    sorted
}

/// Sort country rows by one column. Returns a new vector.
pub fn sort_countries(
    rows: &[CountrySummary],
    key: CountrySortKey,
    direction: SortDirection,
) -> Vec<CountrySummary> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = match key {
            CountrySortKey::Country => compare_names(&a.country, &b.country),
            CountrySortKey::LastVisited => a
                .last_visited_ts
                .unwrap_or(0)
                .cmp(&b.last_visited_ts.unwrap_or(0)),
            CountrySortKey::Visits => a.visits.cmp(&b.visits),
            CountrySortKey::Days => a.days_present.cmp(&b.days_present),
            CountrySortKey::Cities => a.distinct_cities_visited.cmp(&b.distinct_cities_visited),
        };
        direction.apply(ordering)
    });
    sorted
}

/// `YYYY-MM-DD HH:MM` in UTC, or an em dash when there is no timestamp.
pub fn format_last_visited(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "\u{2014}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(key: &str, visits: u32, days: u32, last: Option<i64>) -> CitySummary {
        CitySummary {
            key: key.to_string(),
            visits,
            last_visited_ts: last,
            days_present: days,
            representative_lat: None,
            representative_lng: None,
            sample_count: visits,
            resolved_from_gazetteer: false,
        }
    }

    fn country(name: &str, visits: u32, days: u32, cities: u32) -> CountrySummary {
        CountrySummary {
            country: name.to_string(),
            visits,
            last_visited_ts: None,
            days_present: days,
            distinct_cities_visited: cities,
        }
    }

    fn keys(rows: &[CitySummary]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_sort_by_visits_descending() {
        let rows = vec![city("A", 1, 1, None), city("B", 5, 1, None), city("C", 3, 1, None)];
        let sorted = sort_cities(&rows, CitySortKey::Visits, SortDirection::Descending);
        assert_eq!(keys(&sorted), vec!["B", "C", "A"]);
        // Input untouched
        assert_eq!(keys(&rows), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let rows = vec![city("first", 2, 1, None), city("second", 2, 1, None), city("third", 1, 1, None)];
        let asc = sort_cities(&rows, CitySortKey::Visits, SortDirection::Ascending);
        assert_eq!(keys(&asc), vec!["third", "first", "second"]);
        let desc = sort_cities(&rows, CitySortKey::Visits, SortDirection::Descending);
        assert_eq!(keys(&desc), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sort_idempotent_and_reversible() {
        let rows = vec![city("A", 4, 1, None), city("B", 2, 1, None), city("C", 9, 1, None)];
        let once = sort_cities(&rows, CitySortKey::Visits, SortDirection::Ascending);
        let twice = sort_cities(&once, CitySortKey::Visits, SortDirection::Ascending);
        assert_eq!(once, twice);

        let mut reversed = sort_cities(&rows, CitySortKey::Visits, SortDirection::Descending);
        reversed.reverse();
        assert_eq!(once, reversed);
    }

    #[test]
    fn test_missing_last_visited_sorts_as_zero() {
        let rows = vec![city("late", 1, 1, Some(500)), city("never", 1, 1, None), city("early", 1, 1, Some(10))];
        let sorted = sort_cities(&rows, CitySortKey::LastVisited, SortDirection::Ascending);
        assert_eq!(keys(&sorted), vec!["never", "early", "late"]);
        // The field itself stays absent
        assert_eq!(sorted[0].last_visited_ts, None);
    }

    #[test]
    fn test_name_sort_folds_accents_and_case() {
        let rows = vec![city("zurich", 1, 1, None), city("Éire", 1, 1, None), city("berlin", 1, 1, None)];
        let sorted = sort_cities(&rows, CitySortKey::City, SortDirection::Ascending);
        assert_eq!(keys(&sorted), vec!["berlin", "Éire", "zurich"]);
    }

    #[test]
    fn test_compare_names_tie_break() {
        assert_eq!(compare_names("Paris", "paris"), Ordering::Less);
        assert_eq!(compare_names("Paris", "Paris"), Ordering::Equal);
    }

    #[test]
    fn test_sort_countries_by_cities() {
        let rows = vec![country("X", 1, 1, 2), country("Y", 1, 1, 7), country("Z", 1, 1, 0)];
        let sorted = sort_countries(&rows, CountrySortKey::Cities, SortDirection::Descending);
        let names: Vec<&str> = sorted.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, vec!["Y", "X", "Z"]);
    }

    #[test]
    fn test_sort_state_toggle() {
        let mut state = SortState::<CitySortKey>::default();
        assert_eq!(state.key, CitySortKey::Visits);
        assert_eq!(state.direction, SortDirection::Descending);

        state.toggle(CitySortKey::Visits);
        assert_eq!(state.direction, SortDirection::Ascending);

        state.toggle(CitySortKey::City);
        assert_eq!(state.key, CitySortKey::City);
        assert_eq!(state.direction, SortDirection::Ascending);

        state.toggle(CitySortKey::City);
        assert_eq!(state.direction, SortDirection::Descending);
    }

    #[test]
    fn test_country_sort_state_default() {
        let state = SortState::<CountrySortKey>::default();
        let rows = vec![country("X", 1, 1, 0), country("Y", 1, 3, 0)];
        let sorted = state.sort(&rows);
        assert_eq!(sorted[0].country, "Y");
    }

    #[test]
    fn test_format_last_visited() {
        // 2024-01-01T13:05:00Z
        assert_eq!(format_last_visited(Some(1_704_114_300_000)), "2024-01-01 13:05");
        assert_eq!(format_last_visited(None), "\u{2014}");
    }
}
