//! # Gazetteer
//!
//! Reference table of named places used to pin a city name to canonical
//! coordinates. City names are not unique worldwide ("Springfield",
//! "Valencia", "San José"), so a lookup takes the name *and* an approximate
//! position, and picks the nearest same-named entry.
//!
//! ## File format
//!
//! Tab-separated, GeoNames `citiesNNNN.txt` layout. Columns by position:
//!
//! | Index | Field |
//! |-------|-------|
//! | 1 | name |
//! | 4 | latitude |
//! | 5 | longitude |
//! | 8 | country code |
//! | 10 | admin region code |
//!
//! Rows with fewer than 6 columns, an empty name, or non-numeric
//! coordinates are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{Result, VisitError};
use crate::geo_utils::haversine_km;
use crate::GpsPoint;

/// Default acceptance radius for a gazetteer match.
pub const DEFAULT_MAX_MATCH_DISTANCE_KM: f64 = 200.0;

const NAME_COLUMN: usize = 1;
const LAT_COLUMN: usize = 4;
const LNG_COLUMN: usize = 5;
const COUNTRY_COLUMN: usize = 8;
const ADMIN_COLUMN: usize = 10;
const MIN_COLUMNS: usize = 6;

/// One named place.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub country_code: Option<String>,
    pub admin_region: Option<String>,
}

impl GazetteerEntry {
    /// Parse one TSV row, `None` if the row is unusable.
    pub fn from_row(line: &str) -> Option<Self> {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < MIN_COLUMNS {
            return None;
        }

        let name = cols[NAME_COLUMN].trim();
        if name.is_empty() {
            return None;
        }
        let lat: f64 = cols[LAT_COLUMN].trim().parse().ok()?;
        let lng: f64 = cols[LNG_COLUMN].trim().parse().ok()?;
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            lat,
            lng,
            country_code: optional_column(&cols, COUNTRY_COLUMN),
            admin_region: optional_column(&cols, ADMIN_COLUMN),
        })
    }

    fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lng)
    }
}

fn optional_column(cols: &[&str], index: usize) -> Option<String> {
    cols.get(index)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Outcome of a gazetteer lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub lat: f64,
    pub lng: f64,
    /// `true` if the coordinates come from a gazetteer entry
    pub matched: bool,
    /// Distance to the nearest same-named entry, if any entry had the name
    pub nearest_km: Option<f64>,
}

/// Case-insensitive name index over gazetteer entries.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    by_name: HashMap<String, Vec<GazetteerEntry>>,
    entry_count: usize,
}

impl Gazetteer {
    /// Build from already parsed entries. File order is kept per name.
    pub fn from_entries(entries: impl IntoIterator<Item = GazetteerEntry>) -> Self {
        let mut gazetteer = Self::default();
        for entry in entries {
            gazetteer.insert(entry);
        }
        gazetteer
    }

    fn insert(&mut self, entry: GazetteerEntry) {
        self.by_name
            .entry(entry.name.to_lowercase())
            .or_default()
            .push(entry);
        self.entry_count += 1;
    }

    /// Parse TSV text. Unusable rows are skipped; this never fails.
    pub fn parse(text: &str) -> Self {
        let mut skipped = 0usize;
        let mut gazetteer = Self::default();
        for line in text.lines().filter(|l| !l.is_empty()) {
            match GazetteerEntry::from_row(line) {
                Some(entry) => gazetteer.insert(entry),
                None => skipped += 1,
            }
        }
        gazetteer.log_loaded(skipped);
        gazetteer
    }

    /// Parse TSV from a reader. Invalid UTF-8 is replaced rather than
    /// rejected; only an I/O failure is an error.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut skipped = 0usize;
        let mut gazetteer = Self::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| VisitError::GazetteerParse {
                    message: e.to_string(),
                })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            match GazetteerEntry::from_row(line) {
                Some(entry) => gazetteer.insert(entry),
                None => skipped += 1,
            }
        }

        gazetteer.log_loaded(skipped);
        Ok(gazetteer)
    }

    /// Open and parse a gazetteer file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VisitError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Like [`Gazetteer::from_path`], but an unreadable file yields an empty
    /// gazetteer, which passes every lookup through unmatched.
    pub fn from_path_or_empty(path: impl AsRef<Path>) -> Self {
        Self::from_path(path).unwrap_or_else(|e| {
            warn!("[Gazetteer] {}; continuing without gazetteer", e);
            Self::default()
        })
    }

    fn log_loaded(&self, skipped: usize) {
        info!(
            "[Gazetteer] Loaded {} entries under {} names",
            self.entry_count,
            self.by_name.len()
        );
        if skipped > 0 {
            debug!("[Gazetteer] Skipped {} unusable rows", skipped);
        }
    }

    /// All entries with this name, case-insensitively, in file order.
    pub fn candidates(&self, name: &str) -> &[GazetteerEntry] {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve with the default 200 km acceptance radius.
    pub fn resolve(&self, name: &str, approx_lat: f64, approx_lng: f64) -> Resolution {
        self.resolve_within(name, approx_lat, approx_lng, DEFAULT_MAX_MATCH_DISTANCE_KM)
    }

    /// Nearest same-named entry to `(approx_lat, approx_lng)`.
    ///
    /// The entry is accepted only within `max_km`; otherwise the caller's
    /// own estimate is returned unchanged with `matched = false`. The first
    /// entry in file order wins distance ties.
    ///
    /// # Example
    ///
    /// ```rust
    /// use visit_analytics::{Gazetteer, GazetteerEntry};
    ///
    /// let gazetteer = Gazetteer::parse(
    ///     "1\tParis\tParis\t\t48.85341\t2.3488\tP\tPPLC\tFR\t\t11\n\
    ///      2\tParis\tParis\t\t33.66094\t-95.55551\tP\tPPLA2\tUS\t\tTX\n",
    /// );
    ///
    /// let near_texas = gazetteer.resolve("paris", 33.7, -95.5);
    /// assert!(near_texas.matched);
    /// assert_eq!(near_texas.lat, 33.66094);
    /// ```
    pub fn resolve_within(
        &self,
        name: &str,
        approx_lat: f64,
        approx_lng: f64,
        max_km: f64,
    ) -> Resolution {
        let approx = GpsPoint::new(approx_lat, approx_lng);

        let mut best: Option<(&GazetteerEntry, f64)> = None;
        for candidate in self.candidates(name) {
            let d = haversine_km(&approx, &candidate.point());
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((candidate, d));
            }
        }

        match best {
            Some((entry, d)) if d <= max_km => Resolution {
                lat: entry.lat,
                lng: entry.lng,
                matched: true,
                nearest_km: Some(d),
            },
            other => Resolution {
                lat: approx_lat,
                lng: approx_lng,
                matched: false,
                nearest_km: other.map(|(_, d)| d),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn row(name: &str, lat: &str, lng: &str, country: &str, admin: &str) -> String {
        format!("0\t{name}\t{name}\t\t{lat}\t{lng}\tP\tPPL\t{country}\t\t{admin}\t\t\t\t1000")
    }

    fn springfields() -> Gazetteer {
        // Springfield, Illinois and Cape Town, roughly 14,000 km apart
        let text = [
            row("Springfield", "39.80172", "-89.64371", "US", "IL"),
            row("Springfield", "-33.92", "18.42", "ZA", "WC"),
        ]
        .join("\n");
        Gazetteer::parse(&text)
    }

    #[test]
    fn test_parse_row_columns() {
        let entry = GazetteerEntry::from_row(&row("Lyon", "45.74846", "4.84671", "FR", "84")).unwrap();
        assert_eq!(entry.name, "Lyon");
        assert_eq!(entry.lat, 45.74846);
        assert_eq!(entry.lng, 4.84671);
        assert_eq!(entry.country_code.as_deref(), Some("FR"));
        assert_eq!(entry.admin_region.as_deref(), Some("84"));
    }

    #[test]
    fn test_parse_skips_bad_rows() {
        let text = [
            "1\tShort\trow".to_string(),
            row("", "1.0", "2.0", "XX", ""),
            row("BadLat", "north", "2.0", "XX", ""),
            row("Good", "1.0", "2.0", "XX", ""),
            "0\tSixColumns\tx\t\t3.0\t4.0".to_string(),
        ]
        .join("\n");
        let gazetteer = Gazetteer::parse(&text);
        assert_eq!(gazetteer.len(), 2);
        assert_eq!(gazetteer.candidates("good").len(), 1);
        let six = &gazetteer.candidates("sixcolumns")[0];
        assert_eq!(six.country_code, None);
        assert_eq!(six.admin_region, None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let gazetteer = springfields();
        assert_eq!(gazetteer.candidates("SPRINGFIELD").len(), 2);
        assert_eq!(gazetteer.candidates(" springfield ").len(), 2);
    }

    #[test]
    fn test_nearest_homonym_is_chosen() {
        let gazetteer = springfields();
        // Just outside Springfield, IL
        let res = gazetteer.resolve("Springfield", 39.9, -89.5);
        assert!(res.matched);
        assert_eq!(res.lat, 39.80172);
        assert_eq!(res.lng, -89.64371);

        let res = gazetteer.resolve("Springfield", -34.0, 18.5);
        assert!(res.matched);
        assert_eq!(res.lat, -33.92);
    }

    #[test]
    fn test_far_candidate_is_rejected() {
        let gazetteer = springfields();
        // ~500 km east of Springfield, IL (Columbus, OH area)
        let res = gazetteer.resolve("Springfield", 39.96, -83.0);
        assert!(!res.matched);
        assert_eq!(res.lat, 39.96);
        assert_eq!(res.lng, -83.0);
        assert!(res.nearest_km.unwrap() > 200.0);
    }

    #[test]
    fn test_threshold_is_inclusive_and_configurable() {
        let gazetteer = springfields();
        let res = gazetteer.resolve_within("Springfield", 39.96, -83.0, 1000.0);
        assert!(res.matched);
        let exact = res.nearest_km.unwrap();
        assert!(gazetteer.resolve_within("Springfield", 39.96, -83.0, exact).matched);
    }

    #[test]
    fn test_unknown_name_and_empty_gazetteer_pass_through() {
        let res = springfields().resolve("Shelbyville", 1.0, 2.0);
        assert!(!res.matched);
        assert_eq!((res.lat, res.lng), (1.0, 2.0));
        assert_eq!(res.nearest_km, None);

        let res = Gazetteer::default().resolve("Springfield", 1.0, 2.0);
        assert!(!res.matched);
    }

    #[test]
    fn test_from_reader_tolerates_invalid_utf8() {
        let mut bytes = row("Zürich", "47.36667", "8.55", "CH", "ZH").into_bytes();
        bytes.extend_from_slice(b"\r\n0\t\xff\xfe\tx\t\t1.0\t2.0\r\n");
        bytes.extend_from_slice(row("Bern", "46.94809", "7.44744", "CH", "BE").as_bytes());

        let gazetteer = Gazetteer::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(gazetteer.candidates("zürich").len(), 1);
        assert_eq!(gazetteer.candidates("bern").len(), 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Gazetteer::from_path("/definitely/not/cities15000.txt"),
            Err(VisitError::Io { .. })
        ));
        assert!(Gazetteer::from_path_or_empty("/definitely/not/cities15000.txt").is_empty());
    }
}
