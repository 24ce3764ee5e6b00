//! # Ping Sources
//!
//! Where pings come from, and how consumers learn that they changed.
//!
//! A [`PingSource`] owns its own update notification: callers register a
//! callback with [`PingSource::subscribe`] and keep the returned
//! [`Subscription`] alive for as long as they want updates. Dropping it
//! deregisters the callback.
//!
//! Also here: lenient JSON import of stored pings, GeoJSON point import,
//! the saved-today check, and the reverse-geocoding collaborator used to
//! fill in missing city names.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, NaiveDate};
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::aggregate::calendar_day;
use crate::error::{Result, VisitError};
use crate::Ping;

/// Accuracy recorded for appended pings that do not carry one (meters).
pub const DEFAULT_ACCURACY_M: f64 = 50.0;

/// Callback fired after the ping collection changed.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, UpdateCallback)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Set of update callbacks. Building block for [`PingSource`] implementations.
#[derive(Clone, Default)]
pub struct Subscribers {
    registry: Arc<Mutex<Registry>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered while the returned handle lives.
    pub fn subscribe(&self, callback: UpdateCallback) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push((id, callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Fire every registered callback.
    ///
    /// Callbacks run outside the registry lock, so a callback may subscribe
    /// or drop its own subscription.
    pub fn notify(&self) {
        let callbacks: Vec<UpdateCallback> = lock(&self.registry)
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle. Dropping it deregisters the callback.
#[must_use = "dropping a Subscription deregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Deregister now. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// Ping Source
// ============================================================================

/// Provider of the full ping history.
pub trait PingSource: Send + Sync {
    /// Snapshot of every stored ping, in storage order.
    fn get_all(&self) -> Result<Vec<Ping>>;

    /// Register for change notifications.
    fn subscribe(&self, callback: UpdateCallback) -> Subscription;
}

/// In-memory ping store.
#[derive(Default)]
pub struct PingStore {
    pings: Mutex<Vec<Ping>>,
    subscribers: Subscribers,
}

impl PingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pings(pings: Vec<Ping>) -> Self {
        Self {
            pings: Mutex::new(pings),
            subscribers: Subscribers::new(),
        }
    }

    /// Store seeded from a JSON array of pings. Malformed records are skipped.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::with_pings(parse_pings_json(text)?))
    }

    /// Append a ping and notify subscribers once the append is visible.
    pub fn append(&self, mut ping: Ping) {
        if ping.accuracy.is_none() {
            ping.accuracy = Some(DEFAULT_ACCURACY_M);
        }
        {
            lock(&self.pings).push(ping);
        }
        self.subscribers.notify();
    }

    pub fn len(&self) -> usize {
        lock(&self.pings).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a ping was stored on the calendar day containing `now_ms`.
    pub fn has_ping_on_day(&self, now_ms: i64, offset_minutes: i32) -> bool {
        has_ping_on_day(&lock(&self.pings), now_ms, offset_minutes)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*lock(&self.pings))?)
    }
}

impl PingSource for PingStore {
    fn get_all(&self) -> Result<Vec<Ping>> {
        Ok(lock(&self.pings).clone())
    }

    fn subscribe(&self, callback: UpdateCallback) -> Subscription {
        self.subscribers.subscribe(callback)
    }
}

// ============================================================================
// Import
// ============================================================================

/// Number or numeric string.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Epoch milliseconds from a number or an RFC 3339 / `YYYY-MM-DD` string.
///
/// Zero and pre-1970 values are real timestamps here.
fn parse_timestamp(value: &Value) -> Option<i64> {
    if let Some(ms) = lenient_f64(value) {
        return ms.is_finite().then_some(ms as i64);
    }
    let text = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn ping_from_record(record: &Map<String, Value>) -> Option<Ping> {
    let lat = lenient_f64(record.get("lat")?)?;
    let lng = lenient_f64(record.get("lng")?)?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    Some(Ping {
        lat,
        lng,
        timestamp: record.get("timestamp").and_then(parse_timestamp),
        accuracy: record
            .get("accuracy")
            .and_then(lenient_f64)
            .filter(|a| a.is_finite() && *a > 0.0),
        city: non_empty_string(record.get("city").or_else(|| record.get("City"))),
        country: non_empty_string(record.get("country")),
    })
}

/// Parse a JSON array of stored pings.
///
/// Coordinates may be numbers or numeric strings. Records without usable
/// coordinates are skipped; a record whose timestamp cannot be read keeps
/// the ping with no timestamp. Only a document that is not a JSON array is
/// an error.
pub fn parse_pings_json(text: &str) -> Result<Vec<Ping>> {
    let value: Value = serde_json::from_str(text).map_err(|e| VisitError::PingSource {
        message: format!("invalid ping JSON: {}", e),
    })?;
    let records = value.as_array().ok_or_else(|| VisitError::PingSource {
        message: "ping JSON is not an array".to_string(),
    })?;

    let pings: Vec<Ping> = records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(ping_from_record)
        .collect();

    if pings.len() < records.len() {
        debug!(
            "[PingStore] Skipped {} malformed ping records",
            records.len() - pings.len()
        );
    }
    Ok(pings)
}

/// Parse GeoJSON `Point` features into pings.
///
/// Accepts a FeatureCollection or a bare array of features. The timestamp
/// comes from `properties.timestamp`, `time`, `ts` or `date`, and only a
/// positive value counts; the city from `properties.city` or `properties.name`.
pub fn parse_point_features(text: &str) -> Result<Vec<Ping>> {
    let value: Value = serde_json::from_str(text)?;
    let features = match &value {
        Value::Array(features) => features,
        Value::Object(obj) => obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| VisitError::GeoJson {
                message: "expected a FeatureCollection".to_string(),
            })?,
        _ => {
            return Err(VisitError::GeoJson {
                message: "expected a FeatureCollection or feature array".to_string(),
            })
        }
    };

    let pings: Vec<Ping> = features.iter().filter_map(ping_from_feature).collect();
    if pings.len() < features.len() {
        debug!(
            "[PingStore] Skipped {} non-point features",
            features.len() - pings.len()
        );
    }
    Ok(pings)
}

fn ping_from_feature(feature: &Value) -> Option<Ping> {
    let geometry = feature.get("geometry")?;
    if geometry.get("type")?.as_str()? != "Point" {
        return None;
    }
    let position = geometry.get("coordinates")?.as_array()?;
    let lng = position.first()?.as_f64()?;
    let lat = position.get(1)?.as_f64()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }

    let properties = feature.get("properties").and_then(Value::as_object);
    let prop = |key: &str| properties.and_then(|p| p.get(key));

    let timestamp = ["timestamp", "time", "ts", "date"]
        .iter()
        .find_map(|key| prop(key).and_then(parse_timestamp).filter(|ts| *ts > 0));

    Some(Ping {
        lat,
        lng,
        timestamp,
        accuracy: prop("accuracy").and_then(lenient_f64),
        city: non_empty_string(prop("city")).or_else(|| non_empty_string(prop("name"))),
        country: non_empty_string(prop("country")),
    })
}

/// Whether any ping falls on the same calendar day as `now_ms`.
///
/// The clock is the caller's; days are taken at the given fixed UTC offset.
pub fn has_ping_on_day(pings: &[Ping], now_ms: i64, offset_minutes: i32) -> bool {
    let Some(today) = calendar_day(now_ms, offset_minutes) else {
        return false;
    };
    pings
        .iter()
        .filter_map(|p| p.timestamp)
        .any(|ts| calendar_day(ts, offset_minutes) == Some(today))
}

// ============================================================================
// Reverse Geocoding
// ============================================================================

/// Collaborator that names the city at a coordinate.
///
/// Implementations swallow their own failures: `None` means "no city", the
/// same as a ping that never had one.
#[allow(async_fn_in_trait)]
pub trait ReverseGeocoder {
    async fn city_for(&self, lat: f64, lng: f64) -> Option<String>;
}

/// Fill in the city of every ping that lacks one, one lookup at a time.
///
/// Returns the number of pings that gained a city.
pub async fn annotate_missing_cities<G: ReverseGeocoder>(pings: &mut [Ping], geocoder: &G) -> usize {
    let mut filled = 0;
    for ping in pings.iter_mut().filter(|p| p.city_name().is_none()) {
        match geocoder.city_for(ping.lat, ping.lng).await {
            Some(city) if !city.trim().is_empty() => {
                ping.city = Some(city.trim().to_string());
                filled += 1;
            }
            _ => {}
        }
    }
    if filled > 0 {
        debug!("[Geocoder] Filled {} missing city names", filled);
    } else if pings.iter().any(|p| p.city_name().is_none()) {
        warn!("[Geocoder] No city names could be resolved");
    }
    filled
}
