//! HTTP access to reference data and reverse geocoding.
//!
//! This module provides:
//! - Concurrent download of the gazetteer and the country polygon set
//! - A Nominatim reverse geocoder with dispatch rate limiting
//! - Batch city annotation with a bounded number of lookups in flight
//!
//! Nothing here is fatal to the statistics: a reference file that cannot be
//! fetched degrades to empty data and a failed lookup to "no city".

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::aggregate::ReferenceData;
use crate::error::{Result, VisitError};
use crate::gazetteer::Gazetteer;
use crate::regions::RegionIndex;
use crate::source::ReverseGeocoder;
use crate::Ping;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("visit-analytics/", env!("CARGO_PKG_VERSION"));

// Nominatim usage policy: at most one request per second
const DISPATCH_INTERVAL_MS: u64 = 1000;
/// Default number of reverse lookups in flight during batch annotation.
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 4;
// Matches the zoom the mobile app uses for "city" granularity
const REVERSE_ZOOM: u8 = 10;

/// Dispatch rate limiter. Spaces out when requests START.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot. Each caller gets a unique slot
    /// spaced `interval` apart.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            (dispatch_at.saturating_duration_since(now), num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| VisitError::Http {
            message: format!("Failed to create HTTP client: {}", e),
            status_code: None,
        })
}

// ============================================================================
// Reference Data
// ============================================================================

async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let start = Instant::now();
    let response = client.get(url).send().await.map_err(|e| VisitError::Http {
        message: format!("GET {}: {}", url, e),
        status_code: e.status().map(|s| s.as_u16()),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(VisitError::Http {
            message: format!("GET {}: HTTP {}", url, status),
            status_code: Some(status.as_u16()),
        });
    }

    let text = response.text().await.map_err(|e| VisitError::Http {
        message: format!("Body download error for {}: {}", url, e),
        status_code: None,
    })?;
    debug!(
        "[Fetch] {} -> {:.1}KB in {:?}",
        url,
        text.len() as f64 / 1024.0,
        start.elapsed()
    );
    Ok(text)
}

/// Download and parse a GeoNames-style gazetteer.
pub async fn fetch_gazetteer(client: &Client, url: &str) -> Result<Gazetteer> {
    let text = fetch_text(client, url).await?;
    Ok(Gazetteer::parse(&text))
}

/// Download and parse a GeoJSON FeatureCollection of named regions.
pub async fn fetch_regions(client: &Client, url: &str) -> Result<RegionIndex> {
    let text = fetch_text(client, url).await?;
    RegionIndex::from_geojson(&text)
}

/// Fetch the gazetteer and the country polygons concurrently.
///
/// Either download may fail independently; a failure is logged and that part
/// of the reference data is left empty.
pub async fn load_reference(gazetteer_url: Option<&str>, countries_url: Option<&str>) -> ReferenceData {
    let client = match build_client() {
        Ok(client) => client,
        Err(e) => {
            warn!("[Reference] {}", e);
            return ReferenceData::default();
        }
    };

    let start = Instant::now();
    let gazetteer_fut = async {
        match gazetteer_url {
            Some(url) => fetch_gazetteer(&client, url).await.unwrap_or_else(|e| {
                warn!("[Reference] Gazetteer unavailable, continuing without: {}", e);
                Gazetteer::default()
            }),
            None => Gazetteer::default(),
        }
    };
    let countries_fut = async {
        match countries_url {
            Some(url) => fetch_regions(&client, url).await.unwrap_or_else(|e| {
                warn!("[Reference] Country polygons unavailable, continuing without: {}", e);
                RegionIndex::default()
            }),
            None => RegionIndex::default(),
        }
    };

    let (gazetteer, countries) = futures::join!(gazetteer_fut, countries_fut);

    info!(
        "[Reference] Loaded {} gazetteer entries and {} countries in {:?}",
        gazetteer.len(),
        countries.len(),
        start.elapsed()
    );

    ReferenceData {
        countries,
        gazetteer,
        ..ReferenceData::default()
    }
}

// ============================================================================
// Nominatim
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
}

impl Address {
    /// Most specific settlement name available.
    fn settlement(self) -> Option<String> {
        [self.city, self.town, self.village, self.municipality, self.county]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty())
    }
}

/// Reverse geocoder backed by a Nominatim server.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl NominatimGeocoder {
    /// Geocoder against the public OpenStreetMap instance.
    pub fn new() -> Result<Self> {
        Self::with_base_url(NOMINATIM_URL)
    }

    /// Geocoder against a self-hosted instance.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(DispatchRateLimiter::new(Duration::from_millis(
                DISPATCH_INTERVAL_MS,
            ))),
        })
    }

    /// City name at a coordinate, with errors surfaced.
    ///
    /// One attempt per call; a 429 or any other non-success status is an
    /// error like a transport failure.
    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom={}&addressdetails=1",
            self.base_url, lat, lng, REVERSE_ZOOM
        );

        let dispatch_num = self.rate_limiter.wait_for_dispatch_slot().await;
        let start = Instant::now();

        let response = self.client.get(&url).send().await.map_err(|e| VisitError::Http {
            message: format!("Request error: {}", e),
            status_code: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisitError::Http {
                message: format!("Geocoding failed: HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| VisitError::Http {
            message: format!("Body download error: {}", e),
            status_code: None,
        })?;
        debug!("[Nominatim #{}] ({:.4}, {:.4}) in {:?}", dispatch_num, lat, lng, start.elapsed());
        parse_reverse_response(&bytes)
    }
}

fn parse_reverse_response(bytes: &[u8]) -> Result<Option<String>> {
    let data: ReverseResponse = serde_json::from_slice(bytes)?;
    Ok(data.address.and_then(Address::settlement))
}

impl ReverseGeocoder for NominatimGeocoder {
    async fn city_for(&self, lat: f64, lng: f64) -> Option<String> {
        match self.reverse(lat, lng).await {
            Ok(city) => city,
            Err(e) => {
                warn!("[Nominatim] Reverse geocoding ({:.4}, {:.4}) failed: {}", lat, lng, e);
                None
            }
        }
    }
}

/// Fill missing city names with up to `concurrency` lookups in flight.
///
/// Results are applied in ping order. Returns the number of pings that
/// gained a city.
pub async fn annotate_missing_cities_buffered<G: ReverseGeocoder>(
    pings: &mut [Ping],
    geocoder: &G,
    concurrency: usize,
) -> usize {
    use futures::stream::{self, StreamExt};

    let missing: Vec<(usize, f64, f64)> = pings
        .iter()
        .enumerate()
        .filter(|(_, p)| p.city_name().is_none())
        .map(|(i, p)| (i, p.lat, p.lng))
        .collect();
    if missing.is_empty() {
        return 0;
    }

    let start = Instant::now();
    let total = missing.len();
    let results: Vec<(usize, Option<String>)> = stream::iter(missing)
        .map(|(i, lat, lng)| async move { (i, geocoder.city_for(lat, lng).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut filled = 0;
    for (i, city) in results {
        if let Some(city) = city.filter(|c| !c.trim().is_empty()) {
            pings[i].city = Some(city.trim().to_string());
            filled += 1;
        }
    }

    info!(
        "[Geocoder] Resolved {}/{} missing cities in {:.2}s",
        filled,
        total,
        start.elapsed().as_secs_f64()
    );
    filled
}

/// Synchronous wrapper for FFI - runs the lookups on a tokio runtime.
#[cfg(feature = "ffi")]
pub fn annotate_missing_cities_sync(mut pings: Vec<Ping>) -> Vec<Ping> {
    use tokio::runtime::Builder;

    let rt = match Builder::new_multi_thread().worker_threads(2).enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            warn!("Failed to create tokio runtime: {}", e);
            return pings;
        }
    };
    let geocoder = match NominatimGeocoder::new() {
        Ok(g) => g,
        Err(e) => {
            warn!("Failed to create geocoder: {}", e);
            return pings;
        }
    };

    rt.block_on(annotate_missing_cities_buffered(
        &mut pings,
        &geocoder,
        DEFAULT_LOOKUP_CONCURRENCY,
    ));
    pings
}
