//! # Named Regions
//!
//! An ordered collection of named polygons (countries, or city boundaries)
//! answering "which region is this point in?".
//!
//! Resolution is **first match in input order**. Where polygons overlap
//! (disputed territories, enclaves drawn twice) the region listed first in
//! the source file wins, so callers control overlap resolution by ordering
//! their features. This ordering dependency is deliberate and stable.
//!
//! An R-tree over region bounding boxes narrows the candidates; the answer
//! is still the lowest-positioned candidate whose polygon contains the
//! point, identical to a linear scan.

use std::path::Path;

use geo::{BoundingRect, Centroid, Geometry, MultiPolygon};
use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, VisitError};
use crate::geometry::{contains, geometry_from_geojson, multi_polygon_contains, to_multi_polygon};
use crate::{GpsPoint, Ping};

/// Property keys tried, in order, for a feature's display name.
const NAME_PROPERTIES: [&str; 3] = ["NAME", "name", "ADMIN"];

/// A named polygonal region.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub shape: MultiPolygon<f64>,
}

impl Region {
    pub fn new(name: &str, shape: MultiPolygon<f64>) -> Self {
        Self {
            name: name.to_string(),
            shape,
        }
    }

    pub fn contains(&self, point: &GpsPoint) -> bool {
        multi_polygon_contains(point, &self.shape)
    }

    /// Area-weighted centroid of the region's polygons.
    pub fn centroid(&self) -> Option<GpsPoint> {
        self.shape.centroid().map(|c| GpsPoint::new(c.y(), c.x()))
    }
}

/// Bounding box of a region (used for spatial indexing).
#[derive(Debug, Clone)]
struct RegionBounds {
    position: usize,
    min_lng: f64,
    min_lat: f64,
    max_lng: f64,
    max_lat: f64,
}

impl RTreeObject for RegionBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}

/// Ordered, spatially indexed set of named regions.
#[derive(Debug, Clone)]
pub struct RegionIndex {
    regions: Vec<Region>,
    tree: RTree<RegionBounds>,
}

impl Default for RegionIndex {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            tree: RTree::new(),
        }
    }
}

impl RegionIndex {
    /// Build an index; `regions` order is the match priority.
    pub fn new(regions: Vec<Region>) -> Self {
        let bounds: Vec<RegionBounds> = regions
            .iter()
            .enumerate()
            .filter_map(|(position, region)| {
                let rect = region.shape.bounding_rect()?;
                Some(RegionBounds {
                    position,
                    min_lng: rect.min().x,
                    min_lat: rect.min().y,
                    max_lng: rect.max().x,
                    max_lat: rect.max().y,
                })
            })
            .collect();

        Self {
            regions,
            tree: RTree::bulk_load(bounds),
        }
    }

    /// Parse a GeoJSON FeatureCollection.
    ///
    /// Features without a `Polygon`/`MultiPolygon` geometry, with malformed
    /// coordinates, or without a name are skipped. Only a document that is
    /// not a FeatureCollection at all is an error.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        if collection.kind != "FeatureCollection" {
            return Err(VisitError::GeoJson {
                message: format!("expected FeatureCollection, got {}", collection.kind),
            });
        }

        let total = collection.features.len();
        let regions: Vec<Region> = collection
            .features
            .into_iter()
            .filter_map(Feature::into_region)
            .collect();

        if regions.len() < total {
            debug!(
                "[RegionIndex] Skipped {} of {} features (unsupported geometry or no name)",
                total - regions.len(),
                total
            );
        }
        info!("[RegionIndex] Loaded {} regions", regions.len());

        Ok(Self::new(regions))
    }

    /// Read and parse a GeoJSON FeatureCollection file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VisitError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_geojson(&text)
    }

    /// Like [`RegionIndex::from_path`], but an unreadable file yields an
    /// empty index (every point resolves to `None`).
    pub fn from_path_or_empty(path: impl AsRef<Path>) -> Self {
        Self::from_path(path).unwrap_or_else(|e| {
            warn!("[RegionIndex] {}; continuing without regions", e);
            Self::default()
        })
    }

    /// Name of the first region, in input order, containing the point.
    pub fn resolve(&self, point: &GpsPoint) -> Option<&str> {
        let position = self.locate(point)?;
        Some(self.regions[position].name.as_str())
    }

    fn locate(&self, point: &GpsPoint) -> Option<usize> {
        let query = AABB::from_point([point.longitude, point.latitude]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .filter(|b| self.regions[b.position].contains(point))
            .map(|b| b.position)
            .min()
    }

    /// Region by exact name (the first one, if names repeat).
    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Names of regions containing at least one ping, in region order.
    ///
    /// Each ping counts towards the region it resolves to, so overlapping
    /// regions behave exactly as in [`RegionIndex::resolve`].
    pub fn visited(&self, pings: &[Ping]) -> Vec<String> {
        let mut hit = vec![false; self.regions.len()];
        for ping in pings {
            if let Some(position) = self.locate(&ping.point()) {
                hit[position] = true;
            }
        }
        self.regions
            .iter()
            .zip(hit)
            .filter(|(_, hit)| *hit)
            .map(|(region, _)| region.name.clone())
            .collect()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Linear first-match resolution over an ad-hoc list of geometries.
///
/// Non-polygonal geometries never match.
pub fn resolve_country(point: &GpsPoint, countries: &[(Geometry<f64>, String)]) -> Option<String> {
    countries
        .iter()
        .find(|(geometry, _)| contains(point, geometry))
        .map(|(_, name)| name.clone())
}

// ============================================================================
// GeoJSON FeatureCollection
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

impl Feature {
    fn name(&self) -> Option<String> {
        let properties = self.properties.as_ref()?;
        NAME_PROPERTIES
            .iter()
            .filter_map(|key| properties.get(*key)?.as_str())
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }

    fn into_region(self) -> Option<Region> {
        let name = self.name()?;
        let geometry = geometry_from_geojson(self.geometry.as_ref()?)?;
        Some(Region {
            name,
            shape: to_multi_polygon(geometry)?,
        })
    }
}
