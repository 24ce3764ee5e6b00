//! # Point-in-Polygon Containment
//!
//! Crossing-number (ray casting) containment over `geo` polygons and
//! multipolygons, and decoding of GeoJSON `Polygon` / `MultiPolygon`
//! geometry objects into `geo` types.
//!
//! Containment is a soft filter: anything malformed (no rings, vertices that
//! are not numeric pairs, unsupported geometry types) is simply "not
//! contained" rather than an error.
//!
//! ## Algorithm
//!
//! A horizontal ray is cast from the point towards +∞ longitude. For each
//! ring edge `(xi, yi)-(xj, yj)` the ray crosses the edge iff
//! `(yi > lat) != (yj > lat)` and the edge's x-intercept at `lat` is greater
//! than the point's longitude. An odd number of crossings means inside.
//! Horizontal edges (`yi == yj`) never satisfy the strict test, so the
//! intercept division is never by zero.
//!
//! Vertices are `(x, y) = (lng, lat)` as in GeoJSON.

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::GpsPoint;

/// Crossing-number test of a point against a single ring.
///
/// The ring is treated as closed whether or not its last vertex repeats the
/// first. Rings with fewer than three vertices contain nothing.
pub fn point_in_ring(lng: f64, lat: f64, ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Inside the exterior ring and outside every hole.
pub fn polygon_contains(point: &GpsPoint, polygon: &Polygon<f64>) -> bool {
    let (lng, lat) = (point.longitude, point.latitude);
    if !point_in_ring(lng, lat, polygon.exterior()) {
        return false;
    }
    !polygon
        .interiors()
        .iter()
        .any(|hole| point_in_ring(lng, lat, hole))
}

/// Contained in at least one member polygon.
pub fn multi_polygon_contains(point: &GpsPoint, multi: &MultiPolygon<f64>) -> bool {
    multi.0.iter().any(|polygon| polygon_contains(point, polygon))
}

/// Containment test for any geometry. Only polygonal geometries can contain
/// a point; every other geometry type returns `false`.
///
/// # Example
///
/// ```rust
/// use geo::{polygon, Geometry};
/// use visit_analytics::{contains, GpsPoint};
///
/// let square = Geometry::Polygon(polygon![
///     (x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0),
/// ]);
///
/// assert!(contains(&GpsPoint::new(5.0, 5.0), &square));
/// assert!(!contains(&GpsPoint::new(15.0, 15.0), &square));
/// ```
pub fn contains(point: &GpsPoint, geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => polygon_contains(point, polygon),
        Geometry::MultiPolygon(multi) => multi_polygon_contains(point, multi),
        _ => false,
    }
}

// ============================================================================
// GeoJSON Decoding
// ============================================================================

/// Decode a GeoJSON geometry object (`{"type": ..., "coordinates": ...}`).
///
/// Returns `None` for anything other than a well-formed `Polygon` or
/// `MultiPolygon`: a missing or empty coordinate array, a vertex that is not
/// a pair of numbers, or an unsupported type.
pub fn geometry_from_geojson(value: &Value) -> Option<Geometry<f64>> {
    let kind = value.get("type")?.as_str()?;
    let coordinates = value.get("coordinates")?;

    match kind {
        "Polygon" => decode_polygon(coordinates).map(Geometry::Polygon),
        "MultiPolygon" => decode_multi_polygon(coordinates).map(Geometry::MultiPolygon),
        _ => None,
    }
}

/// Normalize a polygonal geometry to a multipolygon.
pub fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Some(multi),
        _ => None,
    }
}

fn decode_position(value: &Value) -> Option<Coord<f64>> {
    let position = value.as_array()?;
    if position.len() < 2 {
        return None;
    }
    let x = position[0].as_f64()?;
    let y = position[1].as_f64()?;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Coord { x, y })
}

fn decode_ring(value: &Value) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(decode_position)
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

fn decode_polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value
        .as_array()?
        .iter()
        .map(decode_ring)
        .collect::<Option<Vec<_>>>()?
        .into_iter();

    let exterior = rings.next()?;
    if exterior.0.is_empty() {
        return None;
    }
    Some(Polygon::new(exterior, rings.collect()))
}

fn decode_multi_polygon(value: &Value) -> Option<MultiPolygon<f64>> {
    let polygons = value
        .as_array()?
        .iter()
        .map(decode_polygon)
        .collect::<Option<Vec<_>>>()?;
    if polygons.is_empty() {
        return None;
    }
    Some(MultiPolygon::new(polygons))
}
