//! Input checks run before any geometry reaches the boolean-op kernel.

use geo::CoordsIter;
use geo_types::{Geometry, LineString, Polygon};
use map_common::{Feature, FeatureSet, MapError, MapResult};

/// Check that every feature in `set` is well formed.
pub fn validate_set(set: &FeatureSet) -> MapResult<()> {
    set.iter().try_for_each(validate_feature)
}

/// Check a single feature.
///
/// Rejects non-finite coordinates, lines with fewer than two points and
/// polygon rings that are unclosed or have fewer than four points.
pub fn validate_feature(feature: &Feature) -> MapResult<()> {
    validate_geometry(&feature.geometry).map_err(|reason| {
        MapError::Geometry(format!("feature '{}': {}", feature.id, reason))
    })
}

fn validate_geometry(geometry: &Geometry<f64>) -> Result<(), String> {
    if let Some(c) = geometry.coords_iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(format!("non-finite coordinate ({}, {})", c.x, c.y));
    }

    match geometry {
        Geometry::LineString(line) => check_line(line),
        Geometry::MultiLineString(lines) => lines.iter().try_for_each(check_line),
        Geometry::Polygon(polygon) => check_polygon(polygon),
        Geometry::MultiPolygon(polygons) => polygons.iter().try_for_each(check_polygon),
        Geometry::GeometryCollection(collection) => {
            collection.iter().try_for_each(validate_geometry)
        }
        _ => Ok(()),
    }
}

fn check_line(line: &LineString<f64>) -> Result<(), String> {
    if line.0.len() < 2 {
        return Err(format!("line has {} point(s), need at least 2", line.0.len()));
    }
    Ok(())
}

fn check_polygon(polygon: &Polygon<f64>) -> Result<(), String> {
    check_ring(polygon.exterior(), "exterior")?;
    for (i, ring) in polygon.interiors().iter().enumerate() {
        check_ring(ring, &format!("interior {}", i))?;
    }
    Ok(())
}

fn check_ring(ring: &LineString<f64>, label: &str) -> Result<(), String> {
    if ring.0.len() < 4 {
        return Err(format!("{} ring has {} point(s), need at least 4", label, ring.0.len()));
    }
    if !ring.is_closed() {
        return Err(format!("{} ring is not closed", label));
    }
    Ok(())
}
