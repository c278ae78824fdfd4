//! Thin wrappers over the `geo` boolean operations.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::BooleanOps;
use geo_types::{Geometry, MultiPolygon, Polygon};
use map_common::{MapError, MapResult};

/// Polygonal geometries as a multipolygon; `None` for anything else.
pub fn to_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

/// Collapse a kernel result: nothing, a single polygon or a multipolygon.
pub fn from_multi_polygon(mp: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let mut polygons: Vec<Polygon<f64>> = mp
        .0
        .into_iter()
        .filter(|p| p.exterior().0.len() >= 4)
        .collect();

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

fn guarded<F>(op: &str, subject: &str, f: F) -> MapResult<MultiPolygon<f64>>
where
    F: FnOnce() -> MultiPolygon<f64>,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        MapError::Geometry(format!("{} failed for '{}': {}", op, subject, detail))
    })
}

pub fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, subject: &str) -> MapResult<MultiPolygon<f64>> {
    guarded("intersection", subject, || a.intersection(b))
}

pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, subject: &str) -> MapResult<MultiPolygon<f64>> {
    guarded("union", subject, || a.union(b))
}

pub fn difference(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, subject: &str) -> MapResult<MultiPolygon<f64>> {
    guarded("difference", subject, || a.difference(b))
}
