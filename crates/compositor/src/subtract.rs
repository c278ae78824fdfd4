//! Removing water from land.

use geo::BoundingRect;
use geo_types::{MultiPolygon, Rect};
use map_common::{Feature, FeatureSet, MapResult};
use rayon::prelude::*;
use tracing::debug;

use crate::kernel;
use crate::validate::validate_set;

/// Subtract every polygon of `water` from each polygonal feature of `land`.
///
/// Water polygons are unioned first, then each land feature is differenced
/// against the union. Land attributes are kept; land features that vanish
/// entirely are dropped and non-polygonal land features pass through.
/// Empty water returns the land set unchanged.
pub fn subtract(land: &FeatureSet, water: &FeatureSet) -> MapResult<FeatureSet> {
    validate_set(land)?;
    validate_set(water)?;

    let water_union = match union_all(water)? {
        Some(union) => union,
        None => {
            debug!(land = land.name(), "No water polygons, land unchanged");
            return Ok(land.clone());
        }
    };
    let water_extent = water_union.bounding_rect();

    let results: Vec<Option<Feature>> = land
        .features()
        .par_iter()
        .map(|feature| subtract_feature(feature, &water_union, water_extent.as_ref()))
        .collect::<MapResult<_>>()?;

    let kept: Vec<Feature> = results.into_iter().flatten().collect();
    debug!(
        land = land.name(),
        water_polygons = water_union.0.len(),
        input = land.len(),
        kept = kept.len(),
        "Subtracted water from land"
    );
    Ok(FeatureSet::new(land.name(), kept))
}

/// Union of every polygonal feature in `set`, `None` when it has none.
pub fn union_all(set: &FeatureSet) -> MapResult<Option<MultiPolygon<f64>>> {
    let mut polygons = set
        .iter()
        .filter_map(|f| kernel::to_multi_polygon(&f.geometry).map(|mp| (f.id.as_str(), mp)));

    let (_, mut union) = match polygons.next() {
        Some(first) => first,
        None => return Ok(None),
    };
    for (id, mp) in polygons {
        union = kernel::union(&union, &mp, id)?;
    }
    Ok(Some(union))
}

fn subtract_feature(
    feature: &Feature,
    water: &MultiPolygon<f64>,
    water_extent: Option<&Rect<f64>>,
) -> MapResult<Option<Feature>> {
    let land = match kernel::to_multi_polygon(&feature.geometry) {
        Some(mp) => mp,
        None => return Ok(Some(feature.clone())),
    };

    let disjoint = match (feature.extent(), water_extent) {
        (Some(a), Some(b)) => {
            a.max().x < b.min().x || a.min().x > b.max().x || a.max().y < b.min().y || a.min().y > b.max().y
        }
        _ => true,
    };
    if disjoint {
        return Ok(Some(feature.clone()));
    }

    let remainder = kernel::difference(&land, water, &feature.id)?;
    Ok(kernel::from_multi_polygon(remainder).map(|geometry| feature.with_geometry(geometry)))
}
