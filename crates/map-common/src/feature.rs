//! Feature collections produced by the fetchers and consumed by the
//! compositor and renderer.
//!
//! Every collection is read-only once built: transformations return a new
//! collection and leave their input untouched.

use std::collections::BTreeMap;

use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Property holding a county's 5-digit GEOID (state + county FIPS).
pub const PROP_GEOID: &str = "GEOID";
/// Property holding a county's 3-digit county FIPS code.
pub const PROP_COUNTY_FP: &str = "COUNTYFP";
/// Property holding a 2-digit state FIPS code.
pub const PROP_STATE_FP: &str = "STATEFP";
/// Property holding a human-readable name.
pub const PROP_NAME: &str = "NAME";

/// Coarse geometry classification used when splitting provider results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Collection,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                GeometryKind::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => GeometryKind::Polygon,
            Geometry::GeometryCollection(_) => GeometryKind::Collection,
        }
    }
}

/// A single geographic record: geometry plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Provider identifier (OSM id, GEOID, HYDROID...)
    pub id: String,
    /// Value of the tag the feature was fetched by (e.g. road class).
    pub category: Option<String>,
    /// Remaining provider attributes.
    pub properties: BTreeMap<String, String>,
    pub geometry: Geometry<f64>,
}

impl Feature {
    pub fn new(id: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: id.into(),
            category: None,
            properties: BTreeMap::new(),
            geometry: geometry.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Same attributes, different geometry.
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            id: self.id.clone(),
            category: self.category.clone(),
            properties: self.properties.clone(),
            geometry,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }

    /// Axis-aligned extent, `None` for empty geometries.
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// A named, ordered collection of features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    name: String,
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy of this set under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.features.clone())
    }

    /// New set holding the features that satisfy `predicate`.
    pub fn filtered(&self, predicate: impl Fn(&Feature) -> bool) -> Self {
        Self::new(
            self.name.clone(),
            self.features.iter().filter(|f| predicate(f)).cloned().collect(),
        )
    }

    /// Concatenate several sets, preserving their order.
    pub fn concat<'a>(name: impl Into<String>, sets: impl IntoIterator<Item = &'a FeatureSet>) -> Self {
        let features = sets
            .into_iter()
            .flat_map(|set| set.features.iter().cloned())
            .collect();
        Self::new(name, features)
    }

    /// Combined extent of every feature.
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(Feature::extent)
            .reduce(|a, b| {
                Rect::new(
                    geo_types::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    geo_types::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for category in self.features.iter().filter_map(|f| f.category.as_deref()) {
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// County polygons for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRegion {
    state_fips: String,
    counties: FeatureSet,
}

impl AdminRegion {
    pub fn new(state_fips: impl Into<String>, counties: FeatureSet) -> Self {
        Self {
            state_fips: state_fips.into(),
            counties,
        }
    }

    pub fn state_fips(&self) -> &str {
        &self.state_fips
    }

    pub fn counties(&self) -> &FeatureSet {
        &self.counties
    }

    /// County FIPS codes, in region order, used to join water queries.
    pub fn county_codes(&self) -> Vec<String> {
        self.counties
            .iter()
            .filter_map(|f| f.property(PROP_COUNTY_FP).map(str::to_string))
            .collect()
    }

    /// Same state, replacement county set.
    pub fn with_counties(&self, counties: FeatureSet) -> Self {
        Self::new(self.state_fips.clone(), counties)
    }

    /// Counties whose extent touches `bbox`.
    pub fn intersecting(&self, bbox: &BoundingBox) -> Self {
        self.with_counties(self.counties.filtered(|county| {
            county
                .extent()
                .map_or(false, |extent| bbox.intersects_rect(&extent))
        }))
    }

    /// Counties matching any of `selectors` by name, county FIPS or GEOID
    /// (names compare case-insensitively).
    pub fn retain_counties(&self, selectors: &[String]) -> Self {
        self.with_counties(self.counties.filtered(|county| {
            selectors.iter().any(|sel| {
                county.id == *sel
                    || county.property(PROP_COUNTY_FP) == Some(sel.as_str())
                    || county
                        .property(PROP_NAME)
                        .map_or(false, |name| name.eq_ignore_ascii_case(sel))
            })
        }))
    }
}

/// Water polygons fetched for a set of counties.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterBody {
    state_fips: String,
    county_codes: Vec<String>,
    areas: FeatureSet,
}

impl WaterBody {
    pub fn new(state_fips: impl Into<String>, county_codes: Vec<String>, areas: FeatureSet) -> Self {
        Self {
            state_fips: state_fips.into(),
            county_codes,
            areas,
        }
    }

    pub fn state_fips(&self) -> &str {
        &self.state_fips
    }

    pub fn county_codes(&self) -> &[String] {
        &self.county_codes
    }

    pub fn areas(&self) -> &FeatureSet {
        &self.areas
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}
