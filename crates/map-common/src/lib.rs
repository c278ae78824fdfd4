//! Common types shared by the streetmap crates: bounding boxes, feature
//! collections, styles and the error taxonomy.

pub mod bbox;
pub mod error;
pub mod feature;
pub mod style;

pub use bbox::BoundingBox;
pub use error::{MapError, MapResult, RecoverEmpty};
pub use feature::{
    AdminRegion, Feature, FeatureSet, GeometryKind, WaterBody, PROP_COUNTY_FP, PROP_GEOID, PROP_NAME,
    PROP_STATE_FP,
};
pub use style::{CategoryColors, Color, LayerStyle, MarkerShape, MarkerStyle};
