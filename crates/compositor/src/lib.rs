//! Geometry composition for streetmap.
//!
//! Both operations take feature sets by reference and return new sets:
//!
//! - [`clip`] keeps the part of each feature inside a bounding box
//! - [`subtract`] removes water polygons from land polygons
//!
//! Inputs are validated first; a malformed geometry or a failure inside the
//! `geo` boolean operations surfaces as [`map_common::MapError::Geometry`].

pub mod clip;
mod kernel;
pub mod subtract;
pub mod validate;

pub use clip::{clip, clip_geometry, clip_line_string, ClipRect, CONTAINMENT_TOLERANCE};
pub use subtract::{subtract, union_all};
pub use validate::{validate_feature, validate_set};
