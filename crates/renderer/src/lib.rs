//! Map rasterization.
//!
//! A [`Scene`] lists layers of features with their styles plus point
//! markers. [`MapRenderer`] fits the scene's bounding box into the requested
//! output size, draws it with tiny-skia and hands back a [`RenderedMap`]
//! that can be encoded to PNG.

pub mod output;
pub mod png;
pub mod render;
pub mod scene;
pub mod viewport;

pub use output::{OutputSpec, RenderedMap, Units};
pub use render::{render, MapRenderer, RendererConfig};
pub use scene::{Layer, Marker, Scene, SceneBuilder};
pub use viewport::Viewport;
