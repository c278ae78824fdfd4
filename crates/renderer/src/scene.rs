//! Immutable description of what to draw.
//!
//! A [`Scene`] is assembled once with [`SceneBuilder`] and then only read.
//! Layers share their feature sets through `Arc`, so the same composed data
//! can back several scenes with different styles.

use std::sync::Arc;

use map_common::{BoundingBox, Color, FeatureSet, LayerStyle, MapError, MapResult, MarkerStyle};

/// A feature set drawn with one style.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    features: Arc<FeatureSet>,
    style: LayerStyle,
}

impl Layer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }
}

/// A point of interest drawn above every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub lon: f64,
    pub lat: f64,
    pub style: MarkerStyle,
}

impl Marker {
    pub fn new(lon: f64, lat: f64, style: MarkerStyle) -> Self {
        Self { lon, lat, style }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    bbox: BoundingBox,
    background: Color,
    layers: Vec<Layer>,
    markers: Vec<Marker>,
}

impl Scene {
    pub fn builder(bbox: BoundingBox) -> SceneBuilder {
        SceneBuilder::new(bbox)
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Layers in drawing order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Total number of features across all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }
}

pub struct SceneBuilder {
    bbox: BoundingBox,
    background: Color,
    layers: Vec<Layer>,
    markers: Vec<Marker>,
}

impl SceneBuilder {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            background: Color::WHITE,
            layers: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    /// Append a layer; later layers draw on top of earlier ones.
    pub fn layer(
        mut self,
        name: impl Into<String>,
        features: impl Into<Arc<FeatureSet>>,
        style: LayerStyle,
    ) -> Self {
        self.layers.push(Layer {
            name: name.into(),
            features: features.into(),
            style,
        });
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Validate styles and freeze the scene.
    pub fn build(self) -> MapResult<Scene> {
        for layer in &self.layers {
            layer.style.validate().map_err(|e| match e {
                MapError::Render(msg) => MapError::Render(format!("layer '{}': {}", layer.name, msg)),
                other => other,
            })?;
        }
        for marker in &self.markers {
            if !marker.lon.is_finite() || !marker.lat.is_finite() {
                return Err(MapError::Render(format!(
                    "marker at ({}, {}) has non-finite coordinates",
                    marker.lon, marker.lat
                )));
            }
            if !marker.style.size.is_finite() || marker.style.size <= 0.0 {
                return Err(MapError::Render(format!(
                    "marker size must be positive, got {}",
                    marker.style.size
                )));
            }
        }

        Ok(Scene {
            bbox: self.bbox,
            background: self.background,
            layers: self.layers,
            markers: self.markers,
        })
    }
}
