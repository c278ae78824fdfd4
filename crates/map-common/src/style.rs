//! Drawing styles for scene layers and point markers.
//!
//! Styles deserialize from the job configuration, so colors accept the same
//! spellings the config files use: hex strings, RGB(A) arrays or names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// An RGBA color with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorSpec")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Color spellings accepted in configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    /// "#RRGGBB", "#RRGGBBAA" or a color name
    Text(String),

    /// RGB array: [r, g, b] or [r, g, b, a]
    Array(Vec<u8>),

    /// Explicit RGBA
    Rgba { r: u8, g: u8, b: u8, a: u8 },
}

impl TryFrom<ColorSpec> for Color {
    type Error = String;

    fn try_from(spec: ColorSpec) -> Result<Self, String> {
        match spec {
            ColorSpec::Text(s) => Color::parse(&s),
            ColorSpec::Array(arr) => match arr.as_slice() {
                [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Color::rgba(*r, *g, *b, *a)),
                _ => Err(format!("color array needs 3 or 4 entries, got {}", arr.len())),
            },
            ColorSpec::Rgba { r, g, b, a } => Ok(Color::rgba(r, g, b, a)),
        }
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex string ("#RRGGBB" / "#RRGGBBAA") or a color name.
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex_color(hex).ok_or_else(|| format!("invalid hex color '{}'", s));
        }
        named_color(trimmed).ok_or_else(|| format!("unknown color name '{}'", s))
    }

    /// Alpha scaled by `opacity` (clamped to 0..=1).
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        Self {
            a: (self.a as f32 * opacity).round() as u8,
            ..self
        }
    }

    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, self.a)
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

fn parse_hex_color(s: &str) -> Option<Color> {
    let channel = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();

    match s.len() {
        6 => Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
        8 => Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name.to_lowercase().as_str() {
        "transparent" | "none" => Color::TRANSPARENT,
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "cyan" => Color::rgb(0, 255, 255),
        "magenta" => Color::rgb(255, 0, 255),
        "orange" => Color::rgb(255, 165, 0),
        "purple" => Color::rgb(128, 0, 128),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
        "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
        "dimgray" | "dimgrey" => Color::rgb(105, 105, 105),
        "beige" => Color::rgb(245, 245, 220),
        "tan" => Color::rgb(210, 180, 140),
        "navy" => Color::rgb(0, 0, 128),
        "skyblue" => Color::rgb(135, 206, 235),
        "lightblue" => Color::rgb(173, 216, 230),
        "steelblue" => Color::rgb(70, 130, 180),
        "gold" => Color::rgb(255, 215, 0),
        "crimson" => Color::rgb(220, 20, 60),
        _ => return None,
    };
    Some(color)
}

/// Per-category color lookup, e.g. road class -> color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryColors {
    /// Category value -> color
    #[serde(default)]
    pub colors: BTreeMap<String, Color>,

    /// Color for categories missing from `colors` (layer color when unset)
    #[serde(default)]
    pub default: Option<Color>,
}

impl CategoryColors {
    pub fn new(colors: impl IntoIterator<Item = (String, Color)>) -> Self {
        Self {
            colors: colors.into_iter().collect(),
            default: None,
        }
    }

    pub fn with_default(mut self, color: Color) -> Self {
        self.default = Some(color);
        self
    }

    pub fn color_for(&self, category: Option<&str>) -> Option<Color> {
        category
            .and_then(|c| self.colors.get(c).copied())
            .or(self.default)
    }
}

/// Style applied uniformly to every geometry in a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    /// Fill color for polygons, stroke color for lines
    pub color: Color,

    /// Line width in pixels; also the dot diameter for points
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,

    /// Multiplier applied to every color's alpha (0..=1)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Polygon outline color; no outline when unset
    #[serde(default)]
    pub edge_color: Option<Color>,

    /// Per-feature coloring by category
    #[serde(default)]
    pub category_colors: Option<CategoryColors>,
}

fn default_stroke_width() -> f32 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

impl LayerStyle {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
            edge_color: None,
            category_colors: None,
        }
    }

    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_edge_color(mut self, color: Color) -> Self {
        self.edge_color = Some(color);
        self
    }

    pub fn with_category_colors(mut self, colors: CategoryColors) -> Self {
        self.category_colors = Some(colors);
        self
    }

    /// Color for a feature of the given category, before opacity.
    pub fn color_for(&self, category: Option<&str>) -> Color {
        self.category_colors
            .as_ref()
            .and_then(|cc| cc.color_for(category))
            .unwrap_or(self.color)
    }

    pub fn validate(&self) -> MapResult<()> {
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(MapError::Render(format!(
                "stroke width must be a non-negative number, got {}",
                self.stroke_width
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(MapError::Render(format!(
                "opacity must be within 0..=1, got {}",
                self.opacity
            )));
        }
        Ok(())
    }
}

/// Marker glyph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Star,
}

/// Style of a point marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: Color,

    /// Marker size in pixels (diameter / side)
    #[serde(default = "default_marker_size")]
    pub size: f32,

    #[serde(default)]
    pub shape: MarkerShape,

    #[serde(default)]
    pub edge_color: Option<Color>,
}

fn default_marker_size() -> f32 {
    12.0
}

impl MarkerStyle {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            size: default_marker_size(),
            shape: MarkerShape::default(),
            edge_color: None,
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_shape(mut self, shape: MarkerShape) -> Self {
        self.shape = shape;
        self
    }
}
