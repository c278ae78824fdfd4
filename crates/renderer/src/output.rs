//! Output sizing and the rendered image.

use std::path::Path;

use map_common::{MapError, MapResult};
use serde::Deserialize;
use tracing::info;

use crate::png::encode_png;

const CM_PER_INCH: f64 = 2.54;

/// Unit of [`OutputSpec::width`] and [`OutputSpec::height`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Px,
    In,
    Cm,
}

/// Requested output size and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OutputSpec {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 {
    96
}

impl OutputSpec {
    pub fn pixels(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            units: Units::Px,
            dpi: default_dpi(),
        }
    }

    pub fn inches(width: f64, height: f64, dpi: u32) -> Self {
        Self {
            width,
            height,
            units: Units::In,
            dpi,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Canvas size in whole pixels.
    pub fn pixel_size(&self) -> MapResult<(u32, u32)> {
        if self.dpi == 0 {
            return Err(MapError::Render("dpi must be positive".to_string()));
        }
        let to_px = |v: f64| -> f64 {
            match self.units {
                Units::Px => v,
                Units::In => v * self.dpi as f64,
                Units::Cm => v / CM_PER_INCH * self.dpi as f64,
            }
        };

        let w = to_px(self.width).round();
        let h = to_px(self.height).round();
        if !w.is_finite() || !h.is_finite() || w < 1.0 || h < 1.0 {
            return Err(MapError::Render(format!(
                "output size {}x{} {:?} is not a positive size",
                self.width, self.height, self.units
            )));
        }
        if w > u32::MAX as f64 || h > u32::MAX as f64 {
            return Err(MapError::Render(format!("output size {}x{} px is too large", w, h)));
        }
        Ok((w as u32, h as u32))
    }
}

/// A rendered map: straight-alpha RGBA pixels, row-major from the top left.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMap {
    width: u32,
    height: u32,
    dpi: u32,
    pixels: Vec<u8>,
}

impl RenderedMap {
    pub(crate) fn new(width: u32, height: u32, dpi: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            dpi,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA at (x, y), `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn encode_png(&self) -> MapResult<Vec<u8>> {
        encode_png(
            &self.pixels,
            self.width as usize,
            self.height as usize,
            Some(self.dpi),
        )
        .map_err(MapError::Render)
    }

    /// Encode and write to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> MapResult<()> {
        let path = path.as_ref();
        let png = self.encode_png()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MapError::Render(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, &png)
            .map_err(|e| MapError::Render(format!("cannot write {}: {}", path.display(), e)))?;

        info!(path = %path.display(), bytes = png.len(), "Saved map image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_units() {
        assert_eq!(OutputSpec::pixels(800, 600).pixel_size().unwrap(), (800, 600));
    }

    #[test]
    fn test_inch_and_cm_units() {
        assert_eq!(OutputSpec::inches(8.0, 6.0, 150).pixel_size().unwrap(), (1200, 900));
        let cm = OutputSpec {
            width: 2.54,
            height: 5.08,
            units: Units::Cm,
            dpi: 100,
        };
        assert_eq!(cm.pixel_size().unwrap(), (100, 200));
    }

    #[test]
    fn test_zero_and_negative_rejected() {
        assert!(OutputSpec::pixels(0, 10).pixel_size().is_err());
        assert!(OutputSpec::inches(-1.0, 2.0, 100).pixel_size().is_err());
        assert!(OutputSpec::inches(f64::NAN, 2.0, 100).pixel_size().is_err());
        assert!(OutputSpec::inches(1.0, 1.0, 0).pixel_size().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let spec: OutputSpec = serde_json::from_str(r#"{"width": 10, "height": 8, "units": "in"}"#).unwrap();
        assert_eq!(spec.units, Units::In);
        assert_eq!(spec.dpi, 96);
    }

    #[test]
    fn test_pixel_lookup() {
        let map = RenderedMap::new(2, 1, 96, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(map.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(map.pixel(2, 0), None);
    }
}
