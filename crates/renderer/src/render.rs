//! Rasterizing a [`Scene`] with tiny-skia.

use geo_types::{Coord, Geometry, LineString, Polygon};
use map_common::{Color, LayerStyle, MapError, MapResult, MarkerShape, MarkerStyle};
use serde::Deserialize;
use tiny_skia::{FillRule, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, info};

use crate::output::{OutputSpec, RenderedMap};
use crate::scene::{Marker, Scene};
use crate::viewport::Viewport;

/// Renderer limits.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RendererConfig {
    /// Largest canvas accepted, in pixels (width x height)
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

fn default_max_pixels() -> u64 {
    64_000_000
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_pixels: default_max_pixels(),
        }
    }
}

/// Draws scenes to RGBA images.
#[derive(Debug, Clone, Default)]
pub struct MapRenderer {
    config: RendererConfig,
}

/// Render with the default limits.
pub fn render(scene: &Scene, spec: &OutputSpec) -> MapResult<RenderedMap> {
    MapRenderer::default().render(scene, spec)
}

impl MapRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Draw `scene` at the size given by `spec`.
    ///
    /// Layers are drawn in scene order, then markers. Everything is masked
    /// to the pixel rectangle of the scene's bounding box, and markers whose
    /// position lies outside the box are not drawn at all.
    pub fn render(&self, scene: &Scene, spec: &OutputSpec) -> MapResult<RenderedMap> {
        let (width, height) = spec.pixel_size()?;
        let total = width as u64 * height as u64;
        if total > self.config.max_pixels {
            return Err(MapError::Render(format!(
                "{}x{} px exceeds the limit of {} pixels",
                width, height, self.config.max_pixels
            )));
        }

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| MapError::Render(format!("cannot allocate {}x{} canvas", width, height)))?;
        pixmap.fill(sk_color(scene.background()));

        let viewport = Viewport::fit(*scene.bbox(), width, height);
        let mask = crop_mask(&viewport)?;
        let mut canvas = Canvas {
            pixmap: &mut pixmap,
            mask: &mask,
            viewport: &viewport,
        };

        for layer in scene.layers() {
            let style = layer.style();
            for feature in layer.features() {
                let color = style
                    .color_for(feature.category.as_deref())
                    .with_opacity(style.opacity);
                canvas.draw_geometry(&feature.geometry, color, style);
            }
            debug!(layer = layer.name(), features = layer.features().len(), "Drew layer");
        }

        let mut skipped = 0usize;
        for marker in scene.markers() {
            if scene.bbox().contains_point(marker.lon, marker.lat) {
                canvas.draw_marker(marker);
            } else {
                skipped += 1;
            }
        }

        info!(
            width,
            height,
            layers = scene.layers().len(),
            features = scene.feature_count(),
            markers = scene.markers().len() - skipped,
            markers_outside = skipped,
            "Rendered map"
        );

        let pixels = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok(RenderedMap::new(width, height, spec.dpi, pixels))
    }
}

fn sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn stroke(width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

fn crop_mask(viewport: &Viewport) -> MapResult<Mask> {
    let (left, top, right, bottom) = viewport.pixel_bounds();
    let mut mask = Mask::new(viewport.width(), viewport.height())
        .ok_or_else(|| MapError::Render("cannot allocate crop mask".to_string()))?;
    let rect = tiny_skia::Rect::from_ltrb(left, top, right, bottom)
        .ok_or_else(|| MapError::Render("bounding box projects to an empty area".to_string()))?;
    mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, Transform::identity());
    Ok(mask)
}

struct Canvas<'a> {
    pixmap: &'a mut Pixmap,
    mask: &'a Mask,
    viewport: &'a Viewport,
}

impl Canvas<'_> {
    fn draw_geometry(&mut self, geometry: &Geometry<f64>, color: Color, style: &LayerStyle) {
        match geometry {
            Geometry::Point(p) => self.dot(p.0, color, style.stroke_width),
            Geometry::MultiPoint(mp) => {
                for p in mp.iter() {
                    self.dot(p.0, color, style.stroke_width);
                }
            }
            Geometry::Line(line) => {
                let ls = LineString::new(vec![line.start, line.end]);
                self.stroke_lines(std::iter::once(&ls), color, style.stroke_width);
            }
            Geometry::LineString(ls) => self.stroke_lines(std::iter::once(ls), color, style.stroke_width),
            Geometry::MultiLineString(mls) => self.stroke_lines(mls.iter(), color, style.stroke_width),
            Geometry::Polygon(p) => self.fill_polygons(std::iter::once(p), color, style),
            Geometry::MultiPolygon(mp) => self.fill_polygons(mp.iter(), color, style),
            Geometry::Rect(r) => self.fill_polygons(std::iter::once(&r.to_polygon()), color, style),
            Geometry::Triangle(t) => self.fill_polygons(std::iter::once(&t.to_polygon()), color, style),
            Geometry::GeometryCollection(gc) => {
                for g in gc.iter() {
                    self.draw_geometry(g, color, style);
                }
            }
        }
    }

    fn trace(&self, pb: &mut PathBuilder, coords: &[Coord<f64>], close: bool) {
        let mut points = coords.iter().map(|c| self.viewport.project(c.x, c.y));
        if let Some((x, y)) = points.next() {
            pb.move_to(x, y);
            for (x, y) in points {
                pb.line_to(x, y);
            }
            if close {
                pb.close();
            }
        }
    }

    fn stroke_lines<'g>(
        &mut self,
        lines: impl Iterator<Item = &'g LineString<f64>>,
        color: Color,
        width: f32,
    ) {
        if width <= 0.0 {
            return;
        }
        let mut pb = PathBuilder::new();
        for line in lines {
            self.trace(&mut pb, &line.0, false);
        }
        if let Some(path) = pb.finish() {
            self.stroke_path(&path, color, width);
        }
    }

    fn fill_polygons<'g>(
        &mut self,
        polygons: impl Iterator<Item = &'g Polygon<f64>>,
        color: Color,
        style: &LayerStyle,
    ) {
        let mut pb = PathBuilder::new();
        for polygon in polygons {
            self.trace(&mut pb, &polygon.exterior().0, true);
            for hole in polygon.interiors() {
                self.trace(&mut pb, &hole.0, true);
            }
        }
        let path = match pb.finish() {
            Some(path) => path,
            None => return,
        };

        self.pixmap.fill_path(
            &path,
            &paint(color),
            FillRule::EvenOdd,
            Transform::identity(),
            Some(self.mask),
        );
        if let Some(edge) = style.edge_color {
            if style.stroke_width > 0.0 {
                self.stroke_path(&path, edge.with_opacity(style.opacity), style.stroke_width);
            }
        }
    }

    fn stroke_path(&mut self, path: &Path, color: Color, width: f32) {
        self.pixmap.stroke_path(
            path,
            &paint(color),
            &stroke(width),
            Transform::identity(),
            Some(self.mask),
        );
    }

    fn dot(&mut self, at: Coord<f64>, color: Color, diameter: f32) {
        let (x, y) = self.viewport.project(at.x, at.y);
        if let Some(path) = PathBuilder::from_circle(x, y, (diameter / 2.0).max(0.5)) {
            self.pixmap
                .fill_path(&path, &paint(color), FillRule::Winding, Transform::identity(), Some(self.mask));
        }
    }

    fn draw_marker(&mut self, marker: &Marker) {
        let (x, y) = self.viewport.project(marker.lon, marker.lat);
        let path = match marker_path(x, y, &marker.style) {
            Some(path) => path,
            None => return,
        };

        self.pixmap.fill_path(
            &path,
            &paint(marker.style.color),
            FillRule::Winding,
            Transform::identity(),
            Some(self.mask),
        );
        if let Some(edge) = marker.style.edge_color {
            self.stroke_path(&path, edge, (marker.style.size / 8.0).max(1.0));
        }
    }
}

fn marker_path(x: f32, y: f32, style: &MarkerStyle) -> Option<Path> {
    let r = style.size / 2.0;
    match style.shape {
        MarkerShape::Circle => PathBuilder::from_circle(x, y, r),
        MarkerShape::Square => {
            tiny_skia::Rect::from_xywh(x - r, y - r, style.size, style.size).map(PathBuilder::from_rect)
        }
        MarkerShape::Star => {
            let mut pb = PathBuilder::new();
            for i in 0..10 {
                let radius = if i % 2 == 0 { r } else { r * 0.4 };
                let angle = std::f32::consts::PI * (i as f32 / 5.0) - std::f32::consts::FRAC_PI_2;
                let (px, py) = (x + radius * angle.cos(), y + radius * angle.sin());
                if i == 0 {
                    pb.move_to(px, py);
                } else {
                    pb.line_to(px, py);
                }
            }
            pb.close();
            pb.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_path_bounds() {
        let path = marker_path(50.0, 50.0, &MarkerStyle::new(Color::BLACK).with_size(20.0).with_shape(MarkerShape::Star))
            .unwrap();
        let b = path.bounds();
        assert!(b.top() >= 39.9 && b.bottom() <= 60.1);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(RendererConfig::default().max_pixels, 64_000_000);
    }
}
