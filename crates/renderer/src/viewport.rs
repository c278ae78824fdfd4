//! Geographic to pixel mapping.

use map_common::BoundingBox;

/// Equirectangular projection of a bounding box onto a canvas.
///
/// Longitudes are scaled by the cosine of the box's center latitude so the
/// map keeps its ground aspect ratio. The box is fitted inside the canvas
/// and centered; any leftover margin is background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    bbox: BoundingBox,
    width: u32,
    height: u32,
    lon_scale: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(bbox: BoundingBox, width: u32, height: u32) -> Self {
        let (_, center_lat) = bbox.center();
        let lon_scale = center_lat.to_radians().cos().max(1e-6);

        let ground_w = bbox.width() * lon_scale;
        let ground_h = bbox.height();
        let scale = (width as f64 / ground_w).min(height as f64 / ground_h);

        Self {
            bbox,
            width,
            height,
            lon_scale,
            scale,
            offset_x: (width as f64 - ground_w * scale) / 2.0,
            offset_y: (height as f64 - ground_h * scale) / 2.0,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel position of a lon/lat; y grows downward.
    pub fn project(&self, lon: f64, lat: f64) -> (f32, f32) {
        let x = self.offset_x + (lon - self.bbox.min_lon()) * self.lon_scale * self.scale;
        let y = self.offset_y + (self.bbox.max_lat() - lat) * self.scale;
        (x as f32, y as f32)
    }

    /// Pixel rectangle covered by the bounding box: (left, top, right, bottom).
    pub fn pixel_bounds(&self) -> (f32, f32, f32, f32) {
        let (left, top) = self.project(self.bbox.min_lon(), self.bbox.max_lat());
        let (right, bottom) = self.project(self.bbox.max_lon(), self.bbox.min_lat());
        (left, top, right, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_equator_square_fills_canvas() {
        let bbox = BoundingBox::new(0.0, 1.0, -0.5, 0.5).unwrap();
        let vp = Viewport::fit(bbox, 100, 100);
        let (l, t, r, b) = vp.pixel_bounds();
        assert_approx_eq!(l, 0.0, 0.01);
        assert_approx_eq!(t, 0.0, 0.01);
        assert_approx_eq!(r, 100.0, 0.01);
        assert_approx_eq!(b, 100.0, 0.01);
    }

    #[test]
    fn test_high_latitude_is_narrower() {
        // one degree square at 60N is about half as wide as tall
        let bbox = BoundingBox::new(10.0, 11.0, 59.5, 60.5).unwrap();
        let vp = Viewport::fit(bbox, 200, 200);
        let (l, t, r, b) = vp.pixel_bounds();
        assert_approx_eq!(b - t, 200.0, 0.01);
        assert_approx_eq!(r - l, 100.0, 0.5);
        // centered horizontally
        assert_approx_eq!(l, 200.0 - r, 0.01);
    }

    #[test]
    fn test_north_is_up() {
        let bbox = BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let vp = Viewport::fit(bbox, 50, 50);
        let (_, y_north) = vp.project(0.5, 0.9);
        let (_, y_south) = vp.project(0.5, 0.1);
        assert!(y_north < y_south);
    }
}
