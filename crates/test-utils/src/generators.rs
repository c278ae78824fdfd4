//! Geometry generators for synthetic map data.
//!
//! These generators create predictable, verifiable shapes that can be used
//! across the test suite without touching the network.

use geo_types::{Coord, LineString, Polygon};

/// Closed ring through the four corners of an axis-aligned rectangle,
/// counter-clockwise starting at the lower-left corner.
pub fn rect_ring(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> LineString<f64> {
    LineString::from(vec![
        (min_x, min_y),
        (max_x, min_y),
        (max_x, max_y),
        (min_x, max_y),
        (min_x, min_y),
    ])
}

/// Axis-aligned square polygon with its lower-left corner at (x, y).
///
/// # Example
///
/// ```
/// use test_utils::square;
///
/// let sq = square(0.0, 0.0, 2.0);
/// assert_eq!(sq.exterior().0.len(), 5);
/// ```
pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Polygon::new(rect_ring(x, y, x + size, y + size), vec![])
}

/// Square polygon with a square hole in its middle.
///
/// The hole covers the central `hole_fraction` of each side.
pub fn square_with_hole(x: f64, y: f64, size: f64, hole_fraction: f64) -> Polygon<f64> {
    let inset = size * (1.0 - hole_fraction) / 2.0;
    Polygon::new(
        rect_ring(x, y, x + size, y + size),
        vec![rect_ring(x + inset, y + inset, x + size - inset, y + size - inset)],
    )
}

/// Regular polygon approximating a circle.
pub fn circle(cx: f64, cy: f64, radius: f64, segments: usize) -> Polygon<f64> {
    let segments = segments.max(3);
    let mut coords: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let angle = i as f64 / segments as f64 * std::f64::consts::TAU;
            Coord {
                x: cx + radius * angle.cos(),
                y: cy + radius * angle.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);
    Polygon::new(LineString::new(coords), vec![])
}

/// Horizontal and vertical lines covering a box, `count` in each direction,
/// extending `overhang` beyond the box on every side.
///
/// Returns (horizontal, vertical).
pub fn street_grid(
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    count: usize,
    overhang: f64,
) -> (Vec<LineString<f64>>, Vec<LineString<f64>>) {
    let count = count.max(1);
    let step_x = (max_x - min_x) / (count + 1) as f64;
    let step_y = (max_y - min_y) / (count + 1) as f64;

    let horizontal = (1..=count)
        .map(|i| {
            let y = min_y + step_y * i as f64;
            LineString::from(vec![(min_x - overhang, y), (max_x + overhang, y)])
        })
        .collect();
    let vertical = (1..=count)
        .map(|i| {
            let x = min_x + step_x * i as f64;
            LineString::from(vec![(x, min_y - overhang), (x, max_y + overhang)])
        })
        .collect();

    (horizontal, vertical)
}

/// Zig-zag line that leaves and re-enters the horizontal band
/// `min_y..=max_y` `crossings` times.
pub fn zigzag(min_x: f64, max_x: f64, min_y: f64, max_y: f64, crossings: usize) -> LineString<f64> {
    let crossings = crossings.max(1);
    let height = max_y - min_y;
    let step = (max_x - min_x) / (crossings * 2) as f64;
    let coords: Vec<(f64, f64)> = (0..=crossings * 2)
        .map(|i| {
            let x = min_x + step * i as f64;
            let y = if i % 2 == 0 {
                min_y + height / 2.0
            } else {
                max_y + height
            };
            (x, y)
        })
        .collect();
    LineString::from(coords)
}
