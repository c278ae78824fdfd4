//! Clipping feature collections to a bounding box.
//!
//! Lines are clipped segment by segment with Cohen-Sutherland and split
//! into a multi-line when they leave the box and come back. Polygons are
//! intersected with the box polygon. Anything already inside the box is
//! returned untouched, so clipping twice gives the same result as once.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Rect,
};
use map_common::{BoundingBox, Feature, FeatureSet, MapResult};
use rayon::prelude::*;
use tracing::debug;

use crate::kernel;
use crate::validate::validate_set;

/// Slack allowed when deciding that a geometry already lies inside the box.
pub const CONTAINMENT_TOLERANCE: f64 = 1e-9;

/// A clipping rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ClipRect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    fn encloses(&self, extent: &Rect<f64>, tolerance: f64) -> bool {
        extent.min().x >= self.min_x - tolerance
            && extent.max().x <= self.max_x + tolerance
            && extent.min().y >= self.min_y - tolerance
            && extent.max().y <= self.max_y + tolerance
    }

    fn overlaps(&self, extent: &Rect<f64>) -> bool {
        extent.min().x <= self.max_x
            && extent.max().x >= self.min_x
            && extent.min().y <= self.max_y
            && extent.max().y >= self.min_y
    }

    fn to_multi_polygon(self) -> MultiPolygon<f64> {
        let rect = Rect::new(
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
        );
        MultiPolygon::new(vec![rect.to_polygon()])
    }

    /// Snap kernel output onto the rectangle. The boolean ops round their
    /// result to a grid sized by the operand extent, which can leave a ring a
    /// few 1e-7 degrees outside.
    fn clamp(self, mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
        use geo::MapCoords;

        mp.map_coords(move |c: Coord<f64>| Coord {
            x: c.x.clamp(self.min_x, self.max_x),
            y: c.y.clamp(self.min_y, self.max_y),
        })
    }
}

impl From<&BoundingBox> for ClipRect {
    fn from(bbox: &BoundingBox) -> Self {
        ClipRect::new(bbox.min_lon(), bbox.min_lat(), bbox.max_lon(), bbox.max_lat())
    }
}

/// Clip every feature of `features` to `bbox`.
///
/// Features entirely outside are dropped; the rest keep their id, category
/// and properties. The input set is not modified.
pub fn clip(features: &FeatureSet, bbox: &BoundingBox) -> MapResult<FeatureSet> {
    validate_set(features)?;

    let rect = ClipRect::from(bbox);
    let clipped: Vec<Option<Feature>> = features
        .features()
        .par_iter()
        .map(|feature| -> MapResult<Option<Feature>> {
            Ok(clip_geometry(&feature.geometry, &rect, &feature.id)?
                .map(|geometry| feature.with_geometry(geometry)))
        })
        .collect::<MapResult<_>>()?;

    let kept: Vec<Feature> = clipped.into_iter().flatten().collect();
    debug!(
        set = features.name(),
        input = features.len(),
        kept = kept.len(),
        "Clipped feature set"
    );
    Ok(FeatureSet::new(features.name(), kept))
}

/// Clip one geometry. `subject` names it in kernel errors.
pub fn clip_geometry(
    geometry: &Geometry<f64>,
    rect: &ClipRect,
    subject: &str,
) -> MapResult<Option<Geometry<f64>>> {
    use geo::BoundingRect;

    let extent = match geometry.bounding_rect() {
        Some(extent) => extent,
        None => return Ok(None),
    };
    if rect.encloses(&extent, CONTAINMENT_TOLERANCE) {
        return Ok(Some(geometry.clone()));
    }
    if !rect.overlaps(&extent) {
        return Ok(None);
    }

    let clipped = match geometry {
        Geometry::Point(p) => rect.contains(p.0).then(|| geometry.clone()),
        Geometry::MultiPoint(mp) => {
            let inside: Vec<_> = mp.iter().filter(|p| rect.contains(p.0)).copied().collect();
            (!inside.is_empty()).then(|| MultiPoint::new(inside).into())
        }
        Geometry::Line(line) => lines_to_geometry(clip_line_string(
            &LineString::new(vec![line.start, line.end]),
            rect,
        )),
        Geometry::LineString(line) => lines_to_geometry(clip_line_string(line, rect)),
        Geometry::MultiLineString(lines) => {
            lines_to_geometry(lines.iter().flat_map(|l| clip_line_string(l, rect)).collect())
        }
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => match kernel::to_multi_polygon(geometry) {
            Some(mp) => {
                let result = kernel::intersection(&mp, &rect.to_multi_polygon(), subject)?;
                kernel::from_multi_polygon(rect.clamp(result))
            }
            None => None,
        },
        Geometry::GeometryCollection(collection) => {
            let mut parts = Vec::new();
            for part in collection.iter() {
                if let Some(clipped) = clip_geometry(part, rect, subject)? {
                    parts.push(clipped);
                }
            }
            (!parts.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(parts)))
        }
    };

    Ok(clipped)
}

fn lines_to_geometry(mut pieces: Vec<LineString<f64>>) -> Option<Geometry<f64>> {
    match pieces.len() {
        0 => None,
        1 => pieces.pop().map(Geometry::LineString),
        _ => Some(MultiLineString::new(pieces).into()),
    }
}

/// Clip a line to the rectangle, returning one piece per stretch inside.
pub fn clip_line_string(line: &LineString<f64>, rect: &ClipRect) -> Vec<LineString<f64>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();

    let mut flush = |current: &mut Vec<Coord<f64>>| {
        if current.len() >= 2 {
            pieces.push(LineString::new(std::mem::take(current)));
        } else {
            current.clear();
        }
    };

    for window in line.0.windows(2) {
        let (p0, p1) = (window[0], window[1]);
        match clip_segment(p0, p1, rect) {
            Some((c0, c1)) if c0 != c1 => {
                if current.last() != Some(&c0) {
                    flush(&mut current);
                    current.push(c0);
                }
                current.push(c1);
                // left the box through this segment
                if c1 != p1 {
                    flush(&mut current);
                }
            }
            _ => flush(&mut current),
        }
    }
    flush(&mut current);

    pieces
}

/// Cohen-Sutherland region codes
const INSIDE: u8 = 0b0000;
const LEFT: u8 = 0b0001;
const RIGHT: u8 = 0b0010;
const BOTTOM: u8 = 0b0100;
const TOP: u8 = 0b1000;

fn outcode(p: Coord<f64>, rect: &ClipRect) -> u8 {
    let mut code = INSIDE;
    if p.x < rect.min_x {
        code |= LEFT;
    }
    if p.x > rect.max_x {
        code |= RIGHT;
    }
    if p.y < rect.min_y {
        code |= BOTTOM;
    }
    if p.y > rect.max_y {
        code |= TOP;
    }
    code
}

fn clip_segment(
    mut p0: Coord<f64>,
    mut p1: Coord<f64>,
    rect: &ClipRect,
) -> Option<(Coord<f64>, Coord<f64>)> {
    let mut code0 = outcode(p0, rect);
    let mut code1 = outcode(p1, rect);

    loop {
        if (code0 | code1) == 0 {
            return Some((p0, p1));
        }
        if (code0 & code1) != 0 {
            return None;
        }

        let code_out = if code0 != 0 { code0 } else { code1 };
        let dx = p1.x - p0.x;
        let dy = p1.y - p0.y;

        let new_point = if code_out & TOP != 0 {
            let t = (rect.max_y - p0.y) / dy;
            Coord { x: p0.x + t * dx, y: rect.max_y }
        } else if code_out & BOTTOM != 0 {
            let t = (rect.min_y - p0.y) / dy;
            Coord { x: p0.x + t * dx, y: rect.min_y }
        } else if code_out & RIGHT != 0 {
            let t = (rect.max_x - p0.x) / dx;
            Coord { x: rect.max_x, y: p0.y + t * dy }
        } else {
            let t = (rect.min_x - p0.x) / dx;
            Coord { x: rect.min_x, y: p0.y + t * dy }
        };

        if code_out == code0 {
            p0 = new_point;
            code0 = outcode(p0, rect);
        } else {
            p1 = new_point;
            code1 = outcode(p1, rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Polygon};
    use test_utils::{square, zigzag};

    fn ten() -> ClipRect {
        ClipRect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_clip_point_inside_and_outside() {
        let inside: Geometry<f64> = point!(x: 5.0, y: 5.0).into();
        let outside: Geometry<f64> = point!(x: 15.0, y: 5.0).into();
        assert!(clip_geometry(&inside, &ten(), "p").unwrap().is_some());
        assert!(clip_geometry(&outside, &ten(), "p").unwrap().is_none());
    }

    #[test]
    fn test_clip_line_crossing() {
        let line = LineString::from(vec![(-5.0, 5.0), (15.0, 5.0)]);
        let pieces = clip_line_string(&line, &ten());
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].0, vec![Coord { x: 0.0, y: 5.0 }, Coord { x: 10.0, y: 5.0 }]);
    }

    #[test]
    fn test_clip_line_outside() {
        let line = LineString::from(vec![(-5.0, -5.0), (-1.0, 20.0)]);
        assert!(clip_line_string(&line, &ten()).is_empty());
    }

    #[test]
    fn test_clip_line_reentering_splits() {
        let line = zigzag(0.0, 10.0, 0.0, 10.0, 3);
        let pieces = clip_line_string(&line, &ten());
        assert_eq!(pieces.len(), 4);
        for piece in &pieces {
            assert!(piece.0.iter().all(|c| ten().contains(*c)));
        }
    }

    #[test]
    fn test_clip_polygon_partial() {
        let poly: Geometry<f64> = square(-5.0, -5.0, 10.0).into();
        let clipped = clip_geometry(&poly, &ten(), "poly").unwrap().unwrap();

        use geo::Area;
        assert!((clipped.unsigned_area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_polygon_outside() {
        let poly: Geometry<f64> = square(20.0, 20.0, 5.0).into();
        assert!(clip_geometry(&poly, &ten(), "poly").unwrap().is_none());
    }

    #[test]
    fn test_clip_geometry_collection() {
        let collection: Geometry<f64> = Geometry::GeometryCollection(GeometryCollection(vec![
            point!(x: 5.0, y: 5.0).into(),
            point!(x: 50.0, y: 5.0).into(),
            LineString::from(vec![(-5.0, 2.0), (5.0, 2.0)]).into(),
            square(20.0, 20.0, 2.0).into(),
        ]));

        match clip_geometry(&collection, &ten(), "gc").unwrap() {
            Some(Geometry::GeometryCollection(parts)) => {
                assert_eq!(parts.0.len(), 2);
                assert_eq!(parts.0[0], Geometry::Point(point!(x: 5.0, y: 5.0)));
                match &parts.0[1] {
                    Geometry::LineString(line) => assert_eq!(
                        line.0,
                        vec![Coord { x: 0.0, y: 2.0 }, Coord { x: 5.0, y: 2.0 }]
                    ),
                    other => panic!("expected line, got {:?}", other),
                }
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_clip_collection_all_outside() {
        let collection: Geometry<f64> = Geometry::GeometryCollection(GeometryCollection(vec![
            point!(x: 50.0, y: 5.0).into(),
            point!(x: -3.0, y: 12.0).into(),
        ]));
        assert!(clip_geometry(&collection, &ten(), "gc").unwrap().is_none());
    }

    #[test]
    fn test_clamp_snaps_onto_rect() {
        let stray = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(-1e-7, 0.0), (10.0 + 2e-7, 0.0), (10.0, 10.0), (0.0, 10.0), (-1e-7, 0.0)]),
            vec![],
        )]);
        let snapped = ten().clamp(stray);
        assert!(snapped.0[0].exterior().0.iter().all(|c| ten().contains(*c)));
    }

    #[test]
    fn test_inside_geometry_returned_unchanged() {
        let poly: Geometry<f64> = square(2.0, 2.0, 3.0).into();
        assert_eq!(clip_geometry(&poly, &ten(), "poly").unwrap(), Some(poly));
    }
}
