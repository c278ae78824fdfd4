//! Bounding box types and operations.

use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// A rectangular geographic query region in degrees (EPSG:4326).
///
/// Always valid: `min < max` on both axes and every bound is finite. The
/// fields are private so a constructed box cannot be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct BoundingBox {
    min_lon: f64,
    max_lon: f64,
    min_lat: f64,
    max_lat: f64,
}

/// Unvalidated wire form of a [`BoundingBox`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl TryFrom<RawBounds> for BoundingBox {
    type Error = MapError;

    fn try_from(raw: RawBounds) -> MapResult<Self> {
        BoundingBox::new(raw.min_lon, raw.max_lon, raw.min_lat, raw.max_lat)
    }
}

impl From<BoundingBox> for RawBounds {
    fn from(bbox: BoundingBox) -> Self {
        RawBounds {
            min_lon: bbox.min_lon,
            max_lon: bbox.max_lon,
            min_lat: bbox.min_lat,
            max_lat: bbox.max_lat,
        }
    }
}

impl BoundingBox {
    /// Create a bounding box from explicit bounds.
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> MapResult<Self> {
        let bounds = [min_lon, max_lon, min_lat, max_lat];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(MapError::InvalidBounds(format!(
                "bounds must be finite, got lon [{}, {}] lat [{}, {}]",
                min_lon, max_lon, min_lat, max_lat
            )));
        }
        if min_lon >= max_lon {
            return Err(MapError::InvalidBounds(format!(
                "min_lon {} must be less than max_lon {}",
                min_lon, max_lon
            )));
        }
        if min_lat >= max_lat {
            return Err(MapError::InvalidBounds(format!(
                "min_lat {} must be less than max_lat {}",
                min_lat, max_lat
            )));
        }

        Ok(Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        })
    }

    /// Parse a "min_lon,min_lat,max_lon,max_lat" string.
    pub fn from_bbox_string(s: &str) -> MapResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(MapError::InvalidBounds(format!(
                "{}. Expected 'minx,miny,maxx,maxy'",
                s
            )));
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| MapError::InvalidBounds(format!("invalid number '{}'", part)))?;
        }

        Self::new(values[0], values[2], values[1], values[3])
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Center point as (lon, lat).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Check if a rectangle lies inside this bbox, allowing `tolerance`
    /// degrees of slack on every edge.
    pub fn contains_rect(&self, rect: &Rect<f64>, tolerance: f64) -> bool {
        rect.min().x >= self.min_lon - tolerance
            && rect.max().x <= self.max_lon + tolerance
            && rect.min().y >= self.min_lat - tolerance
            && rect.max().y <= self.max_lat + tolerance
    }

    /// Check if this bbox intersects another (touching edges count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Check if this bbox intersects a rectangle (touching edges count).
    pub fn intersects_rect(&self, rect: &Rect<f64>) -> bool {
        self.min_lon <= rect.max().x
            && self.max_lon >= rect.min().x
            && self.min_lat <= rect.max().y
            && self.max_lat >= rect.min().y
    }

    /// Compute the intersection of two bounding boxes.
    ///
    /// Returns `None` when the overlap has no area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        BoundingBox::new(
            self.min_lon.max(other.min_lon),
            self.max_lon.min(other.max_lon),
            self.min_lat.max(other.min_lat),
            self.max_lat.min(other.max_lat),
        )
        .ok()
    }

    /// Return a new box grown by `margin` degrees on every side.
    pub fn expand_by(&self, margin: f64) -> MapResult<BoundingBox> {
        BoundingBox::new(
            self.min_lon - margin,
            self.max_lon + margin,
            self.min_lat - margin,
            self.max_lat + margin,
        )
    }

    /// The box as a `geo_types::Rect` (x = lon, y = lat).
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Overpass QL bbox filter: "south,west,north,east".
    pub fn to_overpass(&self) -> String {
        format!(
            "{:.7},{:.7},{:.7},{:.7}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lon [{:.6}, {:.6}] lat [{:.6}, {:.6}]",
            self.min_lon, self.max_lon, self.min_lat, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox_string() {
        let bbox = BoundingBox::from_bbox_string("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(bbox.min_lon(), -125.0);
        assert_eq!(bbox.min_lat(), 24.0);
        assert_eq!(bbox.max_lon(), -66.0);
        assert_eq!(bbox.max_lat(), 50.0);
    }

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let b = BoundingBox::new(5.0, 15.0, 5.0, 15.0).unwrap();
        let c = BoundingBox::new(20.0, 30.0, 20.0, 30.0).unwrap();

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection.min_lon(), 5.0);
        assert_eq!(intersection.min_lat(), 5.0);
        assert_eq!(intersection.max_lon(), 10.0);
        assert_eq!(intersection.max_lat(), 10.0);
    }

    #[test]
    fn test_rejects_inverted_axes() {
        assert!(matches!(
            BoundingBox::new(10.0, 5.0, 0.0, 1.0),
            Err(MapError::InvalidBounds(_))
        ));
        assert!(matches!(
            BoundingBox::new(0.0, 1.0, 3.0, 3.0),
            Err(MapError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: BoundingBox = serde_json::from_str(
            r#"{"min_lon":-84.49,"max_lon":-84.46,"min_lat":42.71,"max_lat":42.73}"#,
        )
        .unwrap();
        assert_eq!(ok.max_lat(), 42.73);

        let bad = serde_json::from_str::<BoundingBox>(
            r#"{"min_lon":1.0,"max_lon":0.0,"min_lat":0.0,"max_lat":1.0}"#,
        );
        assert!(bad.is_err());
    }
}
