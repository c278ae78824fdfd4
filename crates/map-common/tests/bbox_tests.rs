//! Tests for BoundingBox construction and queries.

use map_common::{BoundingBox, MapError};
use test_utils::fixtures::bbox;

fn lansing() -> BoundingBox {
    let (min_lon, max_lon, min_lat, max_lat) = bbox::LANSING;
    BoundingBox::new(min_lon, max_lon, min_lat, max_lat).unwrap()
}

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(-180.0, 180.0, -90.0, 90.0).unwrap();
    assert_eq!(bbox.min_lon(), -180.0);
    assert_eq!(bbox.max_lon(), 180.0);
    assert_eq!(bbox.min_lat(), -90.0);
    assert_eq!(bbox.max_lat(), 90.0);
}

#[test]
fn test_bbox_copy() {
    let bbox1 = lansing();
    let bbox2 = bbox1;
    assert_eq!(bbox1, bbox2);
}

#[test]
fn test_bbox_inverted_longitude_rejected() {
    let (min_lon, max_lon, min_lat, max_lat) = bbox::INVALID;
    let err = BoundingBox::new(min_lon, max_lon, min_lat, max_lat).unwrap_err();
    assert!(matches!(err, MapError::InvalidBounds(_)));
    assert_eq!(err.kind(), "invalid_bounds");
}

#[test]
fn test_bbox_degenerate_rejected() {
    let (min_lon, max_lon, min_lat, max_lat) = bbox::POINT;
    assert!(BoundingBox::new(min_lon, max_lon, min_lat, max_lat).is_err());
}

#[test]
fn test_bbox_nan_rejected() {
    assert!(BoundingBox::new(f64::NAN, 1.0, 0.0, 1.0).is_err());
    assert!(BoundingBox::new(0.0, f64::INFINITY, 0.0, 1.0).is_err());
}

// ============================================================================
// from_bbox_string tests
// ============================================================================

#[test]
fn test_parse_bbox_string_floating() {
    let bbox = BoundingBox::from_bbox_string("-84.493675,42.711814,-84.462183,42.735481").unwrap();
    assert_eq!(bbox, lansing());
}

#[test]
fn test_parse_bbox_string_whitespace() {
    let bbox = BoundingBox::from_bbox_string(" -1.5 , 2 , 3.25 , 4 ").unwrap();
    assert_eq!(bbox.min_lon(), -1.5);
    assert_eq!(bbox.max_lat(), 4.0);
}

#[test]
fn test_parse_bbox_string_too_few() {
    assert!(BoundingBox::from_bbox_string("1,2,3").is_err());
}

#[test]
fn test_parse_bbox_string_invalid_number() {
    let err = BoundingBox::from_bbox_string("1,2,abc,4").unwrap_err();
    assert!(err.to_string().contains("abc"));
}

#[test]
fn test_parse_bbox_string_inverted() {
    assert!(BoundingBox::from_bbox_string("10,10,5,5").is_err());
}

// ============================================================================
// Dimension tests
// ============================================================================

#[test]
fn test_bbox_width_height() {
    let bbox = BoundingBox::new(-10.0, 30.0, -5.0, 15.0).unwrap();
    assert_eq!(bbox.width(), 40.0);
    assert_eq!(bbox.height(), 20.0);
    assert_eq!(bbox.center(), (10.0, 5.0));
}

#[test]
fn test_bbox_expand_by() {
    let grown = lansing().expand_by(0.01).unwrap();
    assert!(grown.min_lon() < lansing().min_lon());
    assert!(grown.max_lat() > lansing().max_lat());
    // original untouched
    assert_eq!(lansing().min_lon(), -84.493675);
}

#[test]
fn test_bbox_expand_by_negative_can_invalidate() {
    let bbox = BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap();
    assert!(bbox.expand_by(-0.6).is_err());
}

// ============================================================================
// Intersection tests
// ============================================================================

#[test]
fn test_bbox_intersects_adjacent_edge() {
    let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
    let b = BoundingBox::new(10.0, 20.0, 0.0, 10.0).unwrap();
    assert!(a.intersects(&b));
    // shared edge has no area
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_bbox_intersection_with_self() {
    let a = lansing();
    assert_eq!(a.intersection(&a), Some(a));
}

// ============================================================================
// Point containment tests
// ============================================================================

#[test]
fn test_bbox_contains_marker_point() {
    let (lon, lat) = test_utils::fixtures::MARKER_INSIDE;
    assert!(lansing().contains_point(lon, lat));

    let (lon, lat) = test_utils::fixtures::MARKER_OUTSIDE;
    assert!(!lansing().contains_point(lon, lat));
}

#[test]
fn test_bbox_contains_point_corner() {
    let bbox = lansing();
    assert!(bbox.contains_point(bbox.min_lon(), bbox.min_lat()));
    assert!(bbox.contains_point(bbox.max_lon(), bbox.max_lat()));
}

// ============================================================================
// Conversion tests
// ============================================================================

#[test]
fn test_overpass_ordering_is_south_west_north_east() {
    assert_eq!(
        lansing().to_overpass(),
        "42.7118140,-84.4936750,42.7354810,-84.4621830"
    );
}

#[test]
fn test_to_rect() {
    let rect = lansing().to_rect();
    assert_eq!(rect.min().x, -84.493675);
    assert_eq!(rect.max().y, 42.735481);
    assert!(lansing().contains_rect(&rect, 0.0));
}
