//! Tests for Overpass response parsing against recorded payloads.

use map_common::{GeometryKind, MapError};
use map_sources::overpass::parse_response;
use test_utils::read_testdata;

const CALL: &str = "fetch highway";

// ============================================================================
// Recorded Lansing payload
// ============================================================================

#[test]
fn test_lansing_payload_split() {
    let body = read_testdata("overpass_lansing_highway.json");
    let split = parse_response(body.as_bytes(), "highway", CALL).unwrap();

    assert_eq!(split.lines.len(), 5);
    assert_eq!(split.polygons.len(), 1);
    assert_eq!(split.points.len(), 1);
    assert_eq!(split.total(), 7);
}

#[test]
fn test_lansing_payload_kinds() {
    let body = read_testdata("overpass_lansing_highway.json");
    let split = parse_response(body.as_bytes(), "highway", CALL).unwrap();

    assert!(split.lines.iter().all(|f| f.kind() == GeometryKind::Line));
    assert!(split.polygons.iter().all(|f| f.kind() == GeometryKind::Polygon));
    assert_eq!(split.points.features()[0].id, "node/61989437");
    assert_eq!(
        split.points.features()[0].category.as_deref(),
        Some("traffic_signals")
    );
}

#[test]
fn test_closed_way_needs_area_tag_to_be_polygon() {
    let body = read_testdata("overpass_lansing_highway.json");
    let split = parse_response(body.as_bytes(), "highway", CALL).unwrap();

    assert_eq!(split.polygons.features()[0].id, "way/305511021");
    assert!(split.lines.iter().any(|f| f.id == "way/305511022"));
}

#[test]
fn test_lansing_payload_keeps_tags_as_properties() {
    let body = read_testdata("overpass_lansing_highway.json");
    let split = parse_response(body.as_bytes(), "highway", CALL).unwrap();

    let saginaw = split
        .lines
        .iter()
        .find(|f| f.id == "way/17734823")
        .unwrap();
    assert_eq!(saginaw.category.as_deref(), Some("primary"));
    assert_eq!(saginaw.property("name"), Some("West Saginaw Street"));
    assert_eq!(saginaw.property("oneway"), Some("yes"));
}

#[test]
fn test_categories_in_first_seen_order() {
    let body = read_testdata("overpass_lansing_highway.json");
    let split = parse_response(body.as_bytes(), "highway", CALL).unwrap();

    let categories = split.lines.categories();
    assert_eq!(categories[0], "primary");
    assert!(categories.contains(&"residential"));
}

// ============================================================================
// Failure payloads
// ============================================================================

#[test]
fn test_runtime_error_remark_is_data_source_error() {
    let body = read_testdata("overpass_runtime_error.json");
    let err = parse_response(body.as_bytes(), "highway", CALL).unwrap_err();

    match err {
        MapError::DataSource { provider, call, message } => {
            assert_eq!(provider, "overpass");
            assert_eq!(call, CALL);
            assert!(message.contains("timed out"));
        }
        other => panic!("expected DataSource, got {:?}", other),
    }
}

#[test]
fn test_empty_elements_is_not_an_error() {
    let split = parse_response(br#"{"elements":[]}"#, "highway", CALL).unwrap();
    assert_eq!(split.total(), 0);
}
