//! OpenStreetMap features through the Overpass API.
//!
//! Queries are sent as Overpass QL with `out geom`, so ways arrive with
//! their node coordinates inline and no second lookup is needed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use geo_types::{Coord, LineString, Point, Polygon};
use map_common::{BoundingBox, Feature, FeatureSet, MapError, MapResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::features::{describe_call, FeatureSource, SplitFeatures};
use crate::http::{decode_json, send_for_bytes, HttpConfig};

const PROVIDER: &str = "overpass";

/// Public Overpass endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Overpass API client.
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    /// Server-side query timeout, sent as `[timeout:N]`
    query_timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(endpoint: impl Into<String>, http: &HttpConfig) -> MapResult<Self> {
        Ok(Self {
            client: http.build_client(PROVIDER)?,
            endpoint: endpoint.into(),
            query_timeout_secs: server_timeout_secs(http.request_timeout_secs),
        })
    }
}

/// Server-side timeout for a given client timeout. Kept below the client's
/// so a slow query comes back as a `runtime error` remark instead of a
/// dropped connection.
pub fn server_timeout_secs(request_timeout_secs: u64) -> u64 {
    let margin = (request_timeout_secs / 10).max(1);
    request_timeout_secs.saturating_sub(margin).max(1)
}

#[async_trait]
impl FeatureSource for OverpassClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, tag_values), fields(endpoint = %self.endpoint))]
    async fn query(
        &self,
        bbox: &BoundingBox,
        tag_key: &str,
        tag_values: Option<&[String]>,
    ) -> MapResult<SplitFeatures> {
        let call = describe_call(tag_key, tag_values);
        let query = build_query(bbox, tag_key, tag_values, self.query_timeout_secs);

        debug!(query = %query, "Sending Overpass query");

        let request = self.client.post(&self.endpoint).form(&[("data", query.as_str())]);
        let body = send_for_bytes(PROVIDER, &call, request).await?;

        let split = parse_response(&body, tag_key, &call)?;
        info!(
            elements = split.total(),
            lines = split.lines.len(),
            "Overpass query complete"
        );
        Ok(split)
    }
}

/// Build an Overpass QL query for nodes and ways tagged `tag_key`.
pub fn build_query(
    bbox: &BoundingBox,
    tag_key: &str,
    tag_values: Option<&[String]>,
    timeout_secs: u64,
) -> String {
    let filter = match tag_values {
        Some(values) => format!(
            "[\"{}\"~\"^({})$\"]",
            escape_string(tag_key),
            values
                .iter()
                .map(|v| escape_string(&escape_regex(v)))
                .collect::<Vec<_>>()
                .join("|")
        ),
        None => format!("[\"{}\"]", escape_string(tag_key)),
    };
    let area = bbox.to_overpass();

    format!(
        "[out:json][timeout:{timeout}];\n(\n  node{filter}({area});\n  way{filter}({area});\n);\nout geom;",
        timeout = timeout_secs,
        filter = filter,
        area = area,
    )
}

/// Escape a value for use inside an Overpass QL double-quoted string.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape regex metacharacters so tag values match literally.
fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if "\\.+*?()|[]{}^$".contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
    /// Set when the server aborted the query (timeout, memory)
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<LatLon>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for Coord<f64> {
    fn from(p: LatLon) -> Self {
        Coord { x: p.lon, y: p.lat }
    }
}

/// Decode an Overpass JSON response and split it by geometry kind.
///
/// Nodes become points. Ways become lines unless they are closed and tagged
/// `area=yes`, in which case they are polygons. Relations are skipped.
pub fn parse_response(body: &[u8], tag_key: &str, call: &str) -> MapResult<SplitFeatures> {
    let response: OverpassResponse = decode_json(PROVIDER, call, body)?;

    if let Some(remark) = response.remark.as_deref() {
        if remark.contains("error") {
            return Err(MapError::data_source(PROVIDER, call, remark.to_string()));
        }
        warn!(remark, "Overpass returned a remark");
    }

    let mut lines = Vec::new();
    let mut polygons = Vec::new();
    let mut points = Vec::new();
    let mut skipped = 0usize;

    for element in response.elements {
        match element {
            OverpassElement::Node { id, lat, lon, tags } => {
                points.push(to_feature("node", id, Point::new(lon, lat).into(), tags, tag_key));
            }
            OverpassElement::Way { id, geometry, tags } => {
                if geometry.len() < 2 {
                    skipped += 1;
                    continue;
                }
                let coords: Vec<Coord<f64>> = geometry.into_iter().map(Coord::from).collect();
                if !coords.iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
                    return Err(MapError::data_source(
                        PROVIDER,
                        call,
                        format!("way {} has non-finite coordinates", id),
                    ));
                }

                let closed = coords.len() >= 4 && coords.first() == coords.last();
                let is_area = tags.get("area").map(String::as_str) == Some("yes");

                if closed && is_area {
                    let polygon = Polygon::new(LineString::new(coords), vec![]);
                    polygons.push(to_feature("way", id, polygon.into(), tags, tag_key));
                } else {
                    lines.push(to_feature("way", id, LineString::new(coords).into(), tags, tag_key));
                }
            }
            OverpassElement::Relation { id } => {
                debug!(relation = id, "Skipping relation");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped elements without usable geometry");
    }

    Ok(SplitFeatures {
        lines: FeatureSet::new(tag_key, lines),
        polygons: FeatureSet::new(tag_key, polygons),
        points: FeatureSet::new(tag_key, points),
    })
}

fn to_feature(
    kind: &str,
    id: i64,
    geometry: geo_types::Geometry<f64>,
    mut tags: BTreeMap<String, String>,
    tag_key: &str,
) -> Feature {
    let category = tags.remove(tag_key);
    Feature {
        id: format!("{}/{}", kind, id),
        category,
        properties: tags,
        geometry,
    }
}
