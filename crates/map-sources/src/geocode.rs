//! Place-name lookup.

use async_trait::async_trait;
use map_common::{BoundingBox, MapError, MapResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::http::{decode_json, send_for_bytes, HttpConfig};

const PROVIDER: &str = "nominatim";

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Resolves a free-text place name to its bounding box.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, place: &str) -> MapResult<BoundingBox>;
}

/// Nominatim search client.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>, http: &HttpConfig) -> MapResult<Self> {
        Ok(Self {
            client: http.build_client(PROVIDER)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self))]
    async fn resolve(&self, place: &str) -> MapResult<BoundingBox> {
        let call = format!("geocode '{}'", place);
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", place), ("format", "jsonv2"), ("limit", "1")]);

        let body = send_for_bytes(PROVIDER, &call, request).await?;
        let bbox = parse_search_response(&body, &call)?;

        info!(%bbox, "Geocoded place");
        Ok(bbox)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    /// `[min_lat, max_lat, min_lon, max_lon]` as strings
    boundingbox: [String; 4],
    #[serde(default)]
    display_name: Option<String>,
}

/// Take the bounding box of the first search hit.
pub fn parse_search_response(body: &[u8], call: &str) -> MapResult<BoundingBox> {
    let results: Vec<SearchResult> = decode_json(PROVIDER, call, body)?;

    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| MapError::empty_result(PROVIDER, call))?;

    let mut values = [0.0f64; 4];
    for (slot, raw) in values.iter_mut().zip(first.boundingbox.iter()) {
        *slot = raw.trim().parse().map_err(|_| {
            MapError::data_source(PROVIDER, call, format!("invalid boundingbox value '{}'", raw))
        })?;
    }
    let [min_lat, max_lat, min_lon, max_lon] = values;

    tracing::debug!(place = first.display_name.as_deref().unwrap_or(""), "Selected search result");
    BoundingBox::new(min_lon, max_lon, min_lat, max_lat)
}
