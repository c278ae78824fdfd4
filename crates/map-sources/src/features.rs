//! Tagged vector-feature fetching (roads, sidewalks, paths).

use std::sync::Arc;

use async_trait::async_trait;
use map_common::{BoundingBox, FeatureSet, MapError, MapResult};
use tracing::{debug, info, instrument};

/// Provider results for one query, split by geometry kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitFeatures {
    pub lines: FeatureSet,
    pub polygons: FeatureSet,
    pub points: FeatureSet,
}

impl SplitFeatures {
    pub fn total(&self) -> usize {
        self.lines.len() + self.polygons.len() + self.points.len()
    }
}

/// A vector-map provider that can be queried by bbox and tag.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Query features tagged `tag_key` (optionally restricted to
    /// `tag_values`) within `bbox`.
    async fn query(
        &self,
        bbox: &BoundingBox,
        tag_key: &str,
        tag_values: Option<&[String]>,
    ) -> MapResult<SplitFeatures>;
}

/// Fetches line features (roads and paths) from a [`FeatureSource`].
#[derive(Clone)]
pub struct FeatureFetcher {
    source: Arc<dyn FeatureSource>,
}

impl FeatureFetcher {
    pub fn new(source: Arc<dyn FeatureSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch line features tagged `tag_key` inside `bbox`.
    ///
    /// Polygon and point results for the same tag are discarded. Returns
    /// [`MapError::EmptyResult`] when no line matched.
    #[instrument(skip(self, tag_values), fields(source = %self.source.name()))]
    pub async fn fetch(
        &self,
        bbox: &BoundingBox,
        tag_key: &str,
        tag_values: Option<&[String]>,
    ) -> MapResult<FeatureSet> {
        let call = describe_call(tag_key, tag_values);

        if tag_key.trim().is_empty() {
            return Err(MapError::data_source(
                self.source.name(),
                call,
                "tag key must not be empty",
            ));
        }
        if tag_values.map_or(false, |values| values.is_empty()) {
            return Err(MapError::data_source(
                self.source.name(),
                call,
                "tag value filter must list at least one value",
            ));
        }

        let split = self.source.query(bbox, tag_key, tag_values).await?;

        debug!(
            lines = split.lines.len(),
            polygons = split.polygons.len(),
            points = split.points.len(),
            "Split provider results by geometry kind"
        );

        if split.lines.is_empty() {
            return Err(MapError::empty_result(self.source.name(), call));
        }

        info!(tag_key, count = split.lines.len(), "Fetched line features");
        Ok(split.lines)
    }
}

/// Human-readable description of a tag query, e.g. `highway=[primary|residential]`.
pub fn describe_call(tag_key: &str, tag_values: Option<&[String]>) -> String {
    match tag_values {
        Some(values) => format!("fetch {}=[{}]", tag_key, values.join("|")),
        None => format!("fetch {}", tag_key),
    }
}
