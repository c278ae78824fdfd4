//! County boundaries and the water inside them.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use map_common::{AdminRegion, FeatureSet, MapError, MapResult, WaterBody};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::states::resolve_state;

/// Resolution of the county boundary layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryDetail {
    /// Generalized 1:500k cartographic boundaries (shoreline-clipped)
    #[default]
    Cartographic,
    /// Full-resolution TIGER/Line boundaries
    Full,
}

impl BoundaryDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryDetail::Cartographic => "cartographic",
            BoundaryDetail::Full => "full",
        }
    }
}

/// Provides county polygons for a state.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    fn name(&self) -> &str;

    /// All counties of the state with 2-digit FIPS `state_fips`.
    async fn counties(&self, state_fips: &str, detail: BoundaryDetail) -> MapResult<FeatureSet>;
}

/// Provides area-water polygons for a single county.
#[async_trait]
pub trait WaterSource: Send + Sync {
    fn name(&self) -> &str;

    async fn area_water(&self, state_fips: &str, county_fp: &str) -> MapResult<FeatureSet>;
}

/// Default cap on concurrent water downloads.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Fetches county regions and their water bodies.
#[derive(Clone)]
pub struct AdminRegionFetcher {
    boundaries: Arc<dyn BoundarySource>,
    water: Arc<dyn WaterSource>,
    detail: BoundaryDetail,
    max_concurrent: usize,
}

impl AdminRegionFetcher {
    pub fn new(boundaries: Arc<dyn BoundarySource>, water: Arc<dyn WaterSource>) -> Self {
        Self {
            boundaries,
            water,
            detail: BoundaryDetail::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_detail(mut self, detail: BoundaryDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Fetch the counties of `state` (FIPS code, postal code or name).
    #[instrument(skip(self), fields(detail = self.detail.as_str()))]
    pub async fn fetch_regions(&self, state: &str) -> MapResult<AdminRegion> {
        let info = resolve_state(state)?;

        let counties = self.boundaries.counties(info.fips, self.detail).await?;
        if counties.is_empty() {
            return Err(MapError::empty_result(
                self.boundaries.name(),
                format!("counties for state {}", info.fips),
            ));
        }

        info!(
            state = info.usps,
            counties = counties.len(),
            "Fetched county boundaries"
        );
        Ok(AdminRegion::new(info.fips, counties.renamed(format!("counties_{}", info.fips))))
    }

    /// Fetch area water for every county of `region`.
    ///
    /// One request per county, at most `max_concurrent` in flight. The first
    /// failure aborts the remaining requests. Results are concatenated in the
    /// region's county order, whatever order the requests complete in.
    #[instrument(skip(self, region), fields(state = region.state_fips()))]
    pub async fn fetch_water(&self, region: &AdminRegion) -> MapResult<WaterBody> {
        let codes = region.county_codes();
        let state = region.state_fips().to_string();

        debug!(
            counties = codes.len(),
            max_concurrent = self.max_concurrent,
            "Dispatching water requests"
        );

        let mut results: Vec<(usize, FeatureSet)> = stream::iter(codes.iter().cloned().enumerate())
            .map(|(index, county)| {
                let water = Arc::clone(&self.water);
                let state = state.clone();
                async move {
                    let set = water.area_water(&state, &county).await?;
                    debug!(county = %county, features = set.len(), "County water fetched");
                    Ok::<_, MapError>((index, set))
                }
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await?;

        results.sort_by_key(|(index, _)| *index);

        let areas = FeatureSet::concat(
            format!("water_{}", state),
            results.iter().map(|(_, set)| set),
        );

        if areas.is_empty() {
            return Err(MapError::empty_result(
                self.water.name(),
                format!("area water for state {}", state),
            ));
        }

        info!(features = areas.len(), "Fetched area water");
        Ok(WaterBody::new(state, codes, areas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::Feature;
    use test_utils::square;

    struct OneCounty;

    #[async_trait]
    impl BoundarySource for OneCounty {
        fn name(&self) -> &str {
            "memory"
        }

        async fn counties(&self, state_fips: &str, _detail: BoundaryDetail) -> MapResult<FeatureSet> {
            if state_fips != "26" {
                return Ok(FeatureSet::empty("counties"));
            }
            Ok(FeatureSet::new(
                "counties",
                vec![Feature::new("26065", square(0.0, 0.0, 1.0)).with_property("COUNTYFP", "065")],
            ))
        }
    }

    struct NoWater;

    #[async_trait]
    impl WaterSource for NoWater {
        fn name(&self) -> &str {
            "memory"
        }

        async fn area_water(&self, _state_fips: &str, _county_fp: &str) -> MapResult<FeatureSet> {
            Ok(FeatureSet::empty("water"))
        }
    }

    fn fetcher() -> AdminRegionFetcher {
        AdminRegionFetcher::new(Arc::new(OneCounty), Arc::new(NoWater))
    }

    #[tokio::test]
    async fn test_fetch_regions_accepts_state_name() {
        let region = fetcher().fetch_regions("Michigan").await.unwrap();
        assert_eq!(region.state_fips(), "26");
        assert_eq!(region.county_codes(), vec!["065".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_regions_unknown_state() {
        let err = fetcher().fetch_regions("Narnia").await.unwrap_err();
        assert_eq!(err.kind(), "data_source");
    }

    #[tokio::test]
    async fn test_fetch_regions_without_counties_is_empty_result() {
        let err = fetcher().fetch_regions("OH").await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_fetch_water_all_empty_is_empty_result() {
        let f = fetcher();
        let region = f.fetch_regions("MI").await.unwrap();
        let err = f.fetch_water(&region).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_max_concurrent_floor() {
        assert_eq!(fetcher().with_max_concurrent(0).max_concurrent, 1);
    }

    #[test]
    fn test_detail_deserializes_snake_case() {
        let detail: BoundaryDetail = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(detail, BoundaryDetail::Full);
    }
}
