//! Tests for county region and water fan-out behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use map_common::{Feature, FeatureSet, MapError, MapResult, PROP_COUNTY_FP, PROP_NAME};
use map_sources::{AdminRegionFetcher, BoundaryDetail, BoundarySource, WaterSource};
use test_utils::fixtures::michigan;
use test_utils::square;

// ============================================================================
// In-memory sources
// ============================================================================

struct MichiganCounties;

#[async_trait]
impl BoundarySource for MichiganCounties {
    fn name(&self) -> &str {
        "memory"
    }

    async fn counties(&self, state_fips: &str, _detail: BoundaryDetail) -> MapResult<FeatureSet> {
        assert_eq!(state_fips, michigan::STATE_FIPS);
        let county = |code: &str, name: &str, x: f64| {
            Feature::new(format!("26{}", code), square(x, 0.0, 1.0))
                .with_property(PROP_COUNTY_FP, code)
                .with_property(PROP_NAME, name)
        };
        Ok(FeatureSet::new(
            "counties",
            vec![
                county(michigan::INGHAM, "Ingham", 0.0),
                county(michigan::EATON, "Eaton", 2.0),
                county(michigan::CLINTON, "Clinton", 4.0),
            ],
        ))
    }
}

/// One water polygon per county, each answered after a per-county delay.
struct DelayedWater {
    delays_ms: HashMap<&'static str, u64>,
    fail_county: Option<&'static str>,
    calls: AtomicUsize,
}

impl DelayedWater {
    fn new(delays: &[(&'static str, u64)]) -> Self {
        Self {
            delays_ms: delays.iter().cloned().collect(),
            fail_county: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, county: &'static str) -> Self {
        self.fail_county = Some(county);
        self
    }
}

#[async_trait]
impl WaterSource for DelayedWater {
    fn name(&self) -> &str {
        "memory"
    }

    async fn area_water(&self, state_fips: &str, county_fp: &str) -> MapResult<FeatureSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.get(county_fp).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.fail_county == Some(county_fp) {
            return Err(MapError::data_source("memory", format!("water {}", county_fp), "HTTP status 503"));
        }

        Ok(FeatureSet::new(
            "water",
            vec![Feature::new(format!("lake-{}", county_fp), square(0.2, 0.2, 0.1))
                .with_property("GEOID", format!("{}{}", state_fips, county_fp))],
        ))
    }
}

fn fetcher(water: DelayedWater) -> (AdminRegionFetcher, Arc<DelayedWater>) {
    let water = Arc::new(water);
    let fetcher = AdminRegionFetcher::new(Arc::new(MichiganCounties), water.clone());
    (fetcher, water)
}

// ============================================================================
// fetch_regions tests
// ============================================================================

#[tokio::test]
async fn test_fetch_regions_by_usps_code() {
    let (fetcher, _) = fetcher(DelayedWater::new(&[]));
    let region = fetcher.fetch_regions("MI").await.unwrap();

    assert_eq!(region.state_fips(), michigan::STATE_FIPS);
    assert_eq!(
        region.county_codes(),
        vec![michigan::INGHAM, michigan::EATON, michigan::CLINTON]
    );
}

// ============================================================================
// fetch_water tests
// ============================================================================

#[tokio::test]
async fn test_fetch_water_is_union_in_county_order() {
    // Reverse completion order: Clinton first, Ingham last
    let (fetcher, water) = fetcher(DelayedWater::new(&[
        (michigan::INGHAM, 60),
        (michigan::EATON, 30),
        (michigan::CLINTON, 0),
    ]));
    let region = fetcher.fetch_regions("26").await.unwrap();
    let body = fetcher.fetch_water(&region).await.unwrap();

    let ids: Vec<&str> = body.areas().iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["lake-065", "lake-045", "lake-037"]);
    assert_eq!(body.county_codes().len(), 3);
    assert_eq!(water.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fetch_water_same_result_with_serial_requests() {
    let (concurrent, _) = fetcher(DelayedWater::new(&[(michigan::INGHAM, 20)]));
    let (serial, _) = fetcher(DelayedWater::new(&[(michigan::INGHAM, 20)]));
    let serial = serial.with_max_concurrent(1);

    let region = concurrent.fetch_regions("26").await.unwrap();
    let a = concurrent.fetch_water(&region).await.unwrap();
    let b = serial.fetch_water(&region).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_fetch_water_first_failure_aborts() {
    let (fetcher, _) = fetcher(DelayedWater::new(&[]).failing_on(michigan::EATON));
    let region = fetcher.fetch_regions("26").await.unwrap();

    let err = fetcher.fetch_water(&region).await.unwrap_err();
    assert_eq!(err.kind(), "data_source");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_fetch_water_for_selected_counties_only() {
    let (fetcher, water) = fetcher(DelayedWater::new(&[]));
    let region = fetcher
        .fetch_regions("26")
        .await
        .unwrap()
        .retain_counties(&["Ingham".to_string()]);

    let body = fetcher.fetch_water(&region).await.unwrap();
    assert_eq!(body.areas().len(), 1);
    assert_eq!(water.calls.load(Ordering::SeqCst), 1);
}
