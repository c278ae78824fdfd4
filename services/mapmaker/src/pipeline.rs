//! The map composition pipeline.
//!
//! Stages run in a fixed order:
//!
//! 1. resolve the area to a bounding box (geocoding a place name if needed)
//! 2. fetch each configured path layer
//! 3. fetch county land for the configured states, keep the counties that
//!    touch the area, and fetch their water
//! 4. clip every collection to the box
//! 5. subtract water from land
//! 6. assemble the scene: land, then path layers, then markers
//! 7. render and save
//!
//! Every stage returns a new value. [`ComposedData`] can be turned into
//! several scenes with [`Pipeline::compose_scene`] without fetching again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use map_common::{BoundingBox, FeatureSet, MapError, MapResult, RecoverEmpty, WaterBody};
use map_sources::{
    AdminRegionFetcher, BoundarySource, FeatureFetcher, FeatureSource, Geocoder, NominatimGeocoder,
    OverpassClient, TigerClient, WaterSource,
};
use renderer::{MapRenderer, Marker, OutputSpec, RenderedMap, Scene};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{AreaConfig, AreaTarget, JobConfig, LandConfig};

/// Pipeline stage, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveArea,
    FetchPaths,
    FetchRegions,
    FetchWater,
    Clip,
    Subtract,
    Compose,
    Render,
    Save,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResolveArea => "resolve_area",
            Stage::FetchPaths => "fetch_paths",
            Stage::FetchRegions => "fetch_regions",
            Stage::FetchWater => "fetch_water",
            Stage::Clip => "clip",
            Stage::Subtract => "subtract",
            Stage::Compose => "compose",
            Stage::Render => "render",
            Stage::Save => "save",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: MapError,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

trait AtStage<T> {
    fn at(self, stage: Stage) -> PipelineResult<T>;
}

impl<T> AtStage<T> for MapResult<T> {
    fn at(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

/// The four providers a pipeline draws from.
#[derive(Clone)]
pub struct Sources {
    pub geocoder: Arc<dyn Geocoder>,
    pub features: Arc<dyn FeatureSource>,
    pub boundaries: Arc<dyn BoundarySource>,
    pub water: Arc<dyn WaterSource>,
}

impl Sources {
    /// Network clients for the endpoints in `job`.
    pub fn from_config(job: &JobConfig) -> MapResult<Self> {
        let tiger = Arc::new(TigerClient::new(
            job.sources.tiger_base_url.clone(),
            job.sources.tiger_year,
            &job.http,
        )?);

        Ok(Self {
            geocoder: Arc::new(NominatimGeocoder::new(job.sources.nominatim_endpoint.clone(), &job.http)?),
            features: Arc::new(OverpassClient::new(job.sources.overpass_endpoint.clone(), &job.http)?),
            boundaries: tiger.clone(),
            water: tiger,
        })
    }
}

/// A fetched, not yet clipped, path layer.
#[derive(Debug, Clone)]
pub struct PathData {
    pub name: String,
    pub features: FeatureSet,
}

/// Everything fetched for one job.
#[derive(Debug, Clone)]
pub struct FetchedData {
    pub bbox: BoundingBox,
    pub paths: Vec<PathData>,
    /// Counties touching the area, across all configured states
    pub land: Option<FeatureSet>,
    pub water: FeatureSet,
}

/// Clipped and subtracted collections, ready to style.
#[derive(Debug, Clone)]
pub struct ComposedData {
    pub bbox: BoundingBox,
    pub land: Option<Arc<FeatureSet>>,
    pub paths: Vec<(String, Arc<FeatureSet>)>,
}

impl ComposedData {
    pub fn path(&self, name: &str) -> Option<&FeatureSet> {
        self.paths
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, set)| set.as_ref())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub bbox: BoundingBox,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Feature count per drawn layer, in drawing order
    pub layers: Vec<(String, usize)>,
}

pub struct Pipeline {
    sources: Sources,
    features: FeatureFetcher,
    renderer: MapRenderer,
    max_concurrent: usize,
}

impl Pipeline {
    pub fn new(sources: Sources, job: &JobConfig) -> Self {
        Self {
            features: FeatureFetcher::new(sources.features.clone()),
            sources,
            renderer: MapRenderer::new(job.render),
            max_concurrent: job.sources.max_concurrent,
        }
    }

    /// Run every stage and write the image to the job's output path.
    #[instrument(skip_all, fields(output = %job.output.path.display()))]
    pub async fn run(&self, job: &JobConfig) -> PipelineResult<PipelineOutput> {
        let bbox = self.resolve_area(&job.area).await?;
        let fetched = self.fetch(job, bbox).await?;
        let composed = run_blocking(Stage::Clip, move || compose_fetched(fetched)).await?;
        let scene = self.compose_scene(&composed, job)?;

        let renderer = self.renderer.clone();
        let spec = job.output.spec();
        let path = job.output.path.clone();
        let task_scene = scene.clone();
        let (width, height) = run_blocking(Stage::Render, move || {
            let map = renderer.render(&task_scene, &spec).at(Stage::Render)?;
            save(&map, &path)?;
            Ok((map.width(), map.height()))
        })
        .await?;

        let layers = scene
            .layers()
            .iter()
            .map(|l| (l.name().to_string(), l.features().len()))
            .collect();
        info!(
            width,
            height,
            path = %job.output.path.display(),
            "Pipeline finished"
        );

        Ok(PipelineOutput {
            bbox,
            path: job.output.path.clone(),
            width,
            height,
            layers,
        })
    }

    pub async fn resolve_area(&self, area: &AreaConfig) -> PipelineResult<BoundingBox> {
        let target = area
            .target()
            .map_err(|e| MapError::InvalidBounds(format!("{:#}", e)))
            .at(Stage::ResolveArea)?;

        match target {
            AreaTarget::Bounds(bbox) => Ok(bbox),
            AreaTarget::Place(place) => {
                let bbox = self.sources.geocoder.resolve(&place).await.at(Stage::ResolveArea)?;
                info!(
                    place = %place,
                    geocoder = self.sources.geocoder.name(),
                    min_lon = bbox.min_lon(),
                    max_lon = bbox.max_lon(),
                    min_lat = bbox.min_lat(),
                    max_lat = bbox.max_lat(),
                    "Resolved place"
                );
                Ok(bbox)
            }
        }
    }

    /// Fetch path layers and land/water at their natural granularity.
    pub async fn fetch(&self, job: &JobConfig, bbox: BoundingBox) -> PipelineResult<FetchedData> {
        let mut paths = Vec::with_capacity(job.paths.len());
        for layer in &job.paths {
            let features = self
                .features
                .fetch(&bbox, &layer.tag_key, layer.tag_values.as_deref())
                .await
                .or_empty_with(|| {
                    warn!(
                        layer = %layer.name,
                        tag_key = %layer.tag_key,
                        source = self.features.source_name(),
                        "No features found, drawing an empty layer"
                    );
                    FeatureSet::empty(layer.name.clone())
                })
                .at(Stage::FetchPaths)?;
            paths.push(PathData {
                name: layer.name.clone(),
                features: features.renamed(layer.name.clone()),
            });
        }

        let (land, water) = match &job.land {
            Some(land) => {
                let (counties, water) = self.fetch_land(land, &bbox).await?;
                (Some(counties), water)
            }
            None => (None, FeatureSet::empty("water")),
        };

        Ok(FetchedData {
            bbox,
            paths,
            land,
            water,
        })
    }

    async fn fetch_land(&self, land: &LandConfig, bbox: &BoundingBox) -> PipelineResult<(FeatureSet, FeatureSet)> {
        let admin = AdminRegionFetcher::new(self.sources.boundaries.clone(), self.sources.water.clone())
            .with_detail(land.detail)
            .with_max_concurrent(self.max_concurrent);

        let mut counties = Vec::new();
        let mut water = Vec::new();
        for state in land.states() {
            let mut region = admin.fetch_regions(&state).await.at(Stage::FetchRegions)?;
            region = region.intersecting(bbox);
            if !land.counties.is_empty() {
                region = region.retain_counties(&land.counties);
            }
            if region.counties().is_empty() {
                warn!(state = %state, "No counties of this state touch the area");
                continue;
            }
            debug!(
                state = %state,
                counties = region.counties().len(),
                "Selected counties"
            );

            if land.subtract_water {
                let state_fips = region.state_fips().to_string();
                let codes = region.county_codes();
                let body = admin
                    .fetch_water(&region)
                    .await
                    .or_empty_with(|| {
                        warn!(state = %state_fips, "No water found for the selected counties");
                        WaterBody::new(state_fips.clone(), codes.clone(), FeatureSet::empty("water"))
                    })
                    .at(Stage::FetchWater)?;
                water.push(body.areas().clone());
            }
            counties.push(region.counties().clone());
        }

        Ok((FeatureSet::concat("land", &counties), FeatureSet::concat("water", &water)))
    }

    /// Clip everything to the box and remove water from land.
    ///
    /// CPU bound; [`Pipeline::run`] calls this off the async runtime.
    pub fn compose(&self, fetched: FetchedData) -> PipelineResult<ComposedData> {
        compose_fetched(fetched)
    }

    /// Build a scene from composed data using the styles in `job`.
    pub fn compose_scene(&self, composed: &ComposedData, job: &JobConfig) -> PipelineResult<Scene> {
        let mut builder = Scene::builder(composed.bbox).background(job.background);

        if let (Some(land), Some(config)) = (&composed.land, &job.land) {
            builder = builder.layer("land", land.clone(), config.style.clone());
        }

        for (name, features) in &composed.paths {
            let layer = job.path_layer(name).ok_or_else(|| PipelineError {
                stage: Stage::Compose,
                source: MapError::Render(format!("no style configured for layer '{}'", name)),
            })?;
            builder = builder.layer(name.clone(), features.clone(), layer.style.clone());
        }

        for marker in &job.markers {
            builder = builder.marker(Marker::new(marker.lon, marker.lat, marker.style.clone()));
        }

        builder.build().at(Stage::Compose)
    }

    pub fn render(&self, scene: &Scene, spec: &OutputSpec) -> PipelineResult<RenderedMap> {
        self.renderer.render(scene, spec).at(Stage::Render)
    }
}

fn compose_fetched(fetched: FetchedData) -> PipelineResult<ComposedData> {
    let bbox = fetched.bbox;

    let mut paths = Vec::with_capacity(fetched.paths.len());
    for path in &fetched.paths {
        let clipped = compositor::clip(&path.features, &bbox).at(Stage::Clip)?;
        debug!(
            layer = %path.name,
            fetched = path.features.len(),
            kept = clipped.len(),
            "Clipped path layer"
        );
        paths.push((path.name.clone(), Arc::new(clipped)));
    }

    let land = match &fetched.land {
        Some(land) => {
            let land = compositor::clip(land, &bbox).at(Stage::Clip)?;
            let water = compositor::clip(&fetched.water, &bbox).at(Stage::Clip)?;
            let land = compositor::subtract(&land, &water).at(Stage::Subtract)?;
            debug!(land = land.len(), water = water.len(), "Subtracted water from land");
            Some(Arc::new(land))
        }
        None => None,
    };

    Ok(ComposedData { bbox, land, paths })
}

/// Run CPU-bound work on the blocking pool. A panicking task fails `stage`.
async fn run_blocking<T, F>(stage: Stage, work: F) -> PipelineResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        let message = format!("{} task failed: {}", stage, e);
        let source = match stage {
            Stage::Render | Stage::Save => MapError::Render(message),
            _ => MapError::Geometry(message),
        };
        PipelineError { stage, source }
    })?
}

fn save(map: &RenderedMap, path: &Path) -> PipelineResult<()> {
    map.save(path).at(Stage::Save)
}
