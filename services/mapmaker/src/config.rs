//! Job configuration loaded from YAML.
//!
//! A job file describes one map: the area to draw, which tagged path layers
//! to fetch, the land/water background, markers, provider endpoints and the
//! output image. See `config/lansing.yaml` for a complete example.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use map_common::{BoundingBox, Color, LayerStyle, MarkerStyle};
use map_sources::{overpass, geocode, tiger, BoundaryDetail, HttpConfig};
use renderer::{OutputSpec, RendererConfig, Units};
use serde::Deserialize;
use tracing::{debug, info};

/// Root of a job file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub area: AreaConfig,

    /// Tagged line layers, drawn in this order above the land
    #[serde(default)]
    pub paths: Vec<PathLayerConfig>,

    /// County land with water removed; omitted means no land layer
    #[serde(default)]
    pub land: Option<LandConfig>,

    #[serde(default = "default_background")]
    pub background: Color,

    #[serde(default)]
    pub markers: Vec<MarkerConfig>,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub render: RendererConfig,

    pub output: OutputConfig,
}

fn default_background() -> Color {
    Color::WHITE
}

/// Where to draw: explicit bounds or a place name to geocode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AreaConfig {
    #[serde(default)]
    pub bbox: Option<BboxSpec>,

    #[serde(default)]
    pub place: Option<String>,
}

/// Bounds as a "min_lon,min_lat,max_lon,max_lat" string or as named fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BboxSpec {
    Text(String),
    Bounds(BoundingBox),
}

/// Resolved form of [`AreaConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum AreaTarget {
    Bounds(BoundingBox),
    Place(String),
}

impl AreaConfig {
    pub fn target(&self) -> Result<AreaTarget> {
        match (&self.bbox, &self.place) {
            (Some(_), Some(_)) => bail!("area: set either 'bbox' or 'place', not both"),
            (None, None) => bail!("area: one of 'bbox' or 'place' is required"),
            (Some(BboxSpec::Bounds(bbox)), None) => Ok(AreaTarget::Bounds(*bbox)),
            (Some(BboxSpec::Text(s)), None) => {
                let bbox = BoundingBox::from_bbox_string(s).context("area.bbox")?;
                Ok(AreaTarget::Bounds(bbox))
            }
            (None, Some(place)) if place.trim().is_empty() => bail!("area.place must not be empty"),
            (None, Some(place)) => Ok(AreaTarget::Place(place.trim().to_string())),
        }
    }
}

/// One tagged line layer, e.g. roads by `highway` class.
#[derive(Debug, Clone, Deserialize)]
pub struct PathLayerConfig {
    pub name: String,
    pub tag_key: String,

    /// Restrict to these tag values; all values when omitted
    #[serde(default)]
    pub tag_values: Option<Vec<String>>,

    pub style: LayerStyle,
}

/// Accepts `state: MI` as well as `state: [MI, OH]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandConfig {
    /// State FIPS code, USPS code or name; a list for boxes spanning states
    pub state: OneOrMany,

    #[serde(default)]
    pub detail: BoundaryDetail,

    /// County names or codes to keep; all counties touching the area when empty
    #[serde(default)]
    pub counties: Vec<String>,

    #[serde(default = "default_subtract_water")]
    pub subtract_water: bool,

    pub style: LayerStyle,
}

fn default_subtract_water() -> bool {
    true
}

impl LandConfig {
    pub fn states(&self) -> Vec<String> {
        self.state.to_vec()
    }
}

/// Markers carry no text; unknown keys such as `label` are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerConfig {
    pub lon: f64,
    pub lat: f64,
    pub style: MarkerStyle,
}

/// Provider endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_overpass_endpoint")]
    pub overpass_endpoint: String,

    #[serde(default = "default_nominatim_endpoint")]
    pub nominatim_endpoint: String,

    #[serde(default = "default_tiger_base_url")]
    pub tiger_base_url: String,

    #[serde(default = "default_tiger_year")]
    pub tiger_year: u16,

    /// Concurrent per-county water downloads
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_overpass_endpoint() -> String {
    overpass::DEFAULT_ENDPOINT.to_string()
}

fn default_nominatim_endpoint() -> String {
    geocode::DEFAULT_ENDPOINT.to_string()
}

fn default_tiger_base_url() -> String {
    tiger::DEFAULT_BASE_URL.to_string()
}

fn default_tiger_year() -> u16 {
    tiger::DEFAULT_YEAR
}

fn default_max_concurrent() -> usize {
    map_sources::admin::DEFAULT_MAX_CONCURRENT
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            overpass_endpoint: default_overpass_endpoint(),
            nominatim_endpoint: default_nominatim_endpoint(),
            tiger_base_url: default_tiger_base_url(),
            tiger_year: default_tiger_year(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Output image location and size.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 {
    96
}

impl OutputConfig {
    pub fn spec(&self) -> OutputSpec {
        OutputSpec {
            width: self.width,
            height: self.height,
            units: self.units,
            dpi: self.dpi,
        }
    }
}

impl JobConfig {
    /// Load and validate a job file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        let config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid job file {}", path.display()))?;

        info!(
            path = %path.display(),
            paths = config.paths.len(),
            land = config.land.is_some(),
            markers = config.markers.len(),
            "Loaded job configuration"
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(text).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.area.target()?;

        let mut names = HashSet::new();
        for layer in &self.paths {
            if !names.insert(layer.name.as_str()) {
                bail!("paths: layer name '{}' is used twice", layer.name);
            }
        }
        if let Some(land) = &self.land {
            if land.states().is_empty() {
                bail!("land.state must name at least one state");
            }
        }
        if self.sources.max_concurrent == 0 {
            bail!("sources.max_concurrent must be at least 1");
        }

        debug!("Job configuration validated");
        Ok(())
    }

    pub fn path_layer(&self, name: &str) -> Option<&PathLayerConfig> {
        self.paths.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
area:
  bbox: "-84.493675,42.711814,-84.462183,42.735481"
output:
  path: out/map.png
  width: 800
  height: 600
"#;

    #[test]
    fn test_minimal_job_defaults() {
        let job = JobConfig::from_yaml_str(MINIMAL).unwrap();
        assert!(job.paths.is_empty());
        assert!(job.land.is_none());
        assert_eq!(job.background, Color::WHITE);
        assert_eq!(job.sources.tiger_year, tiger::DEFAULT_YEAR);
        assert_eq!(job.output.spec().pixel_size().unwrap(), (800, 600));

        match job.area.target().unwrap() {
            AreaTarget::Bounds(bbox) => {
                assert_eq!(bbox.min_lon(), -84.493675);
                assert_eq!(bbox.max_lat(), 42.735481);
            }
            other => panic!("unexpected area {:?}", other),
        }
    }

    #[test]
    fn test_area_needs_exactly_one_form() {
        let both = MINIMAL.replace("area:\n", "area:\n  place: Lansing\n");
        assert!(JobConfig::from_yaml_str(&both).is_err());

        let neither = "area: {}\noutput: {path: a.png, width: 1, height: 1}\n";
        assert!(JobConfig::from_yaml_str(neither).is_err());
    }

    #[test]
    fn test_bbox_fields_and_place() {
        let fields = r#"
area:
  bbox: {min_lon: 1.0, max_lon: 2.0, min_lat: 3.0, max_lat: 4.0}
output: {path: a.png, width: 4, height: 3, units: in, dpi: 300}
"#;
        let job = JobConfig::from_yaml_str(fields).unwrap();
        assert!(matches!(job.area.target().unwrap(), AreaTarget::Bounds(_)));
        assert_eq!(job.output.spec().pixel_size().unwrap(), (1200, 900));

        let place = "area: {place: ' Lansing, MI '}\noutput: {path: a.png, width: 1, height: 1}\n";
        let job = JobConfig::from_yaml_str(place).unwrap();
        assert_eq!(job.area.target().unwrap(), AreaTarget::Place("Lansing, MI".to_string()));
    }

    #[test]
    fn test_invalid_bbox_rejected() {
        let inverted = MINIMAL.replace("-84.493675,42.711814", "-84.0,42.711814");
        assert!(JobConfig::from_yaml_str(&inverted).is_err());
    }

    #[test]
    fn test_land_state_one_or_many() {
        let one = format!("{}land:\n  state: MI\n  style: {{color: '#f2efe9'}}\n", MINIMAL);
        let job = JobConfig::from_yaml_str(&one).unwrap();
        let land = job.land.unwrap();
        assert_eq!(land.states(), vec!["MI"]);
        assert_eq!(land.detail, BoundaryDetail::Cartographic);
        assert!(land.subtract_water);

        let many = format!(
            "{}land:\n  state: [MI, Ohio]\n  detail: full\n  counties: [Ingham]\n  style: {{color: tan}}\n",
            MINIMAL
        );
        let land = JobConfig::from_yaml_str(&many).unwrap().land.unwrap();
        assert_eq!(land.states(), vec!["MI", "Ohio"]);
        assert_eq!(land.detail, BoundaryDetail::Full);
        assert_eq!(land.counties, vec!["Ingham"]);
    }

    #[test]
    fn test_duplicate_layer_names_rejected() {
        let dup = format!(
            "{}paths:\n  - {{name: roads, tag_key: highway, style: {{color: black}}}}\n  - {{name: roads, tag_key: footway, style: {{color: gray}}}}\n",
            MINIMAL
        );
        let err = JobConfig::from_yaml_str(&dup).unwrap_err();
        assert!(format!("{:#}", err).contains("used twice"));
    }

    #[test]
    fn test_marker_rejects_unknown_keys() {
        let marker = "markers:\n  - {lon: -84.478404, lat: 42.724459, style: {color: crimson}}\n";
        let job = JobConfig::from_yaml_str(&format!("{}{}", MINIMAL, marker)).unwrap();
        assert_eq!(job.markers.len(), 1);

        let labelled = "markers:\n  - {lon: -84.478404, lat: 42.724459, label: Capitol, style: {color: crimson}}\n";
        let err = JobConfig::from_yaml_str(&format!("{}{}", MINIMAL, labelled)).unwrap_err();
        assert!(format!("{:#}", err).contains("label"));
    }

    #[test]
    fn test_sample_job_parses() {
        let text = include_str!("../config/lansing.yaml");
        let job = JobConfig::from_yaml_str(text).unwrap();
        assert_eq!(job.markers.len(), 1);
    }

    #[test]
    fn test_load_reports_path() {
        let err = JobConfig::load("/nonexistent/job.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/job.yaml"));
    }
}
