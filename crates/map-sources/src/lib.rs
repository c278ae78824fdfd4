//! Data-source clients for map composition.
//!
//! - [`overpass`]: OpenStreetMap features through the Overpass API
//! - [`geocode`]: place-name lookup through Nominatim
//! - [`tiger`]: US Census TIGER/Line county and water shapefiles
//! - [`features`] / [`admin`]: the fetchers the pipeline drives, written
//!   against the source traits so tests can substitute in-memory sources

pub mod admin;
pub mod features;
pub mod geocode;
pub mod http;
pub mod overpass;
pub mod states;
pub mod tiger;

pub use admin::{AdminRegionFetcher, BoundaryDetail, BoundarySource, WaterSource};
pub use features::{FeatureFetcher, FeatureSource, SplitFeatures};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use http::HttpConfig;
pub use overpass::OverpassClient;
pub use states::{resolve_state, StateInfo};
pub use tiger::TigerClient;
