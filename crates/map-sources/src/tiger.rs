//! US Census TIGER/Line and cartographic boundary files.
//!
//! Each layer is published as a zip archive holding a shapefile (`.shp`)
//! and its attribute table (`.dbf`). Archives are downloaded and read
//! entirely in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use async_trait::async_trait;
use bytes::Bytes;
use geo::Contains;
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use map_common::{
    Feature, FeatureSet, MapError, MapResult, PROP_COUNTY_FP, PROP_GEOID, PROP_NAME, PROP_STATE_FP,
};
use reqwest::Client;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape, ShapeReader};
use tracing::{debug, info, instrument, warn};

use crate::admin::{BoundaryDetail, BoundarySource, WaterSource};
use crate::http::{send_for_bytes, HttpConfig};

const PROVIDER: &str = "tiger";

pub const DEFAULT_BASE_URL: &str = "https://www2.census.gov/geo/tiger";
pub const DEFAULT_YEAR: u16 = 2022;

const COUNTY_FIELDS: &[&str] = &[
    PROP_GEOID,
    PROP_STATE_FP,
    PROP_COUNTY_FP,
    PROP_NAME,
    "NAMELSAD",
    "ALAND",
    "AWATER",
];

const WATER_FIELDS: &[&str] = &["HYDROID", "FULLNAME", "MTFCC", "ANSICODE", "ALAND", "AWATER"];

/// Client for the Census geography download site.
pub struct TigerClient {
    client: Client,
    base_url: String,
    year: u16,
}

impl TigerClient {
    pub fn new(base_url: impl Into<String>, year: u16, http: &HttpConfig) -> MapResult<Self> {
        Ok(Self {
            client: http.build_client(PROVIDER)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            year,
        })
    }

    /// National county layer at the requested detail.
    pub fn county_url(&self, detail: BoundaryDetail) -> String {
        let year = self.year;
        match detail {
            BoundaryDetail::Cartographic => format!(
                "{}/GENZ{year}/shp/cb_{year}_us_county_500k.zip",
                self.base_url,
                year = year
            ),
            BoundaryDetail::Full => format!(
                "{}/TIGER{year}/COUNTY/tl_{year}_us_county.zip",
                self.base_url,
                year = year
            ),
        }
    }

    /// Area-water layer of one county.
    pub fn water_url(&self, state_fips: &str, county_fp: &str) -> String {
        format!(
            "{}/TIGER{year}/AREAWATER/tl_{year}_{}{}_areawater.zip",
            self.base_url,
            state_fips,
            county_fp,
            year = self.year
        )
    }

    async fn download(&self, call: &str, url: &str) -> MapResult<Bytes> {
        debug!(url, "Downloading TIGER archive");
        send_for_bytes(PROVIDER, call, self.client.get(url)).await
    }
}

#[async_trait]
impl BoundarySource for TigerClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self), fields(year = self.year))]
    async fn counties(&self, state_fips: &str, detail: BoundaryDetail) -> MapResult<FeatureSet> {
        let call = format!("counties ({})", detail.as_str());
        let url = self.county_url(detail);
        let archive = self.download(&call, &url).await?;

        let records = read_archive_blocking(archive, COUNTY_FIELDS, call).await?;
        let total = records.len();

        let counties: Vec<Feature> = records
            .into_iter()
            .filter(|r| r.attributes.get(PROP_STATE_FP).map(String::as_str) == Some(state_fips))
            .filter_map(|r| {
                let id = r.attributes.get(PROP_GEOID).cloned().unwrap_or_default();
                r.into_feature(id, None)
            })
            .collect();

        info!(
            state_fips,
            national = total,
            selected = counties.len(),
            "Read county layer"
        );
        Ok(FeatureSet::new("counties", counties))
    }
}

#[async_trait]
impl WaterSource for TigerClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self), fields(year = self.year))]
    async fn area_water(&self, state_fips: &str, county_fp: &str) -> MapResult<FeatureSet> {
        let call = format!("area water {}{}", state_fips, county_fp);
        let url = self.water_url(state_fips, county_fp);
        let archive = self.download(&call, &url).await?;

        let records = read_archive_blocking(archive, WATER_FIELDS, call).await?;
        let geoid = format!("{}{}", state_fips, county_fp);

        let areas: Vec<Feature> = records
            .into_iter()
            .filter_map(|mut r| {
                r.attributes.insert(PROP_GEOID.to_string(), geoid.clone());
                r.attributes.insert(PROP_STATE_FP.to_string(), state_fips.to_string());
                r.attributes.insert(PROP_COUNTY_FP.to_string(), county_fp.to_string());
                let id = r.attributes.get("HYDROID").cloned().unwrap_or_default();
                let category = r.attributes.remove("MTFCC");
                r.into_feature(id, category)
            })
            .collect();

        debug!(features = areas.len(), "Read area water layer");
        Ok(FeatureSet::new("water", areas))
    }
}

/// One shapefile record: geometry plus the requested attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub geometry: Option<Geometry<f64>>,
    pub attributes: BTreeMap<String, String>,
}

impl ShapeRecord {
    fn into_feature(self, id: String, category: Option<String>) -> Option<Feature> {
        let geometry = self.geometry?;
        Some(Feature {
            id,
            category,
            properties: self.attributes,
            geometry,
        })
    }
}

async fn read_archive_blocking(
    archive: Bytes,
    fields: &'static [&'static str],
    call: String,
) -> MapResult<Vec<ShapeRecord>> {
    let task_call = call.clone();
    tokio::task::spawn_blocking(move || read_archive(&archive, fields, &task_call))
        .await
        .map_err(|e| MapError::data_source(PROVIDER, call, format!("shapefile reader task failed: {}", e)))?
}

/// Read every record of the shapefile inside a zip archive.
pub fn read_archive(archive: &[u8], fields: &[&str], call: &str) -> MapResult<Vec<ShapeRecord>> {
    let (shp, dbf) = extract_shapefile(archive, call)?;
    read_shapefile(&shp, &dbf, fields, call)
}

/// Pull the `.shp` and `.dbf` members out of a zip archive.
pub fn extract_shapefile(archive: &[u8], call: &str) -> MapResult<(Vec<u8>, Vec<u8>)> {
    let bad_zip = |e: zip::result::ZipError| {
        MapError::data_source(PROVIDER, call, format!("invalid zip archive: {}", e))
    };

    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(bad_zip)?;
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();

    let mut member = |extension: &str| -> MapResult<Vec<u8>> {
        let name = names
            .iter()
            .find(|n| n.to_ascii_lowercase().ends_with(extension))
            .ok_or_else(|| {
                MapError::data_source(PROVIDER, call, format!("archive has no {} member", extension))
            })?;
        let mut file = zip.by_name(name).map_err(bad_zip)?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf).map_err(|e| {
            MapError::data_source(PROVIDER, call, format!("failed to read {}: {}", name, e))
        })?;
        Ok(buf)
    };

    let shp = member(".shp")?;
    let dbf = member(".dbf")?;
    Ok((shp, dbf))
}

/// Decode shapes and join them with their dBASE rows by position.
pub fn read_shapefile(shp: &[u8], dbf: &[u8], fields: &[&str], call: &str) -> MapResult<Vec<ShapeRecord>> {
    let bad_shapefile =
        |e: shapefile::Error| MapError::data_source(PROVIDER, call, format!("invalid shapefile: {}", e));

    let mut reader = ShapeReader::new(Cursor::new(shp)).map_err(bad_shapefile)?;
    let rows: Vec<Record> = shapefile::dbase::Reader::new(Cursor::new(dbf))
        .and_then(|mut r| r.read())
        .map_err(|e| MapError::data_source(PROVIDER, call, format!("invalid attribute table: {}", e)))?;

    let mut records = Vec::with_capacity(rows.len());
    for (index, shape) in reader.iter_shapes().enumerate() {
        let shape = shape.map_err(bad_shapefile)?;
        let attributes = rows
            .get(index)
            .map(|row| read_fields(row, fields))
            .unwrap_or_default();

        records.push(ShapeRecord {
            geometry: convert_shape(&shape),
            attributes,
        });
    }

    if records.len() != rows.len() {
        warn!(
            shapes = records.len(),
            rows = rows.len(),
            "Shape and attribute counts differ"
        );
    }
    Ok(records)
}

fn read_fields(row: &Record, fields: &[&str]) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|&name| {
            let value = match row.get(name)? {
                FieldValue::Character(Some(s)) => s.trim().to_string(),
                FieldValue::Numeric(Some(n)) => format_number(*n),
                FieldValue::Float(Some(n)) => format_number(f64::from(*n)),
                FieldValue::Integer(n) => n.to_string(),
                _ => return None,
            };
            Some((name.to_string(), value))
        })
        .collect()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

fn to_line(points: &[shapefile::Point]) -> LineString<f64> {
    points.iter().map(|p| Coord { x: p.x, y: p.y }).collect()
}

fn convert_shape(shape: &Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(p) => Some(Point::new(p.x, p.y).into()),
        Shape::Polyline(line) => {
            let mut parts: Vec<LineString<f64>> = line.parts().iter().map(|p| to_line(p)).collect();
            match parts.len() {
                0 => None,
                1 => parts.pop().map(Geometry::from),
                _ => Some(MultiLineString::new(parts).into()),
            }
        }
        Shape::Polygon(polygon) => {
            let mut outers = Vec::new();
            let mut inners = Vec::new();
            for ring in polygon.rings() {
                match ring {
                    PolygonRing::Outer(points) => outers.push(to_line(points)),
                    PolygonRing::Inner(points) => inners.push(to_line(points)),
                }
            }
            assemble_polygons(outers, inners)
        }
        Shape::NullShape => None,
        other => {
            debug!(shape_type = ?other.shapetype(), "Skipping unsupported shape type");
            None
        }
    }
}

/// Build polygons from outer and inner rings, giving each hole to the
/// first outer ring that contains it.
pub fn assemble_polygons(outers: Vec<LineString<f64>>, inners: Vec<LineString<f64>>) -> Option<Geometry<f64>> {
    if outers.is_empty() {
        return None;
    }

    let shells: Vec<Polygon<f64>> = outers.iter().map(|o| Polygon::new(o.clone(), vec![])).collect();
    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outers.len()];

    for inner in inners {
        let owner = inner
            .0
            .first()
            .and_then(|first| shells.iter().position(|s| s.contains(&Point::from(*first))))
            .unwrap_or(0);
        holes[owner].push(inner);
    }

    let mut polygons: Vec<Polygon<f64>> = outers
        .into_iter()
        .zip(holes)
        .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
        .collect();

    if polygons.len() == 1 {
        polygons.pop().map(Geometry::from)
    } else {
        Some(MultiPolygon::new(polygons).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_utils::rect_ring;

    fn client() -> TigerClient {
        TigerClient::new("https://example.test/geo/tiger/", 2022, &HttpConfig::default()).unwrap()
    }

    fn zip_with(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_county_urls() {
        let c = client();
        assert_eq!(
            c.county_url(BoundaryDetail::Cartographic),
            "https://example.test/geo/tiger/GENZ2022/shp/cb_2022_us_county_500k.zip"
        );
        assert_eq!(
            c.county_url(BoundaryDetail::Full),
            "https://example.test/geo/tiger/TIGER2022/COUNTY/tl_2022_us_county.zip"
        );
    }

    #[test]
    fn test_water_url() {
        assert_eq!(
            client().water_url("26", "065"),
            "https://example.test/geo/tiger/TIGER2022/AREAWATER/tl_2022_26065_areawater.zip"
        );
    }

    #[test]
    fn test_extract_finds_members_case_insensitively() {
        let archive = zip_with(&[
            ("tl_2022_26065_areawater.SHP", b"shp-bytes"),
            ("tl_2022_26065_areawater.dbf", b"dbf-bytes"),
            ("tl_2022_26065_areawater.prj", b"GEOGCS"),
        ]);
        let (shp, dbf) = extract_shapefile(&archive, "test").unwrap();
        assert_eq!(shp, b"shp-bytes");
        assert_eq!(dbf, b"dbf-bytes");
    }

    #[test]
    fn test_extract_missing_dbf() {
        let archive = zip_with(&[("layer.shp", b"shp-bytes")]);
        let err = extract_shapefile(&archive, "test").unwrap_err();
        assert!(err.to_string().contains(".dbf"));
    }

    #[test]
    fn test_extract_not_a_zip() {
        let err = extract_shapefile(b"<html>404</html>", "test").unwrap_err();
        assert_eq!(err.kind(), "data_source");
    }

    #[test]
    fn test_assemble_single_polygon_with_hole() {
        let geometry = assemble_polygons(
            vec![rect_ring(0.0, 0.0, 10.0, 10.0)],
            vec![rect_ring(2.0, 2.0, 4.0, 4.0)],
        )
        .unwrap();
        match geometry {
            Geometry::Polygon(p) => assert_eq!(p.interiors().len(), 1),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_holes_go_to_containing_shell() {
        let geometry = assemble_polygons(
            vec![rect_ring(0.0, 0.0, 10.0, 10.0), rect_ring(20.0, 0.0, 30.0, 10.0)],
            vec![rect_ring(22.0, 2.0, 24.0, 4.0)],
        )
        .unwrap();
        match geometry {
            Geometry::MultiPolygon(mp) => {
                assert!(mp.0[0].interiors().is_empty());
                assert_eq!(mp.0[1].interiors().len(), 1);
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_without_shell() {
        assert!(assemble_polygons(vec![], vec![rect_ring(0.0, 0.0, 1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.0), "1234567");
        assert_eq!(format_number(0.5), "0.5");
    }
}
