//! Shapefile format reader implementation
//!
//! Shapefiles consist of multiple component files (.shp, .shx, .dbf, .prj).
//! Only polygon shapes are meaningful for an area of interest; other shape
//! types are passed through as geo geometries and rejected when dissolving.

use async_trait::async_trait;
use ::shapefile::{PolygonRing, Shape};
use std::fs;
use std::path::{Path, PathBuf};

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::Crs;
use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::formats::{layer_name, FormatReader, VectorFeature, VectorLayer};

/// Shapefile format reader
pub struct ShapefileFormatReader;

#[async_trait]
impl FormatReader for ShapefileFormatReader {
    async fn read(&self, path: &Path) -> Result<VectorLayer> {
        self.verify_components(path)?;

        let mut reader = ::shapefile::Reader::from_path(path).map_err(|e| load_error(path, e))?;

        let crs = self.extract_crs(path)?;

        let mut features = Vec::new();
        for (idx, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, _record) = result.map_err(|e| load_error(path, e))?;
            features.push(VectorFeature {
                id: idx.to_string(),
                geometry: convert_shape(&shape, path)?,
            });
        }

        Ok(VectorLayer {
            name: layer_name(path),
            crs,
            features,
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        "Shapefile"
    }
}

impl ShapefileFormatReader {
    /// Get the base path for a Shapefile (without extension)
    fn shapefile_base(&self, path: &Path) -> PathBuf {
        path.with_extension("")
    }

    /// Verify that all required Shapefile component files exist
    fn verify_components(&self, path: &Path) -> Result<()> {
        let base = self.shapefile_base(path);
        let missing: Vec<String> = ["shp", "shx", "dbf"]
            .iter()
            .filter(|ext| !base.with_extension(ext).exists())
            .map(|ext| format!(".{}", ext))
            .collect();

        if !missing.is_empty() {
            return Err(ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason: format!("Missing required component files: {}", missing.join(", ")),
            });
        }

        Ok(())
    }

    /// Extract CRS from the Shapefile .prj file
    fn extract_crs(&self, path: &Path) -> Result<Crs> {
        let prj_path = self.shapefile_base(path).with_extension("prj");

        if !prj_path.exists() {
            tracing::warn!(path = %path.display(), "No .prj file, assuming EPSG:4326");
            return Ok(Crs::wgs84());
        }

        let prj_content = fs::read_to_string(&prj_path)?;

        match parse_epsg_from_wkt(&prj_content) {
            Some(epsg) => Ok(Crs::from_epsg(epsg)),
            None => {
                tracing::warn!(
                    path = %prj_path.display(),
                    "Could not identify CRS from .prj, assuming EPSG:4326"
                );
                Ok(Crs::wgs84())
            }
        }
    }
}

/// Parse an EPSG code from a .prj WKT string
fn parse_epsg_from_wkt(wkt: &str) -> Option<u32> {
    // AUTHORITY["EPSG","4326"] of the outermost definition comes last
    if let Some(start) = wkt.rfind("AUTHORITY[\"EPSG\",\"") {
        let code_start = start + "AUTHORITY[\"EPSG\",\"".len();
        if let Some(end) = wkt[code_start..].find('"') {
            if let Ok(code) = wkt[code_start..code_start + end].parse::<u32>() {
                return Some(code);
            }
        }
    }

    if let Some(start) = wkt.find("EPSG:") {
        let code: String = wkt[start + 5..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = code.parse::<u32>() {
            return Some(code);
        }
    }

    // ESRI-flavoured WKT carries names instead of authorities
    if wkt.contains("GEOGCS[\"GCS_North_American_1983\"") && !wkt.contains("PROJCS[") {
        return Some(4269);
    }
    if wkt.contains("GEOGCS[\"GCS_WGS_1984\"") && !wkt.contains("PROJCS[") {
        return Some(4326);
    }

    None
}

fn convert_shape(shape: &Shape, path: &Path) -> Result<Option<geo::Geometry<f64>>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Polygon(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonZ(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonM(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::Point(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointZ(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointM(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::Polyline(line) => geo::Geometry::MultiLineString(geo::MultiLineString::new(
            line.parts()
                .iter()
                .map(|part| part.iter().map(|p| (p.x, p.y)).collect::<LineString<f64>>())
                .collect(),
        )),
        Shape::PolylineZ(line) => geo::Geometry::MultiLineString(geo::MultiLineString::new(
            line.parts()
                .iter()
                .map(|part| part.iter().map(|p| (p.x, p.y)).collect::<LineString<f64>>())
                .collect(),
        )),
        Shape::PolylineM(line) => geo::Geometry::MultiLineString(geo::MultiLineString::new(
            line.parts()
                .iter()
                .map(|part| part.iter().map(|p| (p.x, p.y)).collect::<LineString<f64>>())
                .collect(),
        )),
        Shape::Multipoint(_) | Shape::MultipointZ(_) | Shape::MultipointM(_) | Shape::Multipatch(_) => {
            return Err(ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason: format!("Unsupported shape type {}", shape.shapetype()),
            });
        }
    };

    Ok(Some(geometry))
}

/// Group shapefile rings into polygons: each outer ring opens a polygon and
/// the inner rings that follow it become its holes.
fn rings_to_geometry<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> geo::Geometry<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring
            .points()
            .iter()
            .map(|p| {
                let (x, y) = xy(p);
                Coord { x, y }
            })
            .collect();

        match ring {
            PolygonRing::Outer(_) => polygons.push(Polygon::new(line, vec![])),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line),
                // A hole with no preceding shell is treated as a shell
                None => polygons.push(Polygon::new(line, vec![])),
            },
        }
    }

    geo::Geometry::MultiPolygon(MultiPolygon::new(polygons))
}

fn load_error(path: &Path, err: ::shapefile::Error) -> ScrapeError {
    ScrapeError::GeometryLoad {
        path: path.to_path_buf(),
        reason: format!("Failed to read Shapefile: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::shapefile::Point;

    #[test]
    fn test_supported_extensions() {
        let reader = ShapefileFormatReader;
        assert_eq!(reader.supported_extensions(), &["shp"]);
        assert_eq!(reader.format_name(), "Shapefile");
    }

    #[tokio::test]
    async fn test_missing_components() {
        let reader = ShapefileFormatReader;
        let temp_dir = tempfile::tempdir().unwrap();
        let shp = temp_dir.path().join("aoi.shp");
        fs::write(&shp, b"").unwrap();

        match reader.read(&shp).await {
            Err(ScrapeError::GeometryLoad { reason, .. }) => {
                assert!(reason.contains(".shx"));
                assert!(reason.contains(".dbf"));
            }
            other => panic!("expected GeometryLoad, got {:?}", other.map(|l| l.name)),
        }
    }

    #[test]
    fn test_parse_epsg_from_wkt() {
        let wkt = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],AUTHORITY["EPSG","4269"]]"#;
        assert_eq!(parse_epsg_from_wkt(wkt), Some(4269));

        assert_eq!(parse_epsg_from_wkt("EPSG:3857"), Some(3857));
    }

    #[test]
    fn test_parse_esri_names() {
        let nad83 = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(parse_epsg_from_wkt(nad83), Some(4269));

        let wgs84 = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]]"#;
        assert_eq!(parse_epsg_from_wkt(wgs84), Some(4326));

        let projected = r#"PROJCS["NAD_1983_UTM_Zone_10N",GEOGCS["GCS_North_American_1983"]]"#;
        assert_eq!(parse_epsg_from_wkt(projected), None);
    }

    #[test]
    fn test_rings_grouping() {
        let outer = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let hole = vec![
            Point::new(2.0, 2.0),
            Point::new(4.0, 2.0),
            Point::new(4.0, 4.0),
            Point::new(2.0, 4.0),
            Point::new(2.0, 2.0),
        ];
        let second = vec![
            Point::new(20.0, 20.0),
            Point::new(20.0, 21.0),
            Point::new(21.0, 21.0),
            Point::new(20.0, 20.0),
        ];

        let rings = vec![PolygonRing::Outer(outer), PolygonRing::Inner(hole), PolygonRing::Outer(second)];

        match rings_to_geometry(&rings, |p| (p.x, p.y)) {
            geo::Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 2);
                assert_eq!(mp.0[0].interiors().len(), 1);
                assert!(mp.0[1].interiors().is_empty());
            }
            other => panic!("expected MultiPolygon, got {:?}", other),
        }
    }
}
