//! GeoJSON format reader implementation

use async_trait::async_trait;
use std::fs;
use std::path::Path;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::Crs;

use crate::formats::{layer_name, FormatReader, VectorFeature, VectorLayer};

/// GeoJSON format reader
pub struct GeoJsonReader;

#[async_trait]
impl FormatReader for GeoJsonReader {
    async fn read(&self, path: &Path) -> Result<VectorLayer> {
        let content = fs::read_to_string(path)?;

        let geojson: ::geojson::GeoJson =
            content.parse().map_err(|e| ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason: format!("Failed to parse GeoJSON: {}", e),
            })?;

        let (features, crs) = self.extract_features_and_crs(&geojson, path)?;

        Ok(VectorLayer {
            name: layer_name(path),
            crs,
            features,
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json", "geojson"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }
}

impl GeoJsonReader {
    /// Extract features and CRS from GeoJSON
    fn extract_features_and_crs(
        &self,
        geojson: &::geojson::GeoJson,
        path: &Path,
    ) -> Result<(Vec<VectorFeature>, Crs)> {
        match geojson {
            ::geojson::GeoJson::FeatureCollection(fc) => {
                let features = fc
                    .features
                    .iter()
                    .enumerate()
                    .map(|(idx, feature)| self.convert_feature(feature, idx, path))
                    .collect::<Result<Vec<_>>>()?;

                // Legacy `crs` member; RFC 7946 files are always WGS 84
                let crs = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(extract_epsg_from_crs)
                    .map(Crs::from_epsg)
                    .unwrap_or_else(Crs::wgs84);

                Ok((features, crs))
            }
            ::geojson::GeoJson::Feature(feature) => {
                Ok((vec![self.convert_feature(feature, 0, path)?], Crs::wgs84()))
            }
            ::geojson::GeoJson::Geometry(geom) => {
                let feature = VectorFeature {
                    id: "0".to_string(),
                    geometry: Some(convert_geometry(geom, path)?),
                };
                Ok((vec![feature], Crs::wgs84()))
            }
        }
    }

    fn convert_feature(
        &self,
        feature: &::geojson::Feature,
        idx: usize,
        path: &Path,
    ) -> Result<VectorFeature> {
        let id = feature
            .id
            .as_ref()
            .map(|id| match id {
                ::geojson::feature::Id::String(s) => s.clone(),
                ::geojson::feature::Id::Number(n) => n.to_string(),
            })
            .unwrap_or_else(|| idx.to_string());

        let geometry = feature
            .geometry
            .as_ref()
            .map(|geom| convert_geometry(geom, path))
            .transpose()?;

        Ok(VectorFeature { id, geometry })
    }
}

fn convert_geometry(geom: &::geojson::Geometry, path: &Path) -> Result<geo::Geometry<f64>> {
    geo::Geometry::<f64>::try_from(geom.clone()).map_err(|e| ScrapeError::GeometryLoad {
        path: path.to_path_buf(),
        reason: format!("Unsupported GeoJSON geometry: {}", e),
    })
}

/// Extract EPSG code from a legacy CRS object
fn extract_epsg_from_crs(crs: &serde_json::Value) -> Option<u32> {
    // Parse "EPSG:4326" or "urn:ogc:def:crs:EPSG::4326"
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.parse().ok()
}
