//! Vector format readers for the area of interest
//!
//! Each format implements the `FormatReader` trait, and the `FormatRegistry`
//! dispatches to the appropriate reader by file extension.

use async_trait::async_trait;
use std::path::Path;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::Crs;

pub mod geojson;
pub mod shapefile;

/// Format reader trait that all vector format implementations must implement
#[async_trait]
pub trait FormatReader: Send + Sync {
    /// Read every feature of the file at `path`
    async fn read(&self, path: &Path) -> Result<VectorLayer>;

    /// Get supported file extensions (e.g., ["shp"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "Shapefile", "GeoJSON")
    fn format_name(&self) -> &str;
}

/// Features read from one vector file, in the file's own CRS
#[derive(Debug, Clone)]
pub struct VectorLayer {
    /// Layer name, taken from the file stem
    pub name: String,

    /// CRS declared by the file (or its default)
    pub crs: Crs,

    pub features: Vec<VectorFeature>,
}

/// Feature extracted from a vector file
#[derive(Debug, Clone)]
pub struct VectorFeature {
    pub id: String,

    /// None for features with a null geometry
    pub geometry: Option<geo::Geometry<f64>>,
}

/// Central registry for format readers
pub struct FormatRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl FormatRegistry {
    /// Create a new empty format registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with every built-in reader
    pub fn with_default_readers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(geojson::GeoJsonReader));
        registry.register(Box::new(shapefile::ShapefileFormatReader));
        registry
    }

    /// Register a format reader
    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    /// Detect format and return the reader for this file extension
    pub fn detect_format(&self, path: &Path) -> Result<&dyn FormatReader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| ScrapeError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            })?;

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| ScrapeError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Get list of all supported format extensions
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }

    /// Read `path` with whichever reader claims its extension
    pub async fn read(&self, path: &Path) -> Result<VectorLayer> {
        let reader = self.detect_format(path)?;
        tracing::debug!(path = %path.display(), format = reader.format_name(), "Reading vector file");
        reader.read(path).await
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_default_readers()
    }
}

/// Dataset name from a path's file stem
pub(crate) fn layer_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockReader {
        extensions: Vec<&'static str>,
        name: &'static str,
    }

    #[async_trait]
    impl FormatReader for MockReader {
        async fn read(&self, _path: &Path) -> Result<VectorLayer> {
            Ok(VectorLayer {
                name: "test".to_string(),
                crs: Crs::wgs84(),
                features: vec![],
            })
        }

        fn supported_extensions(&self) -> &[&str] {
            &self.extensions
        }

        fn format_name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_format_registration() {
        let mut registry = FormatRegistry::new();
        assert!(registry.supported_formats().is_empty());

        registry.register(Box::new(MockReader {
            extensions: vec!["json", "geojson"],
            name: "GeoJSON",
        }));
        assert_eq!(registry.supported_formats(), vec!["json", "geojson"]);
    }

    #[test]
    fn test_default_readers() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.detect_format(Path::new("aoi.geojson")).unwrap().format_name(), "GeoJSON");
        assert_eq!(registry.detect_format(Path::new("AOI.SHP")).unwrap().format_name(), "Shapefile");
    }

    #[test]
    fn test_unsupported_format() {
        let registry = FormatRegistry::default();

        match registry.detect_format(Path::new("aoi.kml")) {
            Err(ScrapeError::UnsupportedFormat { extension, supported }) => {
                assert_eq!(extension, "kml");
                assert!(supported.contains(&"shp".to_string()));
            }
            _ => panic!("expected UnsupportedFormat"),
        }

        assert!(registry.detect_format(Path::new("no_extension")).is_err());
    }
}
