//! Persistence of accepted tiles.
//!
//! Each accepted tile becomes a file pair named after its identifier: a
//! one-row CSV (`identifier,source_url,begin_year,end_year`) and a GeoJSON
//! feature collection holding the bounding box with the same four attributes.
//! Rewriting a tile overwrites both files.

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScrapeError};
use crate::models::{Crs, TileMetadataRecord, TileRow};

/// File-backed store for accepted tile records
#[derive(Debug, Clone)]
pub struct TileStore {
    records_dir: PathBuf,
    geometry_dir: PathBuf,
}

impl TileStore {
    pub fn new(records_dir: impl Into<PathBuf>, geometry_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
            geometry_dir: geometry_dir.into(),
        }
    }

    pub fn row_path(&self, identifier: &str) -> PathBuf {
        self.records_dir.join(format!("{}.csv", identifier))
    }

    pub fn geometry_path(&self, identifier: &str) -> PathBuf {
        self.geometry_dir.join(format!("{}.geojson", identifier))
    }

    /// Write the row and geometry files for an accepted record.
    ///
    /// The row is written last, through a `.part` file, since its presence
    /// is what marks a tile as accepted. If it cannot be written the
    /// geometry file is removed again.
    pub async fn write(&self, record: &TileMetadataRecord) -> Result<()> {
        let row = encode_row(&record.to_row())?;
        let geometry = serde_json::to_string(&encode_geometry(record))?;

        let geometry_path = self.geometry_path(&record.identifier);
        tokio::fs::write(&geometry_path, geometry).await?;

        let row_path = self.row_path(&record.identifier);
        let partial = row_path.with_extension("csv.part");
        let written = match tokio::fs::write(&partial, row).await {
            Ok(()) => tokio::fs::rename(&partial, &row_path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            for path in [&partial, &geometry_path] {
                if let Err(cleanup) = tokio::fs::remove_file(path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::debug!(path = %path.display(), error = %cleanup, "Could not remove file");
                    }
                }
            }
            return Err(e.into());
        }

        Ok(())
    }

    /// Read every row file in the records directory; see [`read_row_files`]
    pub fn read_rows(&self) -> Result<Vec<TileRow>> {
        read_row_files(&self.records_dir)
    }
}

/// Read every `.csv` row file in `dir`.
///
/// Files that cannot be parsed are logged and skipped; only a failure to
/// list the directory is an error. A missing directory holds no rows. Rows
/// are sorted by identifier.
pub fn read_row_files(dir: &Path) -> Result<Vec<TileRow>> {
    let mut rows = Vec::new();
    if !dir.exists() {
        return Ok(rows);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }

        match read_row(&path) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable tile row"),
        }
    }

    rows.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(rows)
}

fn encode_row(row: &TileRow) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.serialize(row)?;
    writer
        .into_inner()
        .map_err(|e| ScrapeError::Serialization(format!("Failed to flush CSV row: {}", e)))
}

fn read_row(path: &Path) -> Result<TileRow> {
    let mut reader = csv::Reader::from_path(path)?;
    let row = reader.deserialize::<TileRow>().next().ok_or_else(|| {
        ScrapeError::Serialization(format!("{} contains no rows", path.display()))
    })??;
    Ok(row)
}

fn encode_geometry(record: &TileMetadataRecord) -> GeoJson {
    let polygon = record.bounding_box.to_polygon();
    let geometry = geojson::Geometry::new(geojson::Value::from(&polygon));

    let mut properties = serde_json::Map::new();
    properties.insert("begin_year".to_string(), json!(record.begin_year));
    properties.insert("end_year".to_string(), json!(record.end_year));
    properties.insert("source_url".to_string(), json!(record.source_url));
    properties.insert("identifier".to_string(), json!(record.identifier));

    let feature = Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: Some(crs_member(&record.bounding_box.crs)),
    })
}

/// Legacy GeoJSON `crs` member naming the frame of the coordinates
fn crs_member(crs: &Crs) -> serde_json::Map<String, serde_json::Value> {
    let mut members = serde_json::Map::new();
    members.insert(
        "crs".to_string(),
        json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", crs.epsg) }
        }),
    );
    members
}
