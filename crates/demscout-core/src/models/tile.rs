//! Tile-level domain records.
//!
//! A [`Candidate`] is a reference to one remote metadata document. Parsing it
//! yields a [`TileMetadataRecord`]; records that pass the year and AOI tests
//! are persisted as a [`TileRow`] plus the bounding-box geometry.

use geo::{Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::crs::Crs;

/// One remote metadata document location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
}

impl Candidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Tile bounding rectangle tagged with the frame its coordinates are in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub crs: Crs,
}

impl TileBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64, crs: Crs) -> Self {
        Self { west, south, east, north, crs }
    }

    /// Closed rectangle polygon, west/east as x bounds and south/north as y bounds
    pub fn to_polygon(&self) -> Polygon<f64> {
        Rect::new((self.west, self.south), (self.east, self.north)).to_polygon()
    }
}

/// Where the acquisition years of a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearSource {
    /// Parsed from the document's date fields
    Document,
    /// Recovered from a four-digit run in the identifier
    Identifier,
}

/// Parsed contents of one tile metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadataRecord {
    pub identifier: String,
    pub source_url: String,
    pub begin_year: i32,
    pub end_year: i32,
    pub bounding_box: TileBox,
    pub year_source: YearSource,
}

impl TileMetadataRecord {
    /// Tabular view persisted for accepted tiles
    pub fn to_row(&self) -> TileRow {
        TileRow {
            identifier: self.identifier.clone(),
            source_url: self.source_url.clone(),
            begin_year: self.begin_year,
            end_year: self.end_year,
        }
    }
}

/// Row written to the per-tile CSV file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRow {
    pub identifier: String,
    pub source_url: String,
    pub begin_year: i32,
    pub end_year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn test_tile_box_polygon() {
        let tile = TileBox::new(-120.0, 35.0, -119.0, 36.0, Crs::nad83());
        let polygon = tile.to_polygon();

        assert_eq!(polygon.exterior().0.len(), 5);
        assert!((polygon.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_to_row() {
        let record = TileMetadataRecord {
            identifier: "ca_3dep_2016".to_string(),
            source_url: "https://example.gov/elev/ca_3dep_2016.img.zip".to_string(),
            begin_year: 2016,
            end_year: 2017,
            bounding_box: TileBox::new(-120.0, 35.0, -119.0, 36.0, Crs::nad83()),
            year_source: YearSource::Document,
        };

        let row = record.to_row();
        assert_eq!(row.identifier, "ca_3dep_2016");
        assert_eq!(row.begin_year, 2016);
        assert_eq!(row.end_year, 2017);
    }
}
