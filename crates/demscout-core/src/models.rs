pub mod crs;
pub mod tile;

pub use crs::Crs;
pub use tile::{Candidate, TileBox, TileMetadataRecord, TileRow, YearSource};
