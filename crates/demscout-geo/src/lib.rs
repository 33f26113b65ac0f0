//! demscout geo - area of interest loading and spatial predicates
//!
//! This crate reads the user's AOI from a vector file, dissolves it into a
//! single (multi)polygon, reprojects it into the run's target CRS and answers
//! intersection queries against tile bounding boxes.

pub mod aoi;
pub mod formats;
pub mod transform;

pub use aoi::{dissolve, AoiGeometry};
pub use formats::{FormatReader, FormatRegistry, VectorFeature, VectorLayer};
pub use transform::{reproject, reproject_box};
