//! Error types for demscout

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    // Area of interest errors
    #[error("Failed to load AOI from {path}: {reason}")]
    GeometryLoad { path: PathBuf, reason: String },

    #[error("Unsupported AOI format: .{extension} (supported: {})", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("CRS mismatch: expected {expected}, found {found}")]
    CrsMismatch { expected: String, found: String },

    #[error("Failed to project from {from} to {to}: {reason}")]
    Projection {
        from: String,
        to: String,
        reason: String,
    },

    // Candidate index errors
    #[error("Failed to fetch candidate listing {url}: {reason}")]
    ListingFetch { url: String, reason: String },

    // Per-candidate errors
    #[error("Malformed metadata document: {field}: {reason}")]
    MalformedDocument { field: String, reason: String },

    #[error("No four-digit year found in identifier '{identifier}'")]
    YearExtraction { identifier: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to extract archive for {identifier}: {reason}")]
    Archive { identifier: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ScrapeError {
    /// Shorthand for a missing named field in a metadata document
    pub fn missing_field(field: impl Into<String>) -> Self {
        ScrapeError::MalformedDocument {
            field: field.into(),
            reason: "element not present".to_string(),
        }
    }

    /// Whether this error must stop the whole run rather than a single unit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::GeometryLoad { .. }
                | ScrapeError::UnsupportedFormat { .. }
                | ScrapeError::ListingFetch { .. }
                | ScrapeError::ConfigMissing { .. }
                | ScrapeError::ConfigInvalid { .. }
        )
    }
}

impl From<csv::Error> for ScrapeError {
    fn from(err: csv::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
