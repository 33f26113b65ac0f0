//! Table rows and JSON payloads printed by the commands

use demscout_core::models::TileMetadataRecord;
use demscout_discovery::{CandidateFailure, DiscoverySummary};
use demscout_retrieval::{JobFailure, RetrievalSummary};
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled)]
pub struct AcceptedTileRow {
    #[tabled(rename = "Identifier")]
    pub identifier: String,
    #[tabled(rename = "Begin")]
    pub begin_year: i32,
    #[tabled(rename = "End")]
    pub end_year: i32,
    #[tabled(rename = "Source")]
    pub source_url: String,
}

impl From<&TileMetadataRecord> for AcceptedTileRow {
    fn from(record: &TileMetadataRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            begin_year: record.begin_year,
            end_year: record.end_year,
            source_url: record.source_url.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct FailureRow {
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&CandidateFailure> for FailureRow {
    fn from(failure: &CandidateFailure) -> Self {
        Self {
            unit: failure.url.clone(),
            error: failure.error.clone(),
        }
    }
}

impl From<&JobFailure> for FailureRow {
    fn from(failure: &JobFailure) -> Self {
        Self {
            unit: failure.identifier.clone(),
            error: failure.error.clone(),
        }
    }
}

/// JSON result of one invocation
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub work_dir: String,
    pub year_threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoverySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalSummary>,
}
