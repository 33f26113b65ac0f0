//! demscout retrieval - download and unpack accepted tiles
//!
//! Jobs are read back from the per-tile row files written by discovery, so
//! retrieval can run on its own against an existing working directory.

pub mod archive;
pub mod retriever;

pub use archive::extract_archive;
pub use retriever::{
    read_jobs, JobFailure, RetrievalJob, RetrievalOutcome, RetrievalProgress, RetrievalReport, RetrievalSummary,
    Retriever,
};
