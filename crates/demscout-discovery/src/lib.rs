//! demscout discovery - find the elevation tiles worth downloading
//!
//! Discovery lists the service's metadata documents, parses each one into a
//! tile record and keeps the tiles that are recent enough and intersect the
//! area of interest. Accepted tiles are written through the core `TileStore`
//! for the retrieval phase to pick up.

pub mod filter;
pub mod index;
pub mod metadata;

pub use filter::{
    CandidateFailure, CandidateOutcome, CandidateReport, DiscoverySummary, FilterEngine, ProgressCallback,
    RejectReason,
};
pub use index::{extract_links, CacheEntry, CachePolicy, CandidateIndex};
pub use metadata::{identifier_from_url, year_from_identifier, MetadataParser, MetadataSchema};
