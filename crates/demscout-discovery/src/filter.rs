//! Filter engine: fetch, parse and test every candidate with bounded
//! concurrency, persisting the ones that pass.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::{Candidate, TileMetadataRecord};
use demscout_core::ports::RemoteSource;
use demscout_core::store::TileStore;
use demscout_geo::AoiGeometry;

use crate::metadata::MetadataParser;

/// Called once for every finished candidate
pub type ProgressCallback = Box<dyn Fn(&CandidateReport) + Send + Sync>;

/// Why a well-formed candidate was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    BeforeThreshold { begin_year: i32, threshold: i32 },
    OutsideAoi,
}

/// Result of processing one candidate
#[derive(Debug)]
pub enum CandidateOutcome {
    Accepted(TileMetadataRecord),
    Rejected { identifier: String, reason: RejectReason },
    Failed(ScrapeError),
}

#[derive(Debug)]
pub struct CandidateReport {
    pub candidate: Candidate,
    pub outcome: CandidateOutcome,
}

/// A candidate that could not be evaluated
#[derive(Debug, Clone, Serialize)]
pub struct CandidateFailure {
    pub url: String,
    pub error: String,
}

/// Aggregate of one discovery run
#[derive(Debug, Default, Serialize)]
pub struct DiscoverySummary {
    pub total: usize,
    /// Accepted tiles, sorted by identifier
    pub accepted: Vec<TileMetadataRecord>,
    pub before_threshold: usize,
    pub outside_aoi: usize,
    pub failures: Vec<CandidateFailure>,
}

impl DiscoverySummary {
    pub fn rejected(&self) -> usize {
        self.before_threshold + self.outside_aoi
    }

    fn record(&mut self, report: CandidateReport) {
        self.total += 1;
        match report.outcome {
            CandidateOutcome::Accepted(record) => self.accepted.push(record),
            CandidateOutcome::Rejected { reason, .. } => match reason {
                RejectReason::BeforeThreshold { .. } => self.before_threshold += 1,
                RejectReason::OutsideAoi => self.outside_aoi += 1,
            },
            CandidateOutcome::Failed(error) => self.failures.push(CandidateFailure {
                url: report.candidate.url,
                error: error.to_string(),
            }),
        }
    }
}

/// Orchestrates candidate evaluation against a loaded AOI
pub struct FilterEngine<S: RemoteSource> {
    source: S,
    parser: MetadataParser,
    store: TileStore,
    aoi: Arc<AoiGeometry>,
    workers: usize,
    progress: Option<ProgressCallback>,
}

impl<S: RemoteSource> FilterEngine<S> {
    pub fn new(source: S, parser: MetadataParser, store: TileStore, aoi: Arc<AoiGeometry>, workers: usize) -> Self {
        Self {
            source,
            parser,
            store,
            aoi,
            workers: workers.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Evaluate every candidate; years `>= year_threshold` are eligible.
    ///
    /// Per-candidate failures are reported in the summary and never stop
    /// the batch.
    pub async fn run(&self, candidates: Vec<Candidate>, year_threshold: i32) -> DiscoverySummary {
        tracing::info!(
            candidates = candidates.len(),
            workers = self.workers,
            year_threshold,
            "Starting discovery"
        );

        let mut summary = DiscoverySummary::default();
        let mut reports = stream::iter(candidates)
            .map(|candidate| self.evaluate(candidate, year_threshold))
            .buffer_unordered(self.workers);

        while let Some(report) = reports.next().await {
            log_report(&report);
            if let Some(progress) = &self.progress {
                progress(&report);
            }
            summary.record(report);
        }

        summary.accepted.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        tracing::info!(
            accepted = summary.accepted.len(),
            rejected = summary.rejected(),
            failed = summary.failures.len(),
            "Discovery finished"
        );
        summary
    }

    async fn evaluate(&self, candidate: Candidate, year_threshold: i32) -> CandidateReport {
        let outcome = match self.process(&candidate, year_threshold).await {
            Ok(outcome) => outcome,
            Err(error) => CandidateOutcome::Failed(error),
        };
        CandidateReport { candidate, outcome }
    }

    async fn process(&self, candidate: &Candidate, year_threshold: i32) -> Result<CandidateOutcome> {
        let raw = self.source.fetch_text(&candidate.url).await?;
        let record = self.parser.parse(&raw)?;

        if record.begin_year < year_threshold {
            return Ok(CandidateOutcome::Rejected {
                identifier: record.identifier,
                reason: RejectReason::BeforeThreshold {
                    begin_year: record.begin_year,
                    threshold: year_threshold,
                },
            });
        }

        if !self.aoi.intersects(&record.bounding_box)? {
            return Ok(CandidateOutcome::Rejected {
                identifier: record.identifier,
                reason: RejectReason::OutsideAoi,
            });
        }

        self.store.write(&record).await?;
        Ok(CandidateOutcome::Accepted(record))
    }
}

fn log_report(report: &CandidateReport) {
    match &report.outcome {
        CandidateOutcome::Accepted(record) => tracing::info!(
            identifier = %record.identifier,
            begin_year = record.begin_year,
            end_year = record.end_year,
            "Accepted tile"
        ),
        CandidateOutcome::Rejected { identifier, reason: RejectReason::OutsideAoi } => {
            tracing::info!(identifier = %identifier, "Not inside AOI")
        }
        CandidateOutcome::Rejected { identifier, reason: RejectReason::BeforeThreshold { begin_year, .. } } => {
            tracing::debug!(identifier = %identifier, begin_year, "Before year threshold")
        }
        CandidateOutcome::Failed(error) => {
            tracing::warn!(url = %report.candidate.url, error = %error, "Candidate failed")
        }
    }
}
