//! Bounded-concurrency download and extraction of accepted tiles.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};

use demscout_core::error::{Result, ScrapeError};
use demscout_core::layout::WorkDirLayout;
use demscout_core::models::TileRow;
use demscout_core::ports::RemoteSource;
use demscout_core::store::read_row_files;

use crate::archive::extract_archive;

/// Called once for every finished job
pub type RetrievalProgress = Box<dyn Fn(&RetrievalReport) + Send + Sync>;

/// One tile to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalJob {
    pub identifier: String,
    pub source_url: String,
}

impl From<TileRow> for RetrievalJob {
    fn from(row: TileRow) -> Self {
        Self {
            identifier: row.identifier,
            source_url: row.source_url,
        }
    }
}

/// Jobs for every row file in `records_dir`; malformed row files are
/// logged and skipped
pub fn read_jobs(records_dir: &Path) -> Result<Vec<RetrievalJob>> {
    Ok(read_row_files(records_dir)?.into_iter().map(RetrievalJob::from).collect())
}

#[derive(Debug)]
pub enum RetrievalOutcome {
    /// Archive and extracted directory were already present
    Skipped,
    Downloaded { bytes: u64 },
    /// Archive was present but not yet extracted
    ExtractedExisting,
    Failed(ScrapeError),
}

#[derive(Debug)]
pub struct RetrievalReport {
    pub job: RetrievalJob,
    pub outcome: RetrievalOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub identifier: String,
    pub error: String,
}

/// Aggregate of one retrieval run
#[derive(Debug, Default, Serialize)]
pub struct RetrievalSummary {
    pub total: usize,
    pub skipped: usize,
    pub downloaded: usize,
    pub extracted_existing: usize,
    pub bytes: u64,
    pub failures: Vec<JobFailure>,
}

impl RetrievalSummary {
    fn record(&mut self, report: RetrievalReport) {
        self.total += 1;
        match report.outcome {
            RetrievalOutcome::Skipped => self.skipped += 1,
            RetrievalOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            RetrievalOutcome::ExtractedExisting => self.extracted_existing += 1,
            RetrievalOutcome::Failed(error) => self.failures.push(JobFailure {
                identifier: report.job.identifier,
                error: error.to_string(),
            }),
        }
    }
}

/// Downloads tile archives and unpacks them into the working directory
pub struct Retriever<S: RemoteSource> {
    source: S,
    archive_dir: PathBuf,
    extract_dir: PathBuf,
    archive_extension: String,
    workers: usize,
    progress: Option<RetrievalProgress>,
}

impl<S: RemoteSource> Retriever<S> {
    pub fn new(source: S, layout: &WorkDirLayout, archive_extension: &str, workers: usize) -> Self {
        Self {
            source,
            archive_dir: layout.archive_dir.clone(),
            extract_dir: layout.extract_dir.clone(),
            archive_extension: archive_extension.trim_start_matches('.').to_string(),
            workers: workers.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: RetrievalProgress) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn archive_path(&self, identifier: &str) -> PathBuf {
        self.archive_dir.join(format!("{}.{}", identifier, self.archive_extension))
    }

    pub fn extract_path(&self, identifier: &str) -> PathBuf {
        self.extract_dir.join(identifier)
    }

    /// Process every job; failures are reported per job and never stop
    /// the batch
    pub async fn run(&self, jobs: Vec<RetrievalJob>) -> RetrievalSummary {
        tracing::info!(jobs = jobs.len(), workers = self.workers, "Starting retrieval");

        let mut summary = RetrievalSummary::default();
        let mut reports = stream::iter(jobs)
            .map(|job| async move {
                let outcome = self.retrieve(&job).await.unwrap_or_else(RetrievalOutcome::Failed);
                RetrievalReport { job, outcome }
            })
            .buffer_unordered(self.workers);

        while let Some(report) = reports.next().await {
            log_report(&report);
            if let Some(progress) = &self.progress {
                progress(&report);
            }
            summary.record(report);
        }

        tracing::info!(
            downloaded = summary.downloaded,
            extracted_existing = summary.extracted_existing,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Retrieval finished"
        );
        summary
    }

    async fn retrieve(&self, job: &RetrievalJob) -> Result<RetrievalOutcome> {
        let archive = self.archive_path(&job.identifier);
        let target = self.extract_path(&job.identifier);

        if archive.is_file() && target.is_dir() {
            return Ok(RetrievalOutcome::Skipped);
        }

        if archive.is_file() {
            self.extract_or_discard(&archive, &target, &job.identifier).await?;
            return Ok(RetrievalOutcome::ExtractedExisting);
        }

        let bytes = self.download(job, &archive).await?;
        self.extract_or_discard(&archive, &target, &job.identifier).await?;
        Ok(RetrievalOutcome::Downloaded { bytes })
    }

    /// Extract, deleting an archive that cannot be read so the next run
    /// downloads it again
    async fn extract_or_discard(&self, archive: &Path, target: &Path, identifier: &str) -> Result<usize> {
        let result = self.extract(archive, target, identifier).await;
        if let Err(ScrapeError::Archive { .. }) = &result {
            if let Err(e) = tokio::fs::remove_file(archive).await {
                tracing::debug!(path = %archive.display(), error = %e, "Could not remove unreadable archive");
            }
        }
        result
    }

    /// Stream into `<archive>.part` and rename on success
    async fn download(&self, job: &RetrievalJob, archive: &Path) -> Result<u64> {
        let partial = partial_path(archive);

        match self.source.download(&job.source_url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, archive).await?;
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::debug!(path = %partial.display(), error = %cleanup, "Could not remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    async fn extract(&self, archive: &Path, target: &Path, identifier: &str) -> Result<usize> {
        let (archive, target, id) = (archive.to_path_buf(), target.to_path_buf(), identifier.to_string());

        tokio::task::spawn_blocking(move || extract_archive(&archive, &target, &id))
            .await
            .map_err(|e| ScrapeError::Archive {
                identifier: identifier.to_string(),
                reason: format!("extraction task failed: {}", e),
            })?
    }
}

fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn log_report(report: &RetrievalReport) {
    let identifier = report.job.identifier.as_str();
    match &report.outcome {
        RetrievalOutcome::Skipped => tracing::debug!(identifier, "Already downloaded and extracted"),
        RetrievalOutcome::Downloaded { bytes } => tracing::info!(identifier, bytes, "Downloaded and extracted"),
        RetrievalOutcome::ExtractedExisting => tracing::info!(identifier, "Extracted existing archive"),
        RetrievalOutcome::Failed(error) => {
            tracing::warn!(identifier, url = %report.job.source_url, error = %error, "Retrieval failed")
        }
    }
}
