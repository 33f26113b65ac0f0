use anyhow::{Context, Result};

use demscout_core::config::ScrapeConfig;
use demscout_core::layout::WorkDirLayout;
use demscout_core::ports::RemoteSource;
use demscout_retrieval::{read_jobs, RetrievalReport, RetrievalSummary, Retriever};

use crate::output::OutputWriter;
use crate::output_types::FailureRow;
use crate::progress::{create_progress_bar, finish_error, finish_success};

pub async fn execute<S>(
    config: &ScrapeConfig,
    layout: &WorkDirLayout,
    source: S,
    output: &OutputWriter,
) -> Result<RetrievalSummary>
where
    S: RemoteSource,
{
    output.section("Retrieval");

    let jobs = read_jobs(&layout.records_dir)
        .with_context(|| format!("Failed to read tile rows from {}", layout.records_dir.display()))?;

    if jobs.is_empty() {
        output.info("No accepted tiles to download");
        return Ok(RetrievalSummary::default());
    }

    let bar = create_progress_bar(jobs.len() as u64, "Downloading tiles", output.is_json());
    let tick = bar.clone();

    let retriever = Retriever::new(source, layout, &config.archive_extension, config.retrieval_workers)
        .with_progress(Box::new(move |report: &RetrievalReport| {
            tick.set_message(report.job.identifier.clone());
            tick.inc(1);
        }));

    let summary = retriever.run(jobs).await;
    if summary.failures.is_empty() {
        finish_success(&bar, &format!("Processed {} tiles", summary.total));
    } else {
        finish_error(&bar, &format!("{} of {} tiles failed", summary.failures.len(), summary.total));
    }

    output.success(format!(
        "{} downloaded, {} extracted from existing archives, {} already present, {} failed",
        summary.downloaded,
        summary.extracted_existing,
        summary.skipped,
        summary.failures.len()
    ));
    output.kv("Archives", layout.archive_dir.display());
    output.kv("Extracted", layout.extract_dir.display());

    if !summary.failures.is_empty() {
        output.table(summary.failures.iter().map(FailureRow::from).collect());
    }

    Ok(summary)
}
