use anyhow::{Context, Result};
use std::sync::Arc;

use demscout_core::config::ScrapeConfig;
use demscout_core::layout::WorkDirLayout;
use demscout_core::ports::RemoteSource;
use demscout_core::store::TileStore;
use demscout_discovery::{CandidateIndex, CandidateReport, DiscoverySummary, FilterEngine, MetadataParser, MetadataSchema};
use demscout_geo::AoiGeometry;

use crate::cli::Cli;
use crate::config::cache_policy;
use crate::output::OutputWriter;
use crate::output_types::{AcceptedTileRow, FailureRow};
use crate::progress::{create_progress_bar, create_spinner, finish_success};

pub async fn execute<S>(
    cli: &Cli,
    config: &ScrapeConfig,
    layout: &WorkDirLayout,
    source: S,
    output: &OutputWriter,
) -> Result<DiscoverySummary>
where
    S: RemoteSource,
{
    output.section("Discovery");

    let aoi = AoiGeometry::load(&cli.aoi, &config.target_crs)
        .await
        .with_context(|| format!("Failed to load area of interest {}", cli.aoi.display()))?;
    output.kv("AOI", format!("{} ({})", cli.aoi.display(), aoi.crs()));

    let spinner = create_spinner("Listing candidate metadata documents...", output.is_json());
    let index = CandidateIndex::new(&layout.index_cache, &config.metadata_suffix);
    let candidates = index
        .list(&source, &config.listing_url, cache_policy(cli, config))
        .await
        .context("Failed to build candidate index")?;
    finish_success(&spinner, &format!("{} candidate documents", candidates.len()));

    let bar = create_progress_bar(candidates.len() as u64, "Evaluating candidates", output.is_json());
    let tick = bar.clone();

    let engine = FilterEngine::new(
        source,
        MetadataParser::new(MetadataSchema::fgdc(), config.target_crs.clone()),
        TileStore::new(&layout.records_dir, &layout.geometry_dir),
        Arc::new(aoi),
        config.discovery_workers,
    )
    .with_progress(Box::new(move |_: &CandidateReport| tick.inc(1)));

    let summary = engine.run(candidates, cli.year).await;
    finish_success(&bar, &format!("Evaluated {} candidates", summary.total));

    print_summary(&summary, output);
    Ok(summary)
}

fn print_summary(summary: &DiscoverySummary, output: &OutputWriter) {
    output.success(format!(
        "{} accepted, {} rejected ({} before threshold, {} outside AOI), {} failed",
        summary.accepted.len(),
        summary.rejected(),
        summary.before_threshold,
        summary.outside_aoi,
        summary.failures.len()
    ));

    output.table(summary.accepted.iter().map(AcceptedTileRow::from).collect());

    if !summary.failures.is_empty() {
        output.warning(format!("{} candidates could not be evaluated", summary.failures.len()));
        output.table(summary.failures.iter().map(FailureRow::from).collect());
    }
}
