//! Command implementations

mod discover;
mod retrieve;

use anyhow::{Context, Result};
use demscout_core::http::HttpSource;
use demscout_core::layout::WorkDirLayout;
use demscout_core::ScrapeError;

use crate::cli::Cli;
use crate::config::resolve_config;
use crate::output::OutputWriter;
use crate::output_types::RunOutput;

/// Run the phases selected on the command line
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let layout = WorkDirLayout::new(&cli.path);
    layout
        .ensure()
        .with_context(|| format!("Failed to prepare working directory {}", cli.path.display()))?;

    let config = resolve_config(&cli, &layout)?;
    let (run_discovery, run_retrieval) = cli.phases();

    tracing::info!(
        work_dir = %layout.root.display(),
        year = cli.year,
        discovery = run_discovery,
        retrieval = run_retrieval,
        "Starting run"
    );

    let mut run = RunOutput {
        work_dir: layout.root.display().to_string(),
        year_threshold: cli.year,
        discovery: None,
        retrieval: None,
    };

    // A listing failure ends discovery only; retrieval still runs on rows
    // from earlier runs and the exit status reports the failure.
    let mut deferred = None;

    if run_discovery {
        let source = HttpSource::new(config.request_timeout).context("Failed to create HTTP client")?;
        match discover::execute(&cli, &config, &layout, source, &output).await {
            Ok(summary) => run.discovery = Some(summary),
            Err(e) if run_retrieval && is_listing_failure(&e) => {
                output.warning(format!("{:#}", e));
                deferred = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    if run_retrieval {
        let source = HttpSource::new(config.request_timeout).context("Failed to create HTTP client")?;
        run.retrieval = Some(retrieve::execute(&config, &layout, source, &output).await?);
    }

    match deferred {
        Some(e) => Err(e),
        None => output.result(run),
    }
}

fn is_listing_failure(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<ScrapeError>(), Some(ScrapeError::ListingFetch { .. })))
}
