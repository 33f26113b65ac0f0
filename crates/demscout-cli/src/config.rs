//! Configuration loading for a run

use anyhow::{Context, Result};
use demscout_core::config::{CliConfigOverrides, LayeredConfig, ScrapeConfig};
use demscout_core::layout::WorkDirLayout;
use demscout_discovery::CachePolicy;

use crate::cli::Cli;

/// Load layered configuration: defaults, then the config file, then the
/// environment, then command-line flags
pub fn load_config(cli: &Cli, layout: &WorkDirLayout) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    match &cli.config {
        Some(path) => {
            config = config
                .load_from_file(path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
        }
        None => {
            let default_path = layout.config_file();
            if default_path.is_file() {
                config = config
                    .load_from_file(&default_path)
                    .with_context(|| format!("Failed to load configuration file {}", default_path.display()))?;
            }
        }
    }

    let mut config = config.load_from_env();
    config.update_from_cli(CliConfigOverrides {
        listing_url: cli.listing_url.clone(),
        discovery_workers: cli.discovery_workers,
        retrieval_workers: cli.retrieval_workers,
        cache_max_age_hours: cli.max_cache_age_hours,
    });

    Ok(config)
}

/// Load and validate the run configuration
pub fn resolve_config(cli: &Cli, layout: &WorkDirLayout) -> Result<ScrapeConfig> {
    let layered = load_config(cli, layout)?;
    log_sources(&layered);
    layered.resolve().context("Invalid configuration")
}

/// Cache policy for the candidate index
pub fn cache_policy(cli: &Cli, config: &ScrapeConfig) -> CachePolicy {
    if cli.refresh_index {
        CachePolicy::Refresh
    } else {
        CachePolicy::from_max_age(config.cache_max_age)
    }
}

fn log_sources(config: &LayeredConfig) {
    let mut entries: Vec<_> = config.to_inspection_map().into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, (value, source)) in entries {
        tracing::debug!(key = %key, value = %value, source = ?source, "Configuration value");
    }
}
