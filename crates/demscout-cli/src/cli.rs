use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// demscout - discover and download elevation tiles intersecting an area of interest
#[derive(Parser, Debug)]
#[command(name = "demscout")]
#[command(about = "Discover and download elevation tiles intersecting an area of interest", long_about = None)]
#[command(version)]
#[command(group(ArgGroup::new("cache").args(["refresh_index", "max_cache_age_hours"])))]
pub struct Cli {
    /// Project working directory; tile files are kept under <PATH>/tmp
    #[arg(short, long)]
    pub path: PathBuf,

    /// Area of interest vector file (.shp, .geojson or .json)
    #[arg(short, long)]
    pub aoi: PathBuf,

    /// Earliest acquisition year to keep (inclusive)
    #[arg(short, long, value_parser = parse_year)]
    pub year: i32,

    /// Run the discovery phase
    #[arg(short, long)]
    pub scrape: bool,

    /// Run the download phase
    #[arg(short, long)]
    pub download: bool,

    /// Configuration file (defaults to <PATH>/demscout.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Re-list candidate documents even if a cached index exists
    #[arg(long)]
    pub refresh_index: bool,

    /// Re-list candidate documents when the cached index is older than this
    #[arg(long, value_name = "HOURS")]
    pub max_cache_age_hours: Option<u64>,

    /// Concurrent metadata documents in flight
    #[arg(long, value_name = "N")]
    pub discovery_workers: Option<usize>,

    /// Concurrent downloads in flight
    #[arg(long, value_name = "N")]
    pub retrieval_workers: Option<usize>,

    /// Directory listing of metadata documents
    #[arg(long, value_name = "URL")]
    pub listing_url: Option<String>,

    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Phases to run as (discover, retrieve); no flag means both
    pub fn phases(&self) -> (bool, bool) {
        if !self.scrape && !self.download {
            (true, true)
        } else {
            (self.scrape, self.download)
        }
    }
}

fn parse_year(raw: &str) -> Result<i32, String> {
    let trimmed = raw.trim();
    if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a four-digit year (YYYY)", raw));
    }
    trimmed.parse().map_err(|e| format!("'{}': {}", raw, e))
}
