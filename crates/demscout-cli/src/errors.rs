use console::style;
use demscout_core::ScrapeError;

use crate::output::status_json;

/// Print a fatal error with its cause chain and, where one is known, a hint
pub fn report_fatal(error: &anyhow::Error, json: bool) {
    if json {
        eprintln!("{}", status_json("error", format!("{:#}", error)));
        return;
    }

    eprintln!("{} {}", style("✗").red().bold(), style(error).red().bold());
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", style("caused by:").dim(), cause);
    }

    if let Some(hint) = suggestion(error) {
        eprintln!("\n{} {}", style("To fix this:").yellow().bold(), hint);
    }
}

fn suggestion(error: &anyhow::Error) -> Option<&'static str> {
    let scrape_error = error.chain().find_map(|cause| cause.downcast_ref::<ScrapeError>())?;

    match scrape_error {
        ScrapeError::GeometryLoad { .. } => {
            Some("Check that --aoi points to a polygon Shapefile (with .shx/.dbf) or GeoJSON file")
        }
        ScrapeError::UnsupportedFormat { .. } => Some("Convert the AOI to a Shapefile or GeoJSON file"),
        ScrapeError::ListingFetch { .. } => {
            Some("Check network access to the listing URL, or rerun once a cached index exists")
        }
        ScrapeError::Projection { .. } => Some("Check that the AOI's CRS is a valid EPSG code known to PROJ"),
        ScrapeError::ConfigInvalid { .. } | ScrapeError::ConfigMissing { .. } => {
            Some("Review demscout.toml and DEMSCOUT_* environment variables")
        }
        _ => None,
    }
}
