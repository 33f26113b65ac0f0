//! Zip archive extraction

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use demscout_core::error::{Result, ScrapeError};

/// Extract every entry of `archive` into the directory `target`.
///
/// Entries are unpacked into a sibling staging directory that is renamed
/// onto `target` only after the whole archive succeeded, so a present
/// `target` is always complete. Entry names escaping the directory are
/// rejected by the zip reader. Returns the number of entries.
pub fn extract_archive(archive: &Path, target: &Path, identifier: &str) -> Result<usize> {
    let archive_error = |reason: String| ScrapeError::Archive {
        identifier: identifier.to_string(),
        reason,
    };

    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| archive_error(format!("Failed to open {}: {}", archive.display(), e)))?;
    let entries = zip.len();

    let staging = staging_dir(target);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    if let Err(e) = zip.extract(&staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(archive_error(e.to_string()));
    }

    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(&staging, target)?;

    tracing::debug!(identifier, entries, target = %target.display(), "Archive extracted");
    Ok(entries)
}

fn staging_dir(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial", name))
}
