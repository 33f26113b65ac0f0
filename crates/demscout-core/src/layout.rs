//! Working directory layout
//!
//! Every run works under a fixed subtree of the user's working directory:
//!
//! ```text
//! <root>/
//!   demscout.toml
//!   tmp/
//!     xml_list.csv
//!     geoms/
//!     csvs/
//!     zips/
//!     dems/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Name of the optional configuration file at the root of the working directory
pub const CONFIG_FILE_NAME: &str = "demscout.toml";

/// Resolved paths for one working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirLayout {
    pub root: PathBuf,
    pub temp_dir: PathBuf,
    pub geometry_dir: PathBuf,
    pub records_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub extract_dir: PathBuf,
    pub index_cache: PathBuf,
}

impl WorkDirLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let temp_dir = root.join("tmp");

        Self {
            geometry_dir: temp_dir.join("geoms"),
            records_dir: temp_dir.join("csvs"),
            archive_dir: temp_dir.join("zips"),
            extract_dir: temp_dir.join("dems"),
            index_cache: temp_dir.join("xml_list.csv"),
            temp_dir,
            root,
        }
    }

    /// Create every directory of the layout that does not exist yet
    pub fn ensure(&self) -> Result<()> {
        for dir in self.directories() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                tracing::debug!(path = %dir.display(), "Created directory");
            }
        }
        Ok(())
    }

    /// Default location of the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    fn directories(&self) -> [&PathBuf; 6] {
        [
            &self.root,
            &self.temp_dir,
            &self.geometry_dir,
            &self.records_dir,
            &self.archive_dir,
            &self.extract_dir,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = WorkDirLayout::new("/data/project");
        assert_eq!(layout.temp_dir, PathBuf::from("/data/project/tmp"));
        assert_eq!(layout.records_dir, PathBuf::from("/data/project/tmp/csvs"));
        assert_eq!(layout.index_cache, PathBuf::from("/data/project/tmp/xml_list.csv"));
        assert_eq!(layout.config_file(), PathBuf::from("/data/project/demscout.toml"));
    }

    #[test]
    fn test_ensure_creates_tree() {
        let temp_dir = TempDir::new().unwrap();
        let layout = WorkDirLayout::new(temp_dir.path().join("work"));

        layout.ensure().unwrap();
        // Second call is a no-op
        layout.ensure().unwrap();

        assert!(layout.geometry_dir.is_dir());
        assert!(layout.records_dir.is_dir());
        assert!(layout.archive_dir.is_dir());
        assert!(layout.extract_dir.is_dir());
        assert!(!layout.index_cache.exists());
    }
}
