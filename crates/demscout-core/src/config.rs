use crate::error::{Result, ScrapeError};
use crate::models::Crs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Directory listing of the USGS 1/9 arc-second IMG metadata documents
pub const DEFAULT_LISTING_URL: &str =
    "https://thor-f5.er.usgs.gov/ngtoc/metadata/waf/elevation/1-9_arc-second/img/";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for demscout
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub listing_url: ConfigValue<String>,
    pub target_epsg: ConfigValue<u32>,
    pub discovery_workers: ConfigValue<usize>,
    pub retrieval_workers: ConfigValue<usize>,
    pub metadata_suffix: ConfigValue<String>,
    pub archive_extension: ConfigValue<String>,
    pub cache_max_age_hours: ConfigValue<Option<u64>>,
    pub request_timeout_secs: ConfigValue<Option<u64>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            listing_url: ConfigValue::new(DEFAULT_LISTING_URL.to_string(), ConfigSource::Default),
            target_epsg: ConfigValue::new(4269, ConfigSource::Default),
            discovery_workers: ConfigValue::new(60, ConfigSource::Default),
            retrieval_workers: ConfigValue::new(10, ConfigSource::Default),
            metadata_suffix: ConfigValue::new(".xml".to_string(), ConfigSource::Default),
            archive_extension: ConfigValue::new("zip".to_string(), ConfigSource::Default),
            cache_max_age_hours: ConfigValue::new(None, ConfigSource::Default),
            request_timeout_secs: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ScrapeError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| ScrapeError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(url) = file_config.listing_url {
            self.listing_url.update(url, ConfigSource::File);
        }
        if let Some(epsg) = file_config.target_epsg {
            self.target_epsg.update(epsg, ConfigSource::File);
        }
        if let Some(workers) = file_config.discovery_workers {
            self.discovery_workers.update(workers, ConfigSource::File);
        }
        if let Some(workers) = file_config.retrieval_workers {
            self.retrieval_workers.update(workers, ConfigSource::File);
        }
        if let Some(suffix) = file_config.metadata_suffix {
            self.metadata_suffix.update(suffix, ConfigSource::File);
        }
        if let Some(ext) = file_config.archive_extension {
            self.archive_extension.update(ext, ConfigSource::File);
        }
        if let Some(hours) = file_config.cache_max_age_hours {
            self.cache_max_age_hours.update(Some(hours), ConfigSource::File);
        }
        if let Some(secs) = file_config.request_timeout_secs {
            self.request_timeout_secs.update(Some(secs), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(url) = env::var("DEMSCOUT_LISTING_URL") {
            self.listing_url.update(url, ConfigSource::Environment);
        }

        if let Some(epsg) = parse_env::<u32>("DEMSCOUT_TARGET_EPSG", "integer EPSG code") {
            self.target_epsg.update(epsg, ConfigSource::Environment);
        }

        if let Some(workers) = parse_env::<usize>("DEMSCOUT_DISCOVERY_WORKERS", "positive integer")
        {
            self.discovery_workers.update(workers, ConfigSource::Environment);
        }

        if let Some(workers) = parse_env::<usize>("DEMSCOUT_RETRIEVAL_WORKERS", "positive integer")
        {
            self.retrieval_workers.update(workers, ConfigSource::Environment);
        }

        if let Ok(suffix) = env::var("DEMSCOUT_METADATA_SUFFIX") {
            self.metadata_suffix.update(suffix, ConfigSource::Environment);
        }

        if let Ok(ext) = env::var("DEMSCOUT_ARCHIVE_EXTENSION") {
            self.archive_extension.update(ext, ConfigSource::Environment);
        }

        if let Some(hours) = parse_env::<u64>("DEMSCOUT_CACHE_MAX_AGE_HOURS", "number of hours") {
            self.cache_max_age_hours.update(Some(hours), ConfigSource::Environment);
        }

        if let Some(secs) = parse_env::<u64>("DEMSCOUT_REQUEST_TIMEOUT_SECS", "number of seconds")
        {
            self.request_timeout_secs.update(Some(secs), ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(url) = overrides.listing_url {
            self.listing_url.update(url, ConfigSource::Cli);
        }
        if let Some(workers) = overrides.discovery_workers {
            self.discovery_workers.update(workers, ConfigSource::Cli);
        }
        if let Some(workers) = overrides.retrieval_workers {
            self.retrieval_workers.update(workers, ConfigSource::Cli);
        }
        if let Some(hours) = overrides.cache_max_age_hours {
            self.cache_max_age_hours.update(Some(hours), ConfigSource::Cli);
        }
    }

    /// Validate the layered values and freeze them into a [`ScrapeConfig`]
    pub fn resolve(&self) -> Result<ScrapeConfig> {
        let listing_url = self.listing_url.value.trim().to_string();
        if !(listing_url.starts_with("http://") || listing_url.starts_with("https://")) {
            return Err(ScrapeError::ConfigInvalid {
                key: "listing_url".to_string(),
                reason: format!("'{}' is not an absolute http(s) URL", listing_url),
            });
        }

        for (key, workers) in [
            ("discovery_workers", self.discovery_workers.value),
            ("retrieval_workers", self.retrieval_workers.value),
        ] {
            if workers == 0 {
                return Err(ScrapeError::ConfigInvalid {
                    key: key.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.metadata_suffix.value.is_empty() {
            return Err(ScrapeError::ConfigMissing { key: "metadata_suffix".to_string() });
        }

        let archive_extension = self.archive_extension.value.trim_start_matches('.').to_string();
        if archive_extension.is_empty() {
            return Err(ScrapeError::ConfigMissing { key: "archive_extension".to_string() });
        }

        let cache_max_age = match self.cache_max_age_hours.value {
            Some(hours) => Some(hours.checked_mul(3600).map(Duration::from_secs).ok_or_else(|| {
                ScrapeError::ConfigInvalid {
                    key: "cache_max_age_hours".to_string(),
                    reason: format!("{} hours is too large", hours),
                }
            })?),
            None => None,
        };

        Ok(ScrapeConfig {
            listing_url,
            target_crs: Crs::from_epsg(self.target_epsg.value),
            discovery_workers: self.discovery_workers.value,
            retrieval_workers: self.retrieval_workers.value,
            metadata_suffix: self.metadata_suffix.value.clone(),
            archive_extension,
            cache_max_age,
            request_timeout: self.request_timeout_secs.value.map(Duration::from_secs),
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "listing_url".to_string(),
            (self.listing_url.value.clone(), self.listing_url.source),
        );
        map.insert(
            "target_crs".to_string(),
            (format!("EPSG:{}", self.target_epsg.value), self.target_epsg.source),
        );
        map.insert(
            "discovery_workers".to_string(),
            (self.discovery_workers.value.to_string(), self.discovery_workers.source),
        );
        map.insert(
            "retrieval_workers".to_string(),
            (self.retrieval_workers.value.to_string(), self.retrieval_workers.source),
        );
        map.insert(
            "metadata_suffix".to_string(),
            (self.metadata_suffix.value.clone(), self.metadata_suffix.source),
        );
        map.insert(
            "archive_extension".to_string(),
            (self.archive_extension.value.clone(), self.archive_extension.source),
        );
        map.insert(
            "cache_max_age_hours".to_string(),
            (
                display_optional(self.cache_max_age_hours.value, "unbounded"),
                self.cache_max_age_hours.source,
            ),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            (
                display_optional(self.request_timeout_secs.value, "transport default"),
                self.request_timeout_secs.source,
            ),
        );

        map
    }
}

/// Immutable run configuration, built once at startup and passed by value
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub listing_url: String,
    pub target_crs: Crs,
    pub discovery_workers: usize,
    pub retrieval_workers: usize,
    pub metadata_suffix: String,
    pub archive_extension: String,
    pub cache_max_age: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            target_crs: Crs::nad83(),
            discovery_workers: 60,
            retrieval_workers: 10,
            metadata_suffix: ".xml".to_string(),
            archive_extension: "zip".to_string(),
            cache_max_age: None,
            request_timeout: None,
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    listing_url: Option<String>,
    target_epsg: Option<u32>,
    discovery_workers: Option<usize>,
    retrieval_workers: Option<usize>,
    metadata_suffix: Option<String>,
    archive_extension: Option<String>,
    cache_max_age_hours: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub listing_url: Option<String>,
    pub discovery_workers: Option<usize>,
    pub retrieval_workers: Option<usize>,
    pub cache_max_age_hours: Option<u64>,
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected {}", key, raw, expected);
            None
        }
    }
}

fn display_optional(value: Option<u64>, unset: &str) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| unset.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.target_epsg.value, 4269);
        assert_eq!(config.target_epsg.source, ConfigSource::Default);
        assert_eq!(config.discovery_workers.value, 60);
        assert_eq!(config.retrieval_workers.value, 10);
        assert_eq!(config.listing_url.value, DEFAULT_LISTING_URL);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listing_url = "https://mirror.example.gov/img/"
discovery_workers = 8
archive_extension = ".zip"
cache_max_age_hours = 24
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.listing_url.value, "https://mirror.example.gov/img/");
        assert_eq!(config.listing_url.source, ConfigSource::File);
        assert_eq!(config.discovery_workers.value, 8);
        assert_eq!(config.retrieval_workers.source, ConfigSource::Default);

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.archive_extension, "zip");
        assert_eq!(resolved.cache_max_age, Some(Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "discovery_workers = \"many\"").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(ScrapeError::ConfigInvalid { .. })));
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        env::set_var("DEMSCOUT_DISCOVERY_WORKERS", "12");
        env::set_var("DEMSCOUT_RETRIEVAL_WORKERS", "lots");

        let config = LayeredConfig::with_defaults().load_from_env();

        env::remove_var("DEMSCOUT_DISCOVERY_WORKERS");
        env::remove_var("DEMSCOUT_RETRIEVAL_WORKERS");

        assert_eq!(config.discovery_workers.value, 12);
        assert_eq!(config.discovery_workers.source, ConfigSource::Environment);
        // Invalid values are ignored
        assert_eq!(config.retrieval_workers.value, 10);
        assert_eq!(config.retrieval_workers.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            discovery_workers: Some(4),
            cache_max_age_hours: Some(1),
            ..Default::default()
        });

        assert_eq!(config.discovery_workers.value, 4);
        assert_eq!(config.discovery_workers.source, ConfigSource::Cli);
        assert_eq!(config.cache_max_age_hours.value, Some(1));
        assert_eq!(config.listing_url.source, ConfigSource::Default);
    }

    #[test]
    fn test_resolve_rejects_zero_workers() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            retrieval_workers: Some(0),
            ..Default::default()
        });

        match config.resolve() {
            Err(ScrapeError::ConfigInvalid { key, .. }) => assert_eq!(key, "retrieval_workers"),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_relative_listing_url() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            listing_url: Some("metadata/img/".to_string()),
            ..Default::default()
        });

        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_resolve_rejects_overflowing_cache_age() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            cache_max_age_hours: Some(u64::MAX / 1000),
            ..Default::default()
        });

        match config.resolve() {
            Err(ScrapeError::ConfigInvalid { key, .. }) => assert_eq!(key, "cache_max_age_hours"),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }

        let mut bounded = LayeredConfig::with_defaults();
        bounded.update_from_cli(CliConfigOverrides {
            cache_max_age_hours: Some(48),
            ..Default::default()
        });
        assert_eq!(bounded.resolve().unwrap().cache_max_age, Some(Duration::from_secs(48 * 3600)));
    }

    #[test]
    fn test_default_scrape_config() {
        let config = ScrapeConfig::default();
        assert_eq!(config, LayeredConfig::with_defaults().resolve().unwrap());
        assert_eq!(config.target_crs, Crs::nad83());
        assert_eq!(config.metadata_suffix, ".xml");
        assert!(config.cache_max_age.is_none());
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("listing_url"));
        assert!(map.contains_key("discovery_workers"));

        let (crs_value, crs_source) = &map["target_crs"];
        assert_eq!(crs_value, "EPSG:4269");
        assert_eq!(*crs_source, ConfigSource::Default);

        let (age, _) = &map["cache_max_age_hours"];
        assert_eq!(age, "unbounded");
    }
}
