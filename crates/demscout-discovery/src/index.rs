//! Candidate index: the list of metadata documents published by the service.
//!
//! The listing page is scraped once and cached to a CSV file with one
//! `url,listed_at` row per candidate. Whether the cache is trusted is decided
//! by the caller's [`CachePolicy`].

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::Candidate;
use demscout_core::ports::RemoteSource;

/// When an existing index cache may be used instead of re-listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Use any existing cache, however old
    #[default]
    PreferCache,
    /// Rebuild caches older than the bound
    MaxAge(Duration),
    /// Always rebuild
    Refresh,
}

impl CachePolicy {
    /// Policy implied by a configured maximum cache age
    pub fn from_max_age(max_age: Option<Duration>) -> Self {
        max_age.map_or(CachePolicy::PreferCache, CachePolicy::MaxAge)
    }
}

/// One row of the index cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub listed_at: DateTime<Utc>,
}

/// Cached candidates together with the time they were listed
#[derive(Debug, Clone)]
pub struct CachedIndex {
    pub candidates: Vec<Candidate>,
    pub listed_at: DateTime<Utc>,
}

impl CachedIndex {
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.listed_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Builds and caches the list of candidate metadata documents
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    cache_path: PathBuf,
    metadata_suffix: String,
}

impl CandidateIndex {
    pub fn new(cache_path: impl Into<PathBuf>, metadata_suffix: impl Into<String>) -> Self {
        Self {
            cache_path: cache_path.into(),
            metadata_suffix: metadata_suffix.into(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Candidates to process, honouring `policy` for the on-disk cache.
    ///
    /// A stale cache is still returned, with a warning, when re-listing
    /// fails. Without any usable cache a listing failure is `ListingFetch`.
    pub async fn list<S>(&self, source: &S, listing_url: &str, policy: CachePolicy) -> Result<Vec<Candidate>>
    where
        S: RemoteSource + ?Sized,
    {
        let cached = match policy {
            CachePolicy::Refresh => None,
            _ => self.read_cache(),
        };

        if let Some(cached) = cached {
            match policy {
                CachePolicy::MaxAge(max_age) if cached.age() > max_age => {
                    tracing::info!(
                        age_secs = cached.age().as_secs(),
                        max_age_secs = max_age.as_secs(),
                        "Candidate index cache is stale, re-listing"
                    );
                    return match self.rebuild(source, listing_url).await {
                        Ok(candidates) => Ok(candidates),
                        Err(e) => {
                            tracing::warn!(error = %e, "Re-listing failed, using stale candidate index");
                            Ok(cached.candidates)
                        }
                    };
                }
                _ => {
                    tracing::info!(
                        path = %self.cache_path.display(),
                        candidates = cached.candidates.len(),
                        "Using cached candidate index"
                    );
                    return Ok(cached.candidates);
                }
            }
        }

        self.rebuild(source, listing_url).await
    }

    /// Read the cache file; an absent, empty or unreadable cache is `None`
    pub fn read_cache(&self) -> Option<CachedIndex> {
        if !self.cache_path.exists() {
            return None;
        }

        let entries = match read_entries(&self.cache_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.cache_path.display(), error = %e, "Ignoring unreadable index cache");
                return None;
            }
        };

        let listed_at = entries.iter().map(|e| e.listed_at).min()?;
        Some(CachedIndex {
            candidates: entries.into_iter().map(|e| Candidate::new(e.url)).collect(),
            listed_at,
        })
    }

    async fn rebuild<S>(&self, source: &S, listing_url: &str) -> Result<Vec<Candidate>>
    where
        S: RemoteSource + ?Sized,
    {
        tracing::info!(url = listing_url, "Listing candidate metadata documents");

        let html = source.fetch_text(listing_url).await.map_err(|e| ScrapeError::ListingFetch {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

        let candidates = extract_links(&html, listing_url, &self.metadata_suffix)?;
        self.write_cache(&candidates, Utc::now())?;

        tracing::info!(candidates = candidates.len(), "Candidate index rebuilt");
        Ok(candidates)
    }

    fn write_cache(&self, candidates: &[Candidate], listed_at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let partial = self.cache_path.with_extension("csv.part");
        {
            let mut writer = csv::Writer::from_path(&partial)?;
            for candidate in candidates {
                writer.serialize(CacheEntry {
                    url: candidate.url.clone(),
                    listed_at,
                })?;
            }
            writer.flush()?;
        }
        std::fs::rename(&partial, &self.cache_path)?;

        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Vec<CacheEntry>> {
    let mut reader = csv::Reader::from_path(path)?;
    let entries = reader.deserialize().collect::<std::result::Result<Vec<CacheEntry>, _>>()?;
    Ok(entries)
}

/// Every link target in `html` whose path ends with `suffix`, resolved
/// against `base_url`, de-duplicated in document order
pub fn extract_links(html: &str, base_url: &str, suffix: &str) -> Result<Vec<Candidate>> {
    static HREF: OnceLock<Option<Regex>> = OnceLock::new();
    let href = HREF
        .get_or_init(|| Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).ok())
        .as_ref()
        .ok_or_else(|| ScrapeError::Serialization("invalid link pattern".to_string()))?;

    let base = Url::parse(base_url).map_err(|e| ScrapeError::ConfigInvalid {
        key: "listing_url".to_string(),
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for caps in href.captures_iter(html) {
        let Some(target) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };

        let Ok(resolved) = base.join(target.as_str().trim()) else {
            tracing::debug!(href = target.as_str(), "Skipping unresolvable link");
            continue;
        };

        if !resolved.path().ends_with(suffix) {
            continue;
        }

        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            candidates.push(Candidate::new(url));
        }
    }

    Ok(candidates)
}
