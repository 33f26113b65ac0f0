//! In-memory remote source, used for offline runs and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, ScrapeError};
use crate::ports::RemoteSource;

/// Serves canned responses keyed by URL and counts every request
#[derive(Debug, Default)]
pub struct InMemorySource {
    resources: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text resource
    pub fn with_text(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.resources.insert(url.into(), body.into().into_bytes());
        self
    }

    /// Register a binary resource
    pub fn with_bytes(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.resources.insert(url.into(), body);
        self
    }

    /// Number of requests made for `url`, successful or not
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of requests made
    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    fn lookup(&self, url: &str) -> Result<&[u8]> {
        *self
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_insert(0) += 1;

        self.resources.get(url).map(Vec::as_slice).ok_or_else(|| ScrapeError::Fetch {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })
    }
}

#[async_trait]
impl RemoteSource for InMemorySource {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.lookup(url)?;
        String::from_utf8(body.to_vec()).map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            reason: format!("response is not UTF-8: {}", e),
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let body = self.lookup(url)?.to_vec();
        let len = body.len() as u64;
        tokio::fs::write(dest, body).await?;
        Ok(len)
    }
}
