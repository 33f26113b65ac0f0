//! HTTP implementation of [`RemoteSource`] backed by reqwest

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ScrapeError};
use crate::ports::RemoteSource;

/// Remote source talking to the metadata service over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source; `timeout` of `None` keeps the transport defaults
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("demscout/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| ScrapeError::ConfigInvalid {
            key: "http".to_string(),
            reason: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| fetch_error(url, e))
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response.text().await.map_err(|e| fetch_error(url, e))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.get(url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| fetch_error(url, e))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, "Download complete");
        Ok(written)
    }
}

fn fetch_error(url: &str, err: reqwest::Error) -> ScrapeError {
    ScrapeError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
