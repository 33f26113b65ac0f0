//! Port definitions (trait interfaces) for reaching the remote service

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

pub mod memory;

pub use memory::InMemorySource;

/// Read access to the remote metadata and archive service.
///
/// Implementations must be shareable across concurrent workers; every call is
/// independent and failures are reported per URL.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch a document (listing page or metadata XML) as text
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream the resource at `url` into `dest`, returning the bytes written
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}
