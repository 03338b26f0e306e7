//! Service seams of the harvest pipeline
//!
//! The crawler never talks to reqwest directly; it goes through
//! [`DocumentFetcher`] so tests can serve fixture pages from memory.

use async_trait::async_trait;

use crate::domain::errors::HarvestResult;

/// Retrieves one document by URL
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the raw HTML body of `url`
    async fn fetch_html(&self, url: &str) -> HarvestResult<String>;
}
