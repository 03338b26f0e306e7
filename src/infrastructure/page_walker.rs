//! Paginated listing walker
//!
//! Follows "next" links one page at a time. The walker is lazy: nothing is
//! fetched until [`PageWalker::next_page`] is awaited, so a caller that stops
//! early (the actualization stop-on-match rule) never pays for the pages it
//! did not need. A fetch failure is reported once and ends the chain; there
//! is no automatic retry.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::HarvestResult;
use crate::domain::services::DocumentFetcher;
use crate::infrastructure::parsing::listing_parser::{ListingKind, ListingParser};

/// One fetched page of a listing
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    /// 1-based position in the chain
    pub number: u32,
    /// Raw document, kept for page-level metadata
    pub html: String,
    /// Outer HTML of each listing item, in page order
    pub fragments: Vec<String>,
    pub next_url: Option<String>,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.next_url.is_some()
    }
}

pub struct PageWalker {
    fetcher: Arc<dyn DocumentFetcher>,
    parser: Arc<ListingParser>,
    kind: ListingKind,
    next_url: Option<String>,
    number: u32,
    max_pages: Option<u32>,
    visited: HashSet<String>,
}

impl PageWalker {
    pub fn walk(
        fetcher: Arc<dyn DocumentFetcher>,
        parser: Arc<ListingParser>,
        kind: ListingKind,
        start_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            kind,
            next_url: Some(start_url.into()),
            number: 0,
            max_pages: None,
            visited: HashSet::new(),
        }
    }

    /// Stop after `max_pages` pages even if the site offers more
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> u32 {
        self.number
    }

    /// Fetch the next page; `None` once the chain has ended
    pub async fn next_page(&mut self) -> Option<HarvestResult<Page>> {
        let url = self.next_url.take()?;

        if self.max_pages.is_some_and(|max| self.number >= max) {
            debug!("[PageWalker] Page limit reached before {}", url);
            return None;
        }
        if !self.visited.insert(url.clone()) {
            warn!("[PageWalker] Pagination loops back to {}, stopping", url);
            return None;
        }

        self.number += 1;
        let html = match self.fetcher.fetch_html(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("[PageWalker] Page {} failed, chain broken: {}", self.number, e);
                return Some(Err(e));
            }
        };

        let content = self.parser.split_page(&html, &url, self.kind);
        self.next_url = content.next_url.clone();

        Some(Ok(Page {
            url,
            number: self.number,
            html,
            fragments: content.fragments,
            next_url: content.next_url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixtureFetcher, review_page};

    fn walker(fetcher: &Arc<FixtureFetcher>, start: &str) -> PageWalker {
        PageWalker::walk(
            fetcher.clone(),
            Arc::new(ListingParser::new().unwrap()),
            ListingKind::Reviews,
            start,
        )
    }

    #[tokio::test]
    async fn test_walks_until_no_next_link() {
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            "https://p.example/recenze/",
            review_page("P", 3, &[("A", "3. května 2021")], Some("?f=2")),
        );
        fetcher.insert(
            "https://p.example/recenze/?f=2",
            review_page("P", 3, &[("B", "2. května 2021"), ("C", "1. května 2021")], None),
        );

        let mut walker = walker(&fetcher, "https://p.example/recenze/");
        let first = walker.next_page().await.unwrap().unwrap();
        assert_eq!(first.number, 1);
        assert!(first.has_next());
        assert_eq!(first.fragments.len(), 1);

        let second = walker.next_page().await.unwrap().unwrap();
        assert_eq!(second.number, 2);
        assert!(!second.has_next());
        assert_eq!(second.fragments.len(), 2);

        assert!(walker.next_page().await.is_none());
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_breaks_chain() {
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            "https://p.example/recenze/",
            review_page("P", 3, &[("A", "3. května 2021")], Some("?f=2")),
        );

        let mut walker = walker(&fetcher, "https://p.example/recenze/");
        assert!(walker.next_page().await.unwrap().is_ok());
        assert!(walker.next_page().await.unwrap().is_err());
        assert!(walker.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_loop_and_limit_guards() {
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            "https://p.example/recenze/?f=1",
            review_page("P", 1, &[("A", "3. května 2021")], Some("?f=2")),
        );
        fetcher.insert(
            "https://p.example/recenze/?f=2",
            review_page("P", 1, &[("B", "2. května 2021")], Some("?f=1")),
        );

        let mut looping = walker(&fetcher, "https://p.example/recenze/?f=1");
        assert!(looping.next_page().await.unwrap().is_ok());
        assert!(looping.next_page().await.unwrap().is_ok());
        assert!(looping.next_page().await.is_none());

        let mut limited = walker(&fetcher, "https://p.example/recenze/?f=1").with_max_pages(Some(1));
        assert!(limited.next_page().await.unwrap().is_ok());
        assert!(limited.next_page().await.is_none());
        assert_eq!(limited.pages_fetched(), 1);
    }
}
