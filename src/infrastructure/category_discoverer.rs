//! Category taxonomy traversal
//!
//! Breadth-first over an explicit worklist with a visited set. Each category
//! page contributes its subcategory links (first page only) and the products
//! of every page of its product listing.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::product::ProductReference;
use crate::domain::services::DocumentFetcher;
use crate::infrastructure::page_walker::PageWalker;
use crate::infrastructure::parsing::listing_parser::{ListingKind, ListingParser};

/// Products found under one category root
#[derive(Debug, Default)]
pub struct Discovery {
    pub products: Vec<ProductReference>,
    pub categories_visited: usize,
    /// Products advertising zero reviews, not worth a listing walk
    pub skipped_empty: u64,
    pub failed_fetches: u64,
}

pub struct CategoryDiscoverer {
    fetcher: Arc<dyn DocumentFetcher>,
    parser: Arc<ListingParser>,
    max_depth: u32,
    max_pages: Option<u32>,
}

impl CategoryDiscoverer {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, parser: Arc<ListingParser>, max_depth: u32) -> Self {
        Self {
            fetcher,
            parser,
            max_depth,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub async fn discover(&self, root_url: &str) -> Discovery {
        let mut discovery = Discovery::default();
        let mut worklist: VecDeque<(String, u32)> = VecDeque::from([(root_url.to_string(), 0)]);
        let mut visited: HashSet<String> = HashSet::from([root_url.to_string()]);
        let mut seen_products: HashSet<String> = HashSet::new();

        while let Some((category_url, depth)) = worklist.pop_front() {
            discovery.categories_visited += 1;
            debug!("[CategoryDiscoverer] Visiting {} (depth {})", category_url, depth);

            let mut walker = PageWalker::walk(
                self.fetcher.clone(),
                self.parser.clone(),
                ListingKind::Products,
                category_url.clone(),
            )
            .with_max_pages(self.max_pages);

            while let Some(result) = walker.next_page().await {
                let page = match result {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("[CategoryDiscoverer] {}: {}", category_url, e);
                        discovery.failed_fetches += 1;
                        break;
                    }
                };

                if page.number == 1 && depth < self.max_depth {
                    for sub in self.parser.subcategory_urls(&page.html, &page.url) {
                        if visited.insert(sub.clone()) {
                            worklist.push_back((sub, depth + 1));
                        }
                    }
                }

                for fragment in &page.fragments {
                    let Some(reference) = self.parser.product_reference(fragment, &page.url) else {
                        continue;
                    };
                    if reference.review_count_hint == Some(0) {
                        discovery.skipped_empty += 1;
                        continue;
                    }
                    if seen_products.insert(reference.url.clone()) {
                        discovery.products.push(reference);
                    }
                }
            }
        }

        info!(
            "[CategoryDiscoverer] {} products in {} categories under {} ({} without reviews)",
            discovery.products.len(),
            discovery.categories_visited,
            root_url,
            discovery.skipped_empty
        );
        discovery
    }
}
