//! Incremental actualization of one product's reviews
//!
//! The engine walks a product's review listing newest-first and compares
//! each parsed review against the newest review the store already holds.
//! Under the fast policy the first match ends the walk; everything fetched
//! before it is the delta. Without a match the whole listing is the delta.
//! The exhaustive policy, and a second URL for an already visited product,
//! read the whole listing and keep every review the store does not have.
//!
//! The engine never writes. It returns a [`ProductDelta`] and the caller
//! decides what to persist.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, trace, warn};

use crate::domain::errors::{HarvestError, HarvestResult};
use crate::domain::product::{Product, ProductReference, ReviewPlacement};
use crate::domain::review::{Fingerprint, Review};
use crate::domain::services::DocumentFetcher;
use crate::domain::statistics::Statistics;
use crate::infrastructure::config::{ActualizationPolicy, CrawlingConfig};
use crate::infrastructure::corpus_store::CategoryStore;
use crate::infrastructure::page_walker::{Page, PageWalker};
use crate::infrastructure::parsing::listing_parser::{ListingKind, ListingParser};
use crate::infrastructure::parsing::{ParseContext, ParsingError, ReviewParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActualizationState {
    /// Waiting for the next page
    Scanning,
    /// Checking the reviews of a fetched page
    Comparing,
    /// Reached the newest stored review
    MatchFound,
    /// Ran out of pages
    Exhausted,
}

impl ActualizationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::MatchFound | Self::Exhausted)
    }
}

/// Mutable state of one category run
#[derive(Debug)]
pub struct RunContext {
    category: String,
    /// Display name to the first URL it was seen under
    visited: HashMap<String, String>,
    pub stats: Statistics,
}

impl RunContext {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            visited: HashMap::new(),
            stats: Statistics::new(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Claim a product name for this run.
    ///
    /// A second URL with an already claimed name is an alias: the collision
    /// is counted and the URL the name was first seen under is returned.
    pub fn claim(&mut self, name: &str, url: &str) -> Option<String> {
        match self.visited.get(name) {
            Some(first_url) => {
                let collision = HarvestError::IdentityCollision {
                    name: name.to_string(),
                    first_url: first_url.clone(),
                };
                warn!("[RunContext] {}; merging reviews from {}", collision, url);
                self.stats.identity_collisions += 1;
                Some(first_url.clone())
            }
            None => {
                self.visited.insert(name.to_string(), url.to_string());
                None
            }
        }
    }

    pub fn products_visited(&self) -> usize {
        self.visited.len()
    }

    /// Count a product that could not be actualized
    pub fn record_skip(&mut self, error: &HarvestError) {
        match error {
            HarvestError::FetchFailure { .. } => {
                self.stats.failed_fetches += 1;
                self.stats.skipped_products += 1;
            }
            _ => self.stats.skipped_products += 1,
        }
    }
}

/// Reviews fetched for one product that the store does not have yet
#[derive(Debug, Clone)]
pub struct ProductDelta {
    /// Product identity with only the new reviews, newest first
    pub product: Product,
    /// Review count the listing advertises
    pub claimed: Option<u32>,
    pub state: ActualizationState,
    pub pages_fetched: u32,
    /// How the new reviews slot into the stored list
    pub placement: ReviewPlacement,
    /// First URL of the product when this listing is an alias of it
    pub alias_of: Option<String>,
}

impl ProductDelta {
    pub fn is_empty(&self) -> bool {
        self.product.reviews.is_empty()
    }
}

pub struct ActualizationEngine {
    fetcher: Arc<dyn DocumentFetcher>,
    listing_parser: Arc<ListingParser>,
    review_parser: Arc<ReviewParser>,
    crawling: CrawlingConfig,
    today: NaiveDate,
}

impl ActualizationEngine {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        listing_parser: Arc<ListingParser>,
        review_parser: Arc<ReviewParser>,
        crawling: CrawlingConfig,
    ) -> Self {
        Self {
            fetcher,
            listing_parser,
            review_parser,
            crawling,
            today: Local::now().date_naive(),
        }
    }

    /// Reference date for relative review dates
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_policy(mut self, policy: ActualizationPolicy) -> Self {
        self.crawling.policy = policy;
        self
    }

    pub fn policy(&self) -> ActualizationPolicy {
        self.crawling.policy
    }

    pub fn display_cap(&self) -> u64 {
        self.crawling.display_cap
    }

    /// Compute the new-review delta of one product.
    ///
    /// Errors mean the product is skipped for this run and its store entry
    /// stays as it was: the first page failed, the listing carries no
    /// product name, or the page chain broke part way.
    pub async fn actualize_product(
        &self,
        reference: &ProductReference,
        store: &CategoryStore,
        ctx: &mut RunContext,
    ) -> HarvestResult<ProductDelta> {
        let listing_url = self.crawling.reviews_url(&reference.url);
        let mut walker = PageWalker::walk(
            self.fetcher.clone(),
            self.listing_parser.clone(),
            ListingKind::Reviews,
            listing_url.clone(),
        )
        .with_max_pages(self.crawling.max_pages_per_listing);

        let first_page = match walker.next_page().await {
            Some(result) => result?,
            None => return Err(HarvestError::fetch_failure(&listing_url, "listing yielded no page")),
        };

        let meta = self.listing_parser.listing_meta(&first_page.html);
        let name = meta
            .product_name
            .clone()
            .or_else(|| reference.name_hint.clone())
            .ok_or_else(|| HarvestError::UnusableListing {
                url: listing_url.clone(),
                source: ParsingError::listing_metadata_missing("product name", &listing_url),
            })?;

        let alias_of = ctx.claim(&name, &reference.url);
        let policy = if alias_of.is_some() {
            ActualizationPolicy::Exhaustive
        } else {
            self.crawling.policy
        };

        let stored = store.get(&name);
        let last_known = stored.and_then(Product::latest_fingerprint);
        let known: HashSet<Fingerprint> = match policy {
            ActualizationPolicy::Exhaustive => stored
                .map(|p| p.reviews.iter().map(Review::fingerprint).collect())
                .unwrap_or_default(),
            ActualizationPolicy::Fast => HashSet::new(),
        };

        debug!(
            "[ActualizationEngine] '{}' last known: {}",
            name,
            last_known
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "none".into())
        );

        let mut delta: Vec<Review> = Vec::new();
        let mut page = first_page;

        let state = loop {
            trace!("[ActualizationEngine] {:?} page {} of '{}'", ActualizationState::Comparing, page.number, name);
            if self.compare_page(&page, policy, last_known.as_ref(), &known, &mut delta, ctx) {
                break ActualizationState::MatchFound;
            }

            trace!("[ActualizationEngine] {:?} past page {} of '{}'", ActualizationState::Scanning, page.number, name);
            match walker.next_page().await {
                Some(Ok(next)) => page = next,
                Some(Err(e)) => {
                    warn!(
                        "[ActualizationEngine] '{}' chain broken after page {}, product skipped",
                        name,
                        walker.pages_fetched() - 1
                    );
                    return Err(e);
                }
                None => break ActualizationState::Exhausted,
            }
        };

        let category = if meta.breadcrumb.is_empty() {
            ctx.category().to_string()
        } else {
            meta.category_path()
        };
        let url = alias_of.clone().unwrap_or_else(|| reference.url.clone());
        let mut product = Product::new(name, category, url);
        product.reviews = delta;

        info!(
            "[ActualizationEngine] '{}': {} new reviews ({:?} after {} pages)",
            product.name,
            product.reviews.len(),
            state,
            walker.pages_fetched()
        );

        Ok(ProductDelta {
            product,
            claimed: meta.review_count.or(reference.review_count_hint),
            state,
            pages_fetched: walker.pages_fetched(),
            placement: match policy {
                ActualizationPolicy::Fast => ReviewPlacement::Prepend,
                ActualizationPolicy::Exhaustive => ReviewPlacement::ByDate,
            },
            alias_of,
        })
    }

    /// Parse one page into `delta`; true when the walk must stop here
    fn compare_page(
        &self,
        page: &Page,
        policy: ActualizationPolicy,
        last_known: Option<&Fingerprint>,
        known: &HashSet<Fingerprint>,
        delta: &mut Vec<Review>,
        ctx: &mut RunContext,
    ) -> bool {
        let context = ParseContext::new(page.url.clone(), self.today).with_page_number(page.number);

        for fragment in &page.fragments {
            let review = match self.review_parser.parse(fragment, &context) {
                Ok(review) => review,
                Err(e) => {
                    warn!("[ActualizationEngine] Skipping review on {}: {}", page.url, e);
                    ctx.stats.skipped_reviews += 1;
                    continue;
                }
            };

            match policy {
                ActualizationPolicy::Fast => {
                    if last_known.is_some_and(|fp| review.matches(fp)) {
                        return true;
                    }
                    delta.push(review);
                }
                ActualizationPolicy::Exhaustive => {
                    if !known.contains(&review.fingerprint()) {
                        delta.push(review);
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::corpus_store::CorpusLayout;
    use crate::test_utils::{FixtureFetcher, review_page};
    use tempfile::TempDir;

    const PRODUCT: &str = "https://mixer.example.cz/";
    const PAGE_1: &str = "https://mixer.example.cz/recenze/";
    const PAGE_2: &str = "https://mixer.example.cz/recenze/?f=2";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn engine(fetcher: &Arc<FixtureFetcher>, policy: ActualizationPolicy) -> ActualizationEngine {
        ActualizationEngine::new(
            fetcher.clone(),
            Arc::new(ListingParser::new().unwrap()),
            Arc::new(ReviewParser::new().unwrap()),
            CrawlingConfig::default(),
        )
        .with_today(today())
        .with_policy(policy)
    }

    fn two_page_listing(fetcher: &FixtureFetcher) {
        fetcher.insert(
            PAGE_1,
            review_page(
                "Mixér X",
                5,
                &[("A", "5. května 2021"), ("B", "4. května 2021"), ("C", "3. května 2021")],
                Some("?f=2"),
            ),
        );
        fetcher.insert(
            PAGE_2,
            review_page("Mixér X", 5, &[("D", "2. května 2021"), ("E", "1. května 2021")], None),
        );
    }

    async fn store_with(dir: &TempDir, authors: &[(&str, u32)]) -> CategoryStore {
        let layout = CorpusLayout::new(dir.path());
        let mut store = CategoryStore::open(&layout, "mixery").await.unwrap();
        if !authors.is_empty() {
            let mut product = Product::new("Mixér X", "Domácnost > Mixéry", PRODUCT);
            product.reviews = authors
                .iter()
                .map(|(author, day)| {
                    Review::new(
                        *author,
                        NaiveDate::from_ymd_opt(2021, 5, *day).unwrap().into(),
                    )
                })
                .collect();
            store.backup().await.unwrap();
            store.upsert(product).unwrap();
        }
        store
    }

    fn authors(delta: &ProductDelta) -> Vec<&str> {
        delta.product.reviews.iter().map(|r| r.author.as_str()).collect()
    }

    #[tokio::test]
    async fn test_stop_on_match() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        two_page_listing(&fetcher);
        let store = store_with(&dir, &[("C", 3), ("D", 2), ("E", 1)]).await;
        let mut ctx = RunContext::new("mixery");

        let delta = engine(&fetcher, ActualizationPolicy::Fast)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap();

        assert_eq!(delta.state, ActualizationState::MatchFound);
        assert_eq!(authors(&delta), ["A", "B"]);
        assert_eq!(delta.pages_fetched, 1);
        assert!(!fetcher.was_fetched(PAGE_2));
    }

    #[tokio::test]
    async fn test_new_product_walks_every_page() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        two_page_listing(&fetcher);
        let store = store_with(&dir, &[]).await;
        let mut ctx = RunContext::new("mixery");

        let delta = engine(&fetcher, ActualizationPolicy::Fast)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap();

        assert_eq!(delta.state, ActualizationState::Exhausted);
        assert_eq!(authors(&delta), ["A", "B", "C", "D", "E"]);
        assert_eq!(delta.claimed, Some(5));
        assert_eq!(delta.product.category, "Domácnost > Mixéry");
    }

    #[tokio::test]
    async fn test_exhaustive_keeps_only_unknown_reviews() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        two_page_listing(&fetcher);
        // "B" is stored but the newest stored review ("A") sits above it, so
        // the fast policy would stop at once
        let store = store_with(&dir, &[("A", 5), ("B", 4)]).await;
        let mut ctx = RunContext::new("mixery");

        let delta = engine(&fetcher, ActualizationPolicy::Exhaustive)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap();

        assert_eq!(delta.state, ActualizationState::Exhausted);
        assert_eq!(authors(&delta), ["C", "D", "E"]);
        assert!(fetcher.was_fetched(PAGE_2));
        assert_eq!(delta.placement, ReviewPlacement::ByDate);
    }

    #[tokio::test]
    async fn test_alias_url_contributes_only_unknown_reviews() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        two_page_listing(&fetcher);
        fetcher.insert(
            "https://mixer-alias.example.cz/recenze/",
            review_page("Mixér X", 2, &[("Z", "6. května 2021"), ("A", "5. května 2021")], None),
        );
        let store = store_with(&dir, &[("A", 5), ("B", 4), ("C", 3), ("D", 2), ("E", 1)]).await;
        let mut ctx = RunContext::new("mixery");
        let engine = engine(&fetcher, ActualizationPolicy::Fast);

        let first = engine
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap();
        assert!(first.alias_of.is_none());
        assert!(first.is_empty());

        let alias = engine
            .actualize_product(
                &ProductReference::from_url("https://mixer-alias.example.cz/"),
                &store,
                &mut ctx,
            )
            .await
            .unwrap();

        assert_eq!(alias.alias_of.as_deref(), Some(PRODUCT));
        assert_eq!(alias.product.url, PRODUCT);
        assert_eq!(alias.placement, ReviewPlacement::ByDate);
        assert_eq!(authors(&alias), ["Z"]);
        assert_eq!(ctx.stats.identity_collisions, 1);
        assert_eq!(ctx.stats.skipped_products, 0);
        assert_eq!(ctx.products_visited(), 1);
    }

    #[test]
    fn test_claim_returns_first_url_on_collision() {
        let mut ctx = RunContext::new("mixery");

        assert_eq!(ctx.claim("Mixér X", PRODUCT), None);
        assert_eq!(
            ctx.claim("Mixér X", "https://mixer-alias.example.cz/").as_deref(),
            Some(PRODUCT)
        );
        assert_eq!(ctx.stats.identity_collisions, 1);
    }

    #[tokio::test]
    async fn test_broken_chain_skips_product() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        two_page_listing(&fetcher);
        fetcher.remove(PAGE_2);
        let store = store_with(&dir, &[]).await;
        let mut ctx = RunContext::new("mixery");

        let err = engine(&fetcher, ActualizationPolicy::Fast)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::FetchFailure { status: Some(404), .. }));
        ctx.record_skip(&err);
        assert_eq!(ctx.stats.failed_fetches, 1);
        assert_eq!(ctx.stats.skipped_products, 1);
    }

    #[tokio::test]
    async fn test_malformed_reviews_are_skipped() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            PAGE_1,
            review_page("Mixér X", 2, &[("A", "5. května 2021"), ("B", "kdysi")], None),
        );
        let store = store_with(&dir, &[]).await;
        let mut ctx = RunContext::new("mixery");

        let delta = engine(&fetcher, ActualizationPolicy::Fast)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap();

        assert_eq!(authors(&delta), ["A"]);
        assert_eq!(ctx.stats.skipped_reviews, 1);
    }

    #[tokio::test]
    async fn test_missing_product_name_is_unusable() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(PAGE_1, "<html><body><p>maintenance</p></body></html>".into());
        let store = store_with(&dir, &[]).await;
        let mut ctx = RunContext::new("mixery");

        let err = engine(&fetcher, ActualizationPolicy::Fast)
            .actualize_product(&ProductReference::from_url(PRODUCT), &store, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::UnusableListing { .. }));
        assert_eq!(ctx.products_visited(), 0);
    }
}
