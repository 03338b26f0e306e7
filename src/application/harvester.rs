//! Category runs and the worker pool
//!
//! A category run opens the category's store, takes the backup, actualizes
//! every product sequentially and commits. Categories run in parallel on a
//! bounded pool; a failing category never cancels its siblings.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::application::actualization::{ActualizationEngine, ProductDelta, RunContext};
use crate::domain::errors::{HarvestError, HarvestResult};
use crate::domain::product::{Product, ProductReference};
use crate::domain::services::DocumentFetcher;
use crate::domain::statistics::{Statistics, reachable};
use crate::infrastructure::category_discoverer::CategoryDiscoverer;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::corpus_store::{CategoryStore, ControlLogEntry, CorpusLayout};
use crate::infrastructure::parsing::{ListingParser, ReviewParser};

/// Where a category run gets its products from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductSource {
    /// Seed file URLs followed by the products already in the store
    Seeds,
    /// Taxonomy discovery below a category root URL
    Discover { root_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryJob {
    pub category: String,
    pub source: ProductSource,
}

#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: String,
    pub stats: Statistics,
    /// Error that ended the run early, if any
    pub error: Option<String>,
    pub store_failure: bool,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: Statistics,
    pub outcomes: Vec<CategoryOutcome>,
}

impl RunReport {
    pub fn has_store_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.store_failure)
    }
}

#[derive(Clone)]
pub struct Harvester {
    layout: CorpusLayout,
    engine: Arc<ActualizationEngine>,
    discoverer: Arc<CategoryDiscoverer>,
    workers: usize,
}

impl Harvester {
    pub fn new(config: &AppConfig, layout: CorpusLayout, fetcher: Arc<dyn DocumentFetcher>) -> Result<Self> {
        let listing_parser = Arc::new(
            ListingParser::with_config(&config.selectors).context("Invalid listing selectors")?,
        );
        let review_parser = Arc::new(
            ReviewParser::with_config(&config.selectors.review).context("Invalid review selectors")?,
        );

        let engine = ActualizationEngine::new(
            fetcher.clone(),
            listing_parser.clone(),
            review_parser,
            config.crawling.clone(),
        );
        let discoverer = CategoryDiscoverer::new(
            fetcher,
            listing_parser,
            config.crawling.max_discovery_depth,
        )
        .with_max_pages(config.crawling.max_pages_per_listing);

        Ok(Self::from_parts(layout, engine, discoverer, config.crawling.workers))
    }

    pub fn from_parts(
        layout: CorpusLayout,
        engine: ActualizationEngine,
        discoverer: CategoryDiscoverer,
        workers: usize,
    ) -> Self {
        Self {
            layout,
            engine: Arc::new(engine),
            discoverer: Arc::new(discoverer),
            workers: workers.max(1),
        }
    }

    pub fn layout(&self) -> &CorpusLayout {
        &self.layout
    }

    /// One seed-driven job per category found in the corpus directory
    pub async fn actualize_jobs(&self) -> Result<Vec<CategoryJob>> {
        let categories = self
            .layout
            .known_categories()
            .await
            .context("Failed to list corpus categories")?;
        Ok(categories
            .into_iter()
            .map(|category| CategoryJob {
                category,
                source: ProductSource::Seeds,
            })
            .collect())
    }

    /// One discovery job per row of the category table
    pub async fn crawl_jobs(&self) -> Result<Vec<CategoryJob>> {
        let rows = self
            .layout
            .read_category_table()
            .await
            .context("Failed to read category table")?;
        Ok(rows
            .into_iter()
            .map(|(category, root_url)| CategoryJob {
                category,
                source: ProductSource::Discover { root_url },
            })
            .collect())
    }

    /// Run every job on the bounded pool and fold the results
    pub async fn run(&self, jobs: Vec<CategoryJob>) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        info!(
            "[Harvester] Running {} categories with {} workers ({:?} policy)",
            jobs.len(),
            self.workers,
            self.engine.policy()
        );

        let tasks: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let harvester = self.clone();
                let semaphore = semaphore.clone();
                let category = job.category.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    harvester.run_category(job).await
                });
                (category, handle)
            })
            .collect();

        let (categories, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut report = RunReport::default();
        for (category, result) in categories.into_iter().zip(results) {
            let outcome = result.unwrap_or_else(|e| {
                error!("[Harvester] Category '{}' task failed: {}", category, e);
                let mut stats = Statistics::new();
                stats.categories_failed = 1;
                CategoryOutcome {
                    category,
                    stats,
                    error: Some(e.to_string()),
                    store_failure: false,
                }
            });
            report.stats.merge(&outcome.stats);
            report.outcomes.push(outcome);
        }
        report
    }

    /// Run one category to completion; errors end up in the outcome
    pub async fn run_category(&self, job: CategoryJob) -> CategoryOutcome {
        let mut ctx = RunContext::new(job.category.clone());
        let result = self.process_category(&job, &mut ctx).await;

        let (error, store_failure) = match result {
            Ok(()) => (None, false),
            Err(e) => {
                error!("[Harvester] Category '{}' aborted: {}", job.category, e);
                ctx.stats.categories_failed += 1;
                (Some(e.to_string()), e.is_category_fatal())
            }
        };

        info!(
            "[Harvester] Category '{}' done: {} products, {} new reviews",
            job.category, ctx.stats.products_count, ctx.stats.new_reviews
        );
        CategoryOutcome {
            category: job.category,
            stats: ctx.stats,
            error,
            store_failure,
        }
    }

    async fn process_category(&self, job: &CategoryJob, ctx: &mut RunContext) -> HarvestResult<()> {
        let mut store = CategoryStore::open(&self.layout, &job.category).await?;
        store.backup().await?;

        let references = match &job.source {
            ProductSource::Seeds => self.seed_references(&job.category, &store, ctx).await?,
            ProductSource::Discover { root_url } => {
                let discovery = self.discoverer.discover(root_url).await;
                ctx.stats.failed_fetches += discovery.failed_fetches;
                ctx.stats.empty_products += discovery.skipped_empty;
                discovery.products
            }
        };
        info!(
            "[Harvester] Category '{}': {} products to actualize",
            job.category,
            references.len()
        );

        for reference in &references {
            match self.engine.actualize_product(reference, &store, ctx).await {
                Ok(delta) => self.persist(&mut store, delta, ctx).await?,
                Err(e) => {
                    warn!("[Harvester] Skipping {}: {}", reference.url, e);
                    ctx.record_skip(&e);
                }
            }
        }

        store.commit().await?;
        Ok(())
    }

    async fn persist(
        &self,
        store: &mut CategoryStore,
        delta: ProductDelta,
        ctx: &mut RunContext,
    ) -> HarvestResult<()> {
        let ProductDelta {
            product,
            claimed,
            placement,
            alias_of,
            ..
        } = delta;
        let claimed = u64::from(claimed.unwrap_or(0));

        let mut fresh = Product::new(product.name.clone(), product.category.clone(), product.url.clone());
        fresh.reviews = store.merge(product, placement)?;
        if !fresh.reviews.is_empty() {
            store.append_actualized_log(&fresh).await?;
        }
        let added = fresh.reviews.len() as u64;
        ctx.stats.new_reviews += added;

        if let Some(first_url) = alias_of {
            debug!(
                "[Harvester] {} new reviews for '{}' merged into {}",
                added, fresh.name, first_url
            );
            return Ok(());
        }

        let stored = store.get(&fresh.name).map_or(0, |p| p.reviews.len());
        store
            .append_control_log(&ControlLogEntry {
                product: fresh.name,
                claimed,
                reachable: reachable(claimed, self.engine.display_cap()),
                stored: stored as u64,
                new: added,
            })
            .await?;

        ctx.stats.add_product(claimed, self.engine.display_cap());
        Ok(())
    }

    /// Seed file URLs, then URLs of stored products, without duplicates
    async fn seed_references(
        &self,
        category: &str,
        store: &CategoryStore,
        ctx: &mut RunContext,
    ) -> HarvestResult<Vec<ProductReference>> {
        let seeds = self.layout.read_seed_urls(category).await?;
        let stored = store
            .products()
            .iter()
            .map(|p| p.url.clone())
            .filter(|url| !url.is_empty());

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for line in seeds.into_iter().chain(stored) {
            if let Err(e) = Url::parse(&line) {
                let err = HarvestError::InvalidSeed {
                    line,
                    reason: e.to_string(),
                };
                warn!("[Harvester] {}", err);
                ctx.record_skip(&err);
                continue;
            }
            if seen.insert(line.clone()) {
                references.push(ProductReference::from_url(line));
            }
        }
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixtureFetcher, review_page};
    use tempfile::TempDir;

    fn harvester(fetcher: &Arc<FixtureFetcher>, dir: &TempDir) -> Harvester {
        Harvester::new(&AppConfig::default(), CorpusLayout::new(dir.path()), fetcher.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_seed_references_dedup_and_validate() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        let harvester = harvester(&fetcher, &dir);
        std::fs::write(
            harvester.layout().seeds("mixery"),
            "https://a.example.cz/\nnot a url\nhttps://a.example.cz/\n",
        )
        .unwrap();

        let store = CategoryStore::open(harvester.layout(), "mixery").await.unwrap();
        let mut ctx = RunContext::new("mixery");
        let references = harvester
            .seed_references("mixery", &store, &mut ctx)
            .await
            .unwrap();

        assert_eq!(references, [ProductReference::from_url("https://a.example.cz/")]);
        assert_eq!(ctx.stats.skipped_products, 1);
    }

    #[tokio::test]
    async fn test_category_run_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            "https://a.example.cz/recenze/",
            review_page("A", 2, &[("X", "2. května 2021"), ("Y", "1. května 2021")], None),
        );
        let harvester = harvester(&fetcher, &dir);
        std::fs::write(
            harvester.layout().seeds("mixery"),
            "https://a.example.cz/\nhttps://missing.example.cz/\n",
        )
        .unwrap();

        let report = harvester.run(harvester.actualize_jobs().await.unwrap()).await;

        assert!(!report.has_store_failures());
        assert_eq!(report.stats.products_count, 1);
        assert_eq!(report.stats.new_reviews, 2);
        assert_eq!(report.stats.failed_fetches, 1);
        assert_eq!(report.stats.skipped_products, 1);

        let layout = harvester.layout();
        let control = std::fs::read_to_string(layout.control_log("mixery")).unwrap();
        assert_eq!(control, "A\t2\t2\t2\t2\n");
        let audit = std::fs::read_to_string(layout.actualized("mixery")).unwrap();
        assert_eq!(audit.lines().count(), 1);
        assert!(layout.backup("mixery").exists());
        assert!(layout.canonical("mixery").exists());
    }

    #[tokio::test]
    async fn test_corrupt_store_fails_only_its_category() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FixtureFetcher::new());
        fetcher.insert(
            "https://a.example.cz/recenze/",
            review_page("A", 1, &[("X", "2. května 2021")], None),
        );
        let harvester = harvester(&fetcher, &dir);
        let layout = harvester.layout();
        std::fs::write(layout.canonical("broken"), "garbage\n").unwrap();
        std::fs::write(layout.seeds("mixery"), "https://a.example.cz/\n").unwrap();

        let report = harvester.run(harvester.actualize_jobs().await.unwrap()).await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.has_store_failures());
        assert_eq!(report.stats.categories_failed, 1);
        assert_eq!(report.stats.new_reviews, 1);
        assert_eq!(std::fs::read_to_string(layout.canonical("broken")).unwrap(), "garbage\n");
    }
}
