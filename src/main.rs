//! review-harvest command line
//!
//! Exit codes: 0 on completion, 1 when the run cannot start, 2 when a
//! category hit a store write failure.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};

use review_harvest_lib::application::{Harvester, RunReport};
use review_harvest_lib::infrastructure::config::{ActualizationPolicy, AppConfig, ConfigManager};
use review_harvest_lib::infrastructure::corpus_store::CorpusLayout;
use review_harvest_lib::infrastructure::http_client::HttpClient;
use review_harvest_lib::infrastructure::logging::init_logging_with_config;

#[derive(Parser)]
#[command(name = "review-harvest")]
#[command(about = "Keep a product review corpus in sync with a paginated review site")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["actualize", "crawl", "aspect"])))]
struct Cli {
    /// Fetch reviews newer than the stored ones for every known category
    #[arg(long)]
    actualize: bool,

    /// Discover products from the category table, then actualize them
    #[arg(long)]
    crawl: bool,

    /// Aspect extraction (not supported by this build)
    #[arg(long)]
    aspect: bool,

    /// Corpus directory; overrides the configured one
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Configuration file; defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Categories processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Walk every review page instead of stopping at the first known review
    #[arg(long)]
    exhaustive: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(Some(report)) => {
            for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
                eprintln!(
                    "category '{}' failed: {}",
                    outcome.category,
                    outcome.error.as_deref().unwrap_or_default()
                );
            }
            println!("{}", report.stats);
            if report.has_store_failures() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<Option<RunReport>> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    apply_overrides(&mut config, &cli);

    init_logging_with_config(&config.logging)?;
    info!("[Main] review-harvest {}", env!("CARGO_PKG_VERSION"));

    if cli.aspect {
        warn!("[Main] Aspect extraction is not supported, nothing to do");
        eprintln!("--aspect is not supported by this build");
        return Ok(None);
    }

    let corpus_dir = config
        .corpus_dir
        .clone()
        .context("No corpus directory: pass --path or set corpus_dir in the configuration")?;
    if !corpus_dir.is_dir() {
        bail!("Corpus directory {} does not exist", corpus_dir.display());
    }

    let fetcher = Arc::new(HttpClient::new(config.http.clone())?);
    let harvester = Harvester::new(&config, CorpusLayout::new(&corpus_dir), fetcher)?;

    let jobs = if cli.crawl {
        harvester.crawl_jobs().await?
    } else {
        harvester.actualize_jobs().await?
    };
    if jobs.is_empty() {
        warn!("[Main] No categories found in {}", corpus_dir.display());
    }

    let report = harvester.run(jobs).await;
    info!(
        "[Main] Finished: {} products, {} new reviews, {} failed categories",
        report.stats.products_count, report.stats.new_reviews, report.stats.categories_failed
    );
    Ok(Some(report))
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(path) = &cli.path {
        config.corpus_dir = Some(path.clone());
    }
    if let Some(workers) = cli.workers {
        config.crawling.workers = workers;
    }
    if cli.exhaustive {
        config.crawling.policy = ActualizationPolicy::Exhaustive;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
}
