//! review-harvest: incremental product-review crawler
//!
//! Keeps a file-based review corpus in sync with a paginated review site,
//! fetching only what is newer than the newest stored review of each product.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{Harvester, RunReport};
pub use domain::{HarvestError, HarvestResult, NormalizedDate, Product, Review, Statistics, normalize};
pub use infrastructure::{AppConfig, ConfigManager, CorpusLayout};
