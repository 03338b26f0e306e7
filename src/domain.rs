//! Domain module - Core entities and value objects
//!
//! Reviews, products, their identity rules, run statistics and the
//! date canonicalization every fingerprint depends on.

pub mod date_normalizer;
pub mod errors;
pub mod product;
pub mod review;
pub mod services;
pub mod statistics;

pub use date_normalizer::{NormalizedDate, UnparsableDate, normalize};
pub use errors::{HarvestError, HarvestResult};
pub use product::{Product, ProductReference, ReviewPlacement};
pub use review::{Fingerprint, Recommendation, Review};
pub use services::DocumentFetcher;
pub use statistics::Statistics;
