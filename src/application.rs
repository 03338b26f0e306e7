//! Application layer
//!
//! Orchestrates the infrastructure pieces into actualization and crawl runs.

pub mod actualization;
pub mod harvester;


pub use actualization::{ActualizationEngine, ActualizationState, ProductDelta, RunContext};
pub use harvester::{CategoryJob, CategoryOutcome, Harvester, ProductSource, RunReport};
