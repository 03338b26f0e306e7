//! Error taxonomy for a harvest run
//!
//! Everything except `StoreWriteFailure` is recovered at the smallest
//! enclosing scope (review, page or product) and only counted.

use thiserror::Error;

use crate::infrastructure::corpus_store::StoreError;
use crate::infrastructure::parsing_error::ParsingError;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure {
        url: String,
        reason: String,
        status: Option<u16>,
    },

    #[error("Malformed review: {0}")]
    MalformedReview(#[from] ParsingError),

    #[error("Unusable listing {url}: {source}")]
    UnusableListing {
        url: String,
        #[source]
        source: ParsingError,
    },

    #[error("Product '{name}' was already visited via {first_url}")]
    IdentityCollision { name: String, first_url: String },

    #[error("Store write failed: {0}")]
    StoreWriteFailure(#[from] StoreError),

    #[error("Invalid seed '{line}': {reason}")]
    InvalidSeed { line: String, reason: String },
}

impl HarvestError {
    pub fn fetch_failure(url: &str, reason: impl Into<String>) -> Self {
        Self::FetchFailure {
            url: url.to_string(),
            reason: reason.into(),
            status: None,
        }
    }

    pub fn http_status(url: &str, status: u16) -> Self {
        Self::FetchFailure {
            url: url.to_string(),
            reason: format!("HTTP status {status}"),
            status: Some(status),
        }
    }

    /// Whether the error must abort the enclosing category run
    pub fn is_category_fatal(&self) -> bool {
        matches!(self, Self::StoreWriteFailure(_))
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
