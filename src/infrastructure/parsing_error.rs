//! Parsing error types for review and listing extraction
//!
//! Every variant is recoverable at review or page scope: the caller skips
//! the offending fragment and keeps going.

use thiserror::Error;

use crate::domain::date_normalizer::UnparsableDate;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in review fragment")]
    MalformedReview {
        field: String,
        context: Option<String>,
    },

    #[error(transparent)]
    UnparsableDate(#[from] UnparsableDate),

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Listing metadata missing: {what} on {url}")]
    ListingMetadataMissing { what: String, url: String },
}

impl ParsingError {
    /// Create a missing-field error with optional context (usually the author)
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::MalformedReview {
            field: field.to_string(),
            context: context.map(ToString::to_string),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn listing_metadata_missing(what: &str, url: &str) -> Self {
        Self::ListingMetadataMissing {
            what: what.to_string(),
            url: url.to_string(),
        }
    }

    /// Errors that only affect a single review
    pub fn is_review_scoped(&self) -> bool {
        matches!(self, Self::MalformedReview { .. } | Self::UnparsableDate(_))
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
