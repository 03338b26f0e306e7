//! Review entity and its identity fingerprint
//!
//! The source site does not expose a stable review id, so a review is
//! identified by `(author, normalized date)`. Two reviews written by the same
//! author on the same day collapse into one.

use serde::{Deserialize, Serialize};

use crate::domain::date_normalizer::NormalizedDate;

/// Whether the reviewer recommends the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Yes,
    No,
    #[default]
    Unknown,
}

/// A single product review as extracted from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub date: NormalizedDate,
    /// Percentage text such as `"90%"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default)]
    pub recommends: Recommendation,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// De-duplication identity of a review
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub author: String,
    pub date: NormalizedDate,
}

impl Fingerprint {
    pub fn new(author: impl Into<String>, date: NormalizedDate) -> Self {
        Self {
            author: author.into(),
            date,
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.author, self.date)
    }
}

impl Review {
    /// Create a review with only the identity fields set
    pub fn new(author: impl Into<String>, date: NormalizedDate) -> Self {
        Self {
            author: author.into(),
            date,
            rating: None,
            recommends: Recommendation::Unknown,
            pros: Vec::new(),
            cons: Vec::new(),
            summary: String::new(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.author.clone(), self.date)
    }

    /// Identity check without building a fingerprint
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        self.date == fingerprint.date && self.author == fingerprint.author
    }
}
