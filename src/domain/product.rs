use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::review::{Fingerprint, Review};

/// A product and its reviews, newest first.
///
/// `name` is the dedup key: the site sometimes serves one product under two
/// URLs, and both must end up in a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub url: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl Product {
    pub fn new(name: impl Into<String>, category: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            url: url.into(),
            reviews: Vec::new(),
        }
    }

    /// Fingerprint of the most recent known review
    pub fn latest_fingerprint(&self) -> Option<Fingerprint> {
        self.reviews.first().map(Review::fingerprint)
    }

    /// Put fresher reviews in front of the existing ones.
    ///
    /// Reviews whose fingerprint is already present are dropped so a merge
    /// never duplicates content.
    pub fn prepend_reviews(&mut self, fresh: Vec<Review>) -> usize {
        self.merge_reviews(fresh, ReviewPlacement::Prepend).len()
    }

    /// Merge `fresh` (newest first) into the stored list and return the
    /// reviews that were actually added, in their incoming order.
    pub fn merge_reviews(&mut self, fresh: Vec<Review>, placement: ReviewPlacement) -> Vec<Review> {
        let mut seen: HashSet<Fingerprint> = self.reviews.iter().map(Review::fingerprint).collect();
        let added: Vec<Review> = fresh
            .into_iter()
            .filter(|r| seen.insert(r.fingerprint()))
            .collect();

        match placement {
            ReviewPlacement::Prepend => {
                let mut merged = added.clone();
                merged.append(&mut self.reviews);
                self.reviews = merged;
            }
            ReviewPlacement::ByDate => {
                for review in &added {
                    // Equal dates keep the stored review first
                    let at = self
                        .reviews
                        .iter()
                        .position(|r| r.date < review.date)
                        .unwrap_or(self.reviews.len());
                    self.reviews.insert(at, review.clone());
                }
            }
        }
        added
    }
}

/// Where merged reviews land in a product's newest-first list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewPlacement {
    /// Everything fresh is newer than the stored head
    #[default]
    Prepend,
    /// Fresh reviews may be older than the stored head and are slotted in by date
    ByDate,
}

/// Where a product comes from before its page has been fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReference {
    pub url: String,
    /// Display name seen on a listing, if discovery provided one
    pub name_hint: Option<String>,
    /// Review count advertised by a listing
    pub review_count_hint: Option<u32>,
}

impl ProductReference {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name_hint: None,
            review_count_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::date_normalizer::NormalizedDate;
    use chrono::NaiveDate;

    fn review(author: &str, day: u32) -> Review {
        Review::new(
            author,
            NormalizedDate::from(NaiveDate::from_ymd_opt(2021, 5, day).unwrap()),
        )
    }

    #[test]
    fn test_prepend_keeps_newest_first() {
        let mut product = Product::new("Mixér X", "Kuchyně", "https://mixer-x.example/");
        product.reviews = vec![review("B", 2), review("A", 1)];

        let added = product.prepend_reviews(vec![review("D", 4), review("C", 3)]);

        assert_eq!(added, 2);
        let authors: Vec<&str> = product.reviews.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, ["D", "C", "B", "A"]);
        assert_eq!(product.latest_fingerprint().unwrap().author, "D");
    }

    #[test]
    fn test_prepend_never_duplicates() {
        let mut product = Product::new("Mixér X", "Kuchyně", "https://mixer-x.example/");
        product.reviews = vec![review("B", 2), review("A", 1)];

        let added = product.prepend_reviews(vec![review("C", 3), review("C", 3), review("B", 2)]);

        assert_eq!(added, 1);
        assert_eq!(product.reviews.len(), 3);
    }

    #[test]
    fn test_merge_by_date_fills_gaps_in_place() {
        let mut product = Product::new("Mixér X", "Kuchyně", "https://mixer-x.example/");
        product.reviews = vec![review("A", 5), review("E", 1)];

        let added = product.merge_reviews(
            vec![review("A", 5), review("B", 4), review("C", 3), review("D", 2), review("E", 1)],
            ReviewPlacement::ByDate,
        );

        let added: Vec<&str> = added.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(added, ["B", "C", "D"]);
        let authors: Vec<&str> = product.reviews.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, ["A", "B", "C", "D", "E"]);
        assert_eq!(product.latest_fingerprint().unwrap().author, "A");
    }

    #[test]
    fn test_merge_by_date_puts_newer_reviews_on_top() {
        let mut product = Product::new("Mixér X", "Kuchyně", "https://mixer-x.example/");
        product.reviews = vec![review("B", 4), review("A", 3)];

        product.merge_reviews(vec![review("Z", 6), review("Y", 3)], ReviewPlacement::ByDate);

        let authors: Vec<&str> = product.reviews.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, ["Z", "B", "A", "Y"]);
    }

    #[test]
    fn test_empty_product_has_no_fingerprint() {
        let product = Product::new("Nový", "", "https://novy.example/");
        assert!(product.latest_fingerprint().is_none());
    }
}
