//! Run statistics
//!
//! A plain accumulator. `merge` is commutative and associative so category
//! workers can aggregate independently and be folded together at the end.

use serde::{Deserialize, Serialize};

/// Number of reviews the site will display for a single product
pub const DISPLAY_CAP: u64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Review count claimed by the source
    pub reviews_count: u64,
    /// Reviews actually retrievable given the display cap
    pub reviews_reachable: u64,
    pub products_count: u64,
    /// Reviews added to the store this run
    pub new_reviews: u64,
    pub skipped_products: u64,
    pub skipped_reviews: u64,
    /// Discovered products whose listing advertises no reviews
    pub empty_products: u64,
    pub identity_collisions: u64,
    pub failed_fetches: u64,
    pub categories_failed: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reviews_count: u64, reviews_reachable: u64, products_count: u64) {
        self.reviews_count += reviews_count;
        self.reviews_reachable += reviews_reachable;
        self.products_count += products_count;
    }

    /// Account one product whose listing claims `claimed` reviews
    pub fn add_product(&mut self, claimed: u64, display_cap: u64) {
        self.add(claimed, reachable(claimed, display_cap), 1);
    }

    pub fn merge(&mut self, other: &Statistics) {
        self.add(other.reviews_count, other.reviews_reachable, other.products_count);
        self.new_reviews += other.new_reviews;
        self.skipped_products += other.skipped_products;
        self.skipped_reviews += other.skipped_reviews;
        self.empty_products += other.empty_products;
        self.identity_collisions += other.identity_collisions;
        self.failed_fetches += other.failed_fetches;
        self.categories_failed += other.categories_failed;
    }

    pub fn merged(mut self, other: &Statistics) -> Self {
        self.merge(other);
        self
    }
}

/// Reviews reachable for a product claiming `claimed` reviews
pub fn reachable(claimed: u64, display_cap: u64) -> u64 {
    claimed.min(display_cap)
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "products:            {}", self.products_count)?;
        writeln!(f, "reviews (claimed):   {}", self.reviews_count)?;
        writeln!(f, "reviews (reachable): {}", self.reviews_reachable)?;
        writeln!(f, "new reviews:         {}", self.new_reviews)?;
        writeln!(f, "skipped products:    {}", self.skipped_products)?;
        writeln!(f, "skipped reviews:     {}", self.skipped_reviews)?;
        writeln!(f, "empty products:      {}", self.empty_products)?;
        writeln!(f, "identity collisions: {}", self.identity_collisions)?;
        writeln!(f, "failed fetches:      {}", self.failed_fetches)?;
        write!(f, "failed categories:   {}", self.categories_failed)
    }
}
