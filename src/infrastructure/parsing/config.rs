//! Parsing configuration for HTML extraction
//!
//! Centralized CSS selectors. Each field holds fallbacks tried in order, so
//! a markup change on the site usually means editing the config file rather
//! than the code.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// All selectors used by the crawler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub review: ReviewSelectors,
    pub listing: ListingSelectors,
    pub category: CategorySelectors,
}

/// Selectors inside one review fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSelectors {
    pub author: Vec<String>,
    pub date: Vec<String>,
    pub rating: Vec<String>,
    pub recommend_yes: Vec<String>,
    pub recommend_no: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub summary: Vec<String>,
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            author: strings(&[".c-post__author", ".review-author", "[itemprop='author']"]),
            date: strings(&[".c-post__publish-time", "time", ".review-date"]),
            rating: strings(&[".c-rating-widget__value", ".review-rating"]),
            recommend_yes: strings(&[".c-post__recommend--yes", ".recommend-yes"]),
            recommend_no: strings(&[".c-post__recommend--no", ".recommend-no"]),
            pros: strings(&[".c-attributes-list--pros li", ".plus li"]),
            cons: strings(&[".c-attributes-list--cons li", ".minus li"]),
            summary: strings(&[".c-post__summary p", ".review-body p"]),
        }
    }
}

/// Selectors on a product's review listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// One element per review
    pub review_item: Vec<String>,
    pub next_page: Vec<String>,
    pub product_name: Vec<String>,
    pub breadcrumb: Vec<String>,
    pub review_count: Vec<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            review_item: strings(&["li.c-post", ".c-box-list__item.c-post", ".review"]),
            next_page: strings(&["a.c-pagination__button--next", "a[rel='next']", ".next a"]),
            product_name: strings(&[".c-product-info__name", "h1"]),
            breadcrumb: strings(&[".c-breadcrumbs__item a", "nav.breadcrumbs a"]),
            review_count: strings(&[".c-review-count", ".c-product-info__reviews", ".review-count"]),
        }
    }
}

/// Selectors on category (taxonomy) pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySelectors {
    pub subcategory_link: Vec<String>,
    /// One element per product on a product listing
    pub product_item: Vec<String>,
    pub product_link: Vec<String>,
    pub product_name: Vec<String>,
    pub product_review_count: Vec<String>,
    pub next_page: Vec<String>,
}

impl Default for CategorySelectors {
    fn default() -> Self {
        Self {
            subcategory_link: strings(&["a.c-categories-list__link", ".subcategories a"]),
            product_item: strings(&[".c-product-list__item", "article.product"]),
            product_link: strings(&["a.c-product__link", "h3 a", "a"]),
            product_name: strings(&[".c-product__title", "h3"]),
            product_review_count: strings(&[".c-product__review-count", ".review-count"]),
            next_page: strings(&["a.c-pagination__button--next", "a[rel='next']", ".next a"]),
        }
    }
}
