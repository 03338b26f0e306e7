//! Test utilities
//!
//! An in-memory [`DocumentFetcher`] serving fixture pages, plus builders for
//! the review and category markup the default selectors expect.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{HarvestError, HarvestResult};
use crate::domain::services::DocumentFetcher;

/// Serves registered pages; unknown URLs fail with HTTP 404
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, String>>,
    fetched: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the page served for `url`
    pub fn insert(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    pub fn remove(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    /// Every URL requested so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        self.fetched.lock().unwrap().iter().any(|u| u == url)
    }

    pub fn clear_log(&self) {
        self.fetched.lock().unwrap().clear();
    }
}

#[async_trait]
impl DocumentFetcher for FixtureFetcher {
    async fn fetch_html(&self, url: &str) -> HarvestResult<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| HarvestError::http_status(url, 404))
    }
}

/// A product review listing page.
///
/// `reviews` are `(author, raw date)` pairs in page order.
pub fn review_page(
    product_name: &str,
    review_count: u32,
    reviews: &[(&str, &str)],
    next_href: Option<&str>,
) -> String {
    let items: String = reviews
        .iter()
        .map(|(author, date)| {
            format!(
                r#"<li class="c-post">
                     <span class="c-post__author">{author}</span>
                     <time class="c-post__publish-time">{date}</time>
                     <span class="c-rating-widget__value">80 %</span>
                     <ul class="c-attributes-list--pros"><li>plus {author}</li></ul>
                     <div class="c-post__summary"><p>Review by {author}</p></div>
                   </li>"#
            )
        })
        .collect();
    let next = next_href
        .map(|href| format!(r#"<a class="c-pagination__button--next" href="{href}">Další</a>"#))
        .unwrap_or_default();

    format!(
        r#"<!doctype html><html><body>
             <nav><span class="c-breadcrumbs__item"><a href="/">Domácnost</a></span>
                  <span class="c-breadcrumbs__item"><a href="/mixery/">Mixéry</a></span></nav>
             <h1 class="c-product-info__name">{product_name}</h1>
             <span class="c-review-count">{review_count} recenzí</span>
             <ul class="c-box-list">{items}</ul>
             {next}
           </body></html>"#
    )
}

/// A category page with subcategory links and product items.
///
/// `products` are `(url, name, review count)` triples.
pub fn category_page(
    subcategories: &[&str],
    products: &[(&str, &str, u32)],
    next_href: Option<&str>,
) -> String {
    let links: String = subcategories
        .iter()
        .map(|href| format!(r#"<a class="c-categories-list__link" href="{href}">sub</a>"#))
        .collect();
    let items: String = products
        .iter()
        .map(|(url, name, count)| {
            format!(
                r#"<div class="c-product-list__item">
                     <a class="c-product__link" href="{url}"><h3 class="c-product__title">{name}</h3></a>
                     <span class="c-product__review-count">{count} recenzí</span>
                   </div>"#
            )
        })
        .collect();
    let next = next_href
        .map(|href| format!(r#"<a class="c-pagination__button--next" href="{href}">Další</a>"#))
        .unwrap_or_default();

    format!(r#"<!doctype html><html><body>{links}{items}{next}</body></html>"#)
}
