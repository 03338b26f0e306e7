//! Listing page parser
//!
//! Splits paginated pages into item fragments, finds the "next" link, and
//! reads page-level metadata (product name, breadcrumb, review count) and
//! category taxonomy links.

use scraper::{Html, Selector};
use tracing::debug;

use super::{
    ParsingResult, clean_text, compile_selectors, first_link, first_text, parse_review_count,
};
use crate::domain::product::ProductReference;
use crate::infrastructure::parsing::config::SelectorConfig;

/// What kind of items a paginated listing holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// A product's review listing; one fragment per review
    Reviews,
    /// A category's product listing; one fragment per product
    Products,
}

/// Fragments of one page plus the link to the next page
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub fragments: Vec<String>,
    pub next_url: Option<String>,
}

/// Page-level metadata of a product's review listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingMeta {
    pub product_name: Option<String>,
    pub breadcrumb: Vec<String>,
    pub review_count: Option<u32>,
}

impl ListingMeta {
    /// Breadcrumb rendered as a category path
    pub fn category_path(&self) -> String {
        self.breadcrumb.join(" > ")
    }
}

pub struct ListingParser {
    review_item: Vec<Selector>,
    review_next: Vec<Selector>,
    product_name: Vec<Selector>,
    breadcrumb: Vec<Selector>,
    review_count: Vec<Selector>,
    subcategory_link: Vec<Selector>,
    product_item: Vec<Selector>,
    product_link: Vec<Selector>,
    product_title: Vec<Selector>,
    product_review_count: Vec<Selector>,
    category_next: Vec<Selector>,
}

impl ListingParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&SelectorConfig::default())
    }

    pub fn with_config(config: &SelectorConfig) -> ParsingResult<Self> {
        Ok(Self {
            review_item: compile_selectors(&config.listing.review_item)?,
            review_next: compile_selectors(&config.listing.next_page)?,
            product_name: compile_selectors(&config.listing.product_name)?,
            breadcrumb: compile_selectors(&config.listing.breadcrumb)?,
            review_count: compile_selectors(&config.listing.review_count)?,
            subcategory_link: compile_selectors(&config.category.subcategory_link)?,
            product_item: compile_selectors(&config.category.product_item)?,
            product_link: compile_selectors(&config.category.product_link)?,
            product_title: compile_selectors(&config.category.product_name)?,
            product_review_count: compile_selectors(&config.category.product_review_count)?,
            category_next: compile_selectors(&config.category.next_page)?,
        })
    }

    /// Split a page into item fragments and resolve its "next" link
    pub fn split_page(&self, html: &str, page_url: &str, kind: ListingKind) -> PageContent {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let (items, next) = match kind {
            ListingKind::Reviews => (&self.review_item, &self.review_next),
            ListingKind::Products => (&self.product_item, &self.category_next),
        };

        // First selector that yields anything wins
        let fragments = items
            .iter()
            .map(|selector| root.select(selector).map(|el| el.html()).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let next_url = first_link(&root, next, page_url).filter(|url| url != page_url);

        debug!(
            "[ListingParser] {} fragments on {} (next: {})",
            fragments.len(),
            page_url,
            next_url.as_deref().unwrap_or("-")
        );

        PageContent {
            fragments,
            next_url,
        }
    }

    /// Product name, breadcrumb and advertised review count
    pub fn listing_meta(&self, html: &str) -> ListingMeta {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let breadcrumb = self
            .breadcrumb
            .iter()
            .map(|selector| {
                root.select(selector)
                    .map(|el| clean_text(&el.text().collect::<String>()))
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
            })
            .find(|crumbs| !crumbs.is_empty())
            .unwrap_or_default();

        ListingMeta {
            product_name: first_text(&root, &self.product_name),
            breadcrumb,
            review_count: first_text(&root, &self.review_count)
                .as_deref()
                .and_then(parse_review_count),
        }
    }

    /// Links to subcategories on a taxonomy page, deduplicated in page order
    pub fn subcategory_urls(&self, html: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let mut urls: Vec<String> = Vec::new();
        for selector in &self.subcategory_link {
            for href in root.select(selector).filter_map(|el| el.value().attr("href")) {
                if let Some(url) = super::resolve_url(href, page_url) {
                    if !urls.contains(&url) {
                        urls.push(url);
                    }
                }
            }
            if !urls.is_empty() {
                break;
            }
        }
        urls
    }

    /// Product link, name and review-count hint from one product fragment
    pub fn product_reference(&self, fragment: &str, page_url: &str) -> Option<ProductReference> {
        let html = Html::parse_fragment(fragment);
        let root = html.root_element();

        let url = first_link(&root, &self.product_link, page_url)?;
        Some(ProductReference {
            url,
            name_hint: first_text(&root, &self.product_title),
            review_count_hint: first_text(&root, &self.product_review_count)
                .as_deref()
                .and_then(parse_review_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW_PAGE: &str = r#"
        <html><body>
          <nav><span class="c-breadcrumbs__item"><a href="/">Elektronika</a></span>
               <span class="c-breadcrumbs__item"><a href="/mixery/">Mixéry</a></span></nav>
          <h1 class="c-product-info__name">Mixér X 500</h1>
          <span class="c-review-count">1&nbsp;204 recenzí</span>
          <ul>
            <li class="c-post"><span class="c-post__author">A</span></li>
            <li class="c-post"><span class="c-post__author">B</span></li>
          </ul>
          <a class="c-pagination__button--next" href="?f=2">Další</a>
        </body></html>"#;

    #[test]
    fn test_split_review_page() {
        let parser = ListingParser::new().unwrap();
        let content = parser.split_page(
            REVIEW_PAGE,
            "https://mixer-x.example.cz/recenze/",
            ListingKind::Reviews,
        );
        assert_eq!(content.fragments.len(), 2);
        assert!(content.fragments[0].contains(">A<"));
        assert_eq!(
            content.next_url.as_deref(),
            Some("https://mixer-x.example.cz/recenze/?f=2")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let parser = ListingParser::new().unwrap();
        let content = parser.split_page(
            "<html><body><li class='c-post'></li></body></html>",
            "https://mixer-x.example.cz/recenze/?f=3",
            ListingKind::Reviews,
        );
        assert!(content.next_url.is_none());
    }

    #[test]
    fn test_self_link_is_not_next() {
        let parser = ListingParser::new().unwrap();
        let content = parser.split_page(
            "<html><body><a rel='next' href='?f=3'>x</a></body></html>",
            "https://mixer-x.example.cz/recenze/?f=3",
            ListingKind::Reviews,
        );
        assert!(content.next_url.is_none());
    }

    #[test]
    fn test_listing_meta() {
        let parser = ListingParser::new().unwrap();
        let meta = parser.listing_meta(REVIEW_PAGE);
        assert_eq!(meta.product_name.as_deref(), Some("Mixér X 500"));
        assert_eq!(meta.category_path(), "Elektronika > Mixéry");
        assert_eq!(meta.review_count, Some(1204));
    }

    #[test]
    fn test_category_page() {
        let parser = ListingParser::new().unwrap();
        let html = r#"
            <html><body>
              <a class="c-categories-list__link" href="/mixery/">Mixéry</a>
              <a class="c-categories-list__link" href="/mixery/">Mixéry</a>
              <a class="c-categories-list__link" href="https://other.example.cz/topinkovace/">Topinkovače</a>
              <div class="c-product-list__item">
                <a class="c-product__link" href="https://mixer-x.example.cz/"><h3 class="c-product__title">Mixér X</h3></a>
                <span class="c-product__review-count">12 recenzí</span>
              </div>
            </body></html>"#;
        let base = "https://example.cz/elektronika/";

        let subcategories = parser.subcategory_urls(html, base);
        assert_eq!(
            subcategories,
            vec![
                "https://example.cz/mixery/".to_string(),
                "https://other.example.cz/topinkovace/".to_string()
            ]
        );

        let content = parser.split_page(html, base, ListingKind::Products);
        assert_eq!(content.fragments.len(), 1);
        let reference = parser.product_reference(&content.fragments[0], base).unwrap();
        assert_eq!(reference.url, "https://mixer-x.example.cz/");
        assert_eq!(reference.name_hint.as_deref(), Some("Mixér X"));
        assert_eq!(reference.review_count_hint, Some(12));
    }
}
