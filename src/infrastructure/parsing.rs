//! HTML parsing infrastructure
//!
//! Review fragments and listing pages are parsed with `scraper`. Every field
//! has a list of fallback selectors; the first selector that matches wins.

pub mod config;
pub mod context;
pub mod error;
pub mod listing_parser;
pub mod review_parser;

pub use config::{CategorySelectors, ListingSelectors, ReviewSelectors, SelectorConfig};
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use listing_parser::{ListingMeta, ListingParser};
pub use review_parser::{ReviewParser, parse_review_count};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}

/// Compile selector strings, skipping invalid ones.
///
/// Fails only when none of them compile.
pub fn compile_selectors(selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("[Parser] Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() {
        return Err(ParsingError::invalid_selector(
            &selector_strings.join(", "),
            if errors.is_empty() {
                "no selectors configured".to_string()
            } else {
                errors.join(", ")
            },
        ));
    }

    if !errors.is_empty() {
        debug!("[Parser] Some selectors failed to compile: {}", errors.join(", "));
    }

    Ok(selectors)
}

/// Collapse whitespace and non-breaking-space artifacts
pub fn clean_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text of the first non-empty element matched by any selector
pub fn first_text(root: &ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        root.select(selector)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    })
}

/// Texts of every element matched by the first selector that matches at all
pub fn all_texts(root: &ElementRef<'_>, selectors: &[Selector]) -> Vec<String> {
    for selector in selectors {
        let texts: Vec<String> = root
            .select(selector)
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
            .collect();
        if !texts.is_empty() {
            return texts;
        }
    }
    Vec::new()
}

/// Whether any selector matches anything under `root`
pub fn any_match(root: &ElementRef<'_>, selectors: &[Selector]) -> bool {
    selectors.iter().any(|selector| root.select(selector).next().is_some())
}

/// First `href` matched by any selector, resolved against `base_url`
pub fn first_link(root: &ElementRef<'_>, selectors: &[Selector], base_url: &str) -> Option<String> {
    selectors.iter().find_map(|selector| {
        root.select(selector)
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| resolve_url(href, base_url))
    })
}

/// Resolve a possibly relative link; fragments-only and javascript links are ignored
pub fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}
