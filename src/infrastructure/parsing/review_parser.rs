//! Review fragment parser
//!
//! Extracts one review from the HTML of a single review element. Extraction
//! is pure; a missing author or date yields [`ParsingError::MalformedReview`]
//! and the caller skips just that review.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;

use super::{
    ContextualParser, ParseContext, ParsingError, ParsingResult, all_texts, any_match,
    clean_text, compile_selectors, first_text,
};
use crate::domain::date_normalizer::normalize;
use crate::domain::review::{Recommendation, Review};
use crate::infrastructure::parsing::config::ReviewSelectors;

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})\s*%").expect("valid regex"));
static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d\s]*").expect("valid regex"));

/// Parser for individual review fragments
pub struct ReviewParser {
    author: Vec<Selector>,
    date: Vec<Selector>,
    rating: Vec<Selector>,
    recommend_yes: Vec<Selector>,
    recommend_no: Vec<Selector>,
    pros: Vec<Selector>,
    cons: Vec<Selector>,
    summary: Vec<Selector>,
}

impl ReviewParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ReviewSelectors::default())
    }

    pub fn with_config(selectors: &ReviewSelectors) -> ParsingResult<Self> {
        Ok(Self {
            author: compile_selectors(&selectors.author)?,
            date: compile_selectors(&selectors.date)?,
            rating: compile_selectors(&selectors.rating)?,
            recommend_yes: compile_selectors(&selectors.recommend_yes)?,
            recommend_no: compile_selectors(&selectors.recommend_no)?,
            pros: compile_selectors(&selectors.pros)?,
            cons: compile_selectors(&selectors.cons)?,
            summary: compile_selectors(&selectors.summary)?,
        })
    }

    /// Parse the outer HTML of one review element
    pub fn parse(&self, fragment: &str, context: &ParseContext) -> ParsingResult<Review> {
        let html = Html::parse_fragment(fragment);
        self.parse_with_context(&html, context)
    }

    fn extract_rating(&self, text: &str) -> Option<String> {
        let cleaned = clean_text(text);
        PERCENT
            .captures(&cleaned)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("{}%", m.as_str()))
    }
}

impl ContextualParser for ReviewParser {
    type Output = Review;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Review> {
        let root = html.root_element();

        let author = first_text(&root, &self.author)
            .ok_or_else(|| ParsingError::required_field_missing("author", None))?;

        let raw_date = first_text(&root, &self.date)
            .ok_or_else(|| ParsingError::required_field_missing("date", Some(author.as_str())))?;
        let date = normalize(&raw_date, context.today)?;

        let rating = first_text(&root, &self.rating).and_then(|text| self.extract_rating(&text));

        let recommends = if any_match(&root, &self.recommend_yes) {
            Recommendation::Yes
        } else if any_match(&root, &self.recommend_no) {
            Recommendation::No
        } else {
            Recommendation::Unknown
        };

        let review = Review {
            author,
            date,
            rating,
            recommends,
            pros: all_texts(&root, &self.pros),
            cons: all_texts(&root, &self.cons),
            summary: first_text(&root, &self.summary).unwrap_or_default(),
        };

        trace!(
            "[ReviewParser] {} on page {} ({})",
            review.fingerprint(),
            context.page_number,
            context.page_url
        );
        Ok(review)
    }
}

/// Extract a review count from text such as `"1 234 recenzí"`
pub fn parse_review_count(text: &str) -> Option<u32> {
    let cleaned = clean_text(text);
    COUNT.find(&cleaned).and_then(|m| {
        m.as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FULL_REVIEW: &str = r#"
        <li class="c-post">
            <div class="c-post__author">Jana Nováková</div>
            <time class="c-post__publish-time">2.&nbsp;března 2020</time>
            <span class="c-rating-widget__value">90&nbsp;%</span>
            <div class="c-post__recommend--yes">Doporučuje</div>
            <ul class="c-attributes-list--pros"><li>tichý chod</li><li>  výkon </li></ul>
            <ul class="c-attributes-list--cons"><li>cena</li></ul>
            <div class="c-post__summary"><p>Spokojenost.</p><p>Druhý odstavec.</p></div>
        </li>"#;

    fn context() -> ParseContext {
        ParseContext::new(
            "https://mixer.example.cz/recenze/",
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        )
    }

    #[test]
    fn test_parser_creation() {
        assert!(ReviewParser::new().is_ok());
    }

    #[test]
    fn test_full_review() {
        let parser = ReviewParser::new().unwrap();
        let review = parser.parse(FULL_REVIEW, &context()).unwrap();

        assert_eq!(review.author, "Jana Nováková");
        assert_eq!(review.date.to_string(), "2. March 2020");
        assert_eq!(review.rating.as_deref(), Some("90%"));
        assert_eq!(review.recommends, Recommendation::Yes);
        assert_eq!(review.pros, vec!["tichý chod", "výkon"]);
        assert_eq!(review.cons, vec!["cena"]);
        assert_eq!(review.summary, "Spokojenost.");
    }

    #[test]
    fn test_optional_fields_absent() {
        let parser = ReviewParser::new().unwrap();
        let review = parser
            .parse(
                r#"<li class="c-post"><span class="c-post__author">Petr</span>
                   <time>včera</time></li>"#,
                &context(),
            )
            .unwrap();

        assert_eq!(review.date.to_string(), "9. March 2024");
        assert!(review.rating.is_none());
        assert_eq!(review.recommends, Recommendation::Unknown);
        assert!(review.pros.is_empty());
        assert!(review.cons.is_empty());
        assert!(review.summary.is_empty());
    }

    #[test]
    fn test_recommend_no_marker() {
        let parser = ReviewParser::new().unwrap();
        let review = parser
            .parse(
                r#"<li class="c-post"><span class="c-post__author">Petr</span>
                   <time>1. května 2021</time><div class="c-post__recommend--no"></div></li>"#,
                &context(),
            )
            .unwrap();
        assert_eq!(review.recommends, Recommendation::No);
    }

    #[test]
    fn test_missing_author_is_malformed() {
        let parser = ReviewParser::new().unwrap();
        let err = parser
            .parse(r#"<li class="c-post"><time>1. května 2021</time></li>"#, &context())
            .unwrap_err();
        assert!(matches!(err, ParsingError::MalformedReview { ref field, .. } if field == "author"));
        assert!(err.is_review_scoped());
    }

    #[test]
    fn test_bad_date_is_review_scoped() {
        let parser = ReviewParser::new().unwrap();
        let err = parser
            .parse(
                r#"<li class="c-post"><span class="c-post__author">Petr</span><time>někdy</time></li>"#,
                &context(),
            )
            .unwrap_err();
        assert!(matches!(err, ParsingError::UnparsableDate(_)));
        assert!(err.is_review_scoped());
    }

    #[test]
    fn test_review_count_text() {
        assert_eq!(parse_review_count("1\u{a0}234 recenzí"), Some(1234));
        assert_eq!(parse_review_count("(87 hodnocení)"), Some(87));
        assert_eq!(parse_review_count("žádné recenze"), None);
    }
}
