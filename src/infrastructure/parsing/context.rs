//! Parsing context for HTML extraction

use chrono::NaiveDate;

/// Context information for parsing one page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// URL of the page being parsed; relative links resolve against it
    pub page_url: String,

    /// 1-based position in the pagination chain
    pub page_number: u32,

    /// Reference day for relative dates ("včera", "před 2 hodinami")
    pub today: NaiveDate,
}

impl ParseContext {
    pub fn new(page_url: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            page_url: page_url.into(),
            page_number: 1,
            today,
        }
    }

    pub fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }
}
