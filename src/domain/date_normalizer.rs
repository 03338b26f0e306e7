//! Date normalization for review timestamps
//!
//! The review site prints dates in Czech genitive form (`2. března 2020`),
//! sometimes with a qualifier prefix (`Přidáno: ...`), non-breaking spaces, or
//! relative expressions (`včera`, `před 3 hodinami`). Everything is reduced to
//! one canonical, locale-independent form: `"2. March 2020"`.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Markers for "yesterday"
const YESTERDAY_MARKERS: &[&str] = &["včera", "yesterday"];

/// Markers for "some hours/minutes ago"; the source hides the exact day
const TIME_AGO_MARKERS: &[&str] = &["před", " ago"];

/// Genitive Czech month names, followed by nominative forms and the canonical
/// English names so already-normalized dates normalize to themselves.
const MONTHS: &[(&str, u32)] = &[
    ("ledna", 1),
    ("února", 2),
    ("března", 3),
    ("dubna", 4),
    ("května", 5),
    ("června", 6),
    ("července", 7),
    ("srpna", 8),
    ("září", 9),
    ("října", 10),
    ("listopadu", 11),
    ("prosince", 12),
    ("leden", 1),
    ("únor", 2),
    ("březen", 3),
    ("duben", 4),
    ("květen", 5),
    ("červen", 6),
    ("červenec", 7),
    ("srpen", 8),
    ("říjen", 10),
    ("listopad", 11),
    ("prosinec", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const CANONICAL_FORMAT: &str = "%-d. %B %Y";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unparsable date: '{raw}'")]
pub struct UnparsableDate {
    pub raw: String,
}

impl UnparsableDate {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

/// A calendar day in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedDate(NaiveDate);

impl NormalizedDate {
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Parse the canonical `"<day>. <Month> <year>"` representation
    pub fn parse_canonical(text: &str) -> Result<Self, UnparsableDate> {
        parse_triplet(text.trim()).ok_or_else(|| UnparsableDate::new(text))
    }
}

impl From<NaiveDate> for NormalizedDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl Serialize for NormalizedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NormalizedDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_canonical(&text).map_err(serde::de::Error::custom)
    }
}

/// Canonicalize a raw date expression relative to `today`.
///
/// Rules are applied in order: non-breaking-space cleanup, qualifier prefix
/// removal (text up to the first colon), "yesterday" marker, "time ago"
/// marker, and finally the `day month year` triplet.
pub fn normalize(raw_date: &str, today: NaiveDate) -> Result<NormalizedDate, UnparsableDate> {
    let cleaned = raw_date.replace('\u{a0}', " ").replace("&nbsp;", " ");
    let text = match cleaned.split_once(':') {
        Some((_, rest)) => rest,
        None => cleaned.as_str(),
    };
    let lowered = text.trim().to_lowercase();

    if YESTERDAY_MARKERS.iter().any(|m| lowered.contains(m)) {
        return today
            .checked_sub_signed(Duration::days(1))
            .map(NormalizedDate)
            .ok_or_else(|| UnparsableDate::new(raw_date));
    }

    // The leading space in " ago" needs the untrimmed form
    let padded = format!(" {lowered}");
    if TIME_AGO_MARKERS.iter().any(|m| padded.contains(m)) {
        return Ok(NormalizedDate(today));
    }

    parse_triplet(&lowered).ok_or_else(|| UnparsableDate::new(raw_date))
}

fn parse_triplet(text: &str) -> Option<NormalizedDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = tokens.as_slice() else {
        return None;
    };

    // "02." -> 2
    let day: u32 = day.trim_end_matches('.').parse().ok()?;
    let month = month_number(month)?;
    let year: i32 = year.trim_end_matches('.').parse().ok()?;
    if !(1000..=9999).contains(&year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day).map(NormalizedDate)
}

fn month_number(token: &str) -> Option<u32> {
    let lowered = token.to_lowercase();
    if let Some(numeric) = lowered.strip_suffix('.') {
        return numeric.parse().ok().filter(|m| (1..=12).contains(m));
    }
    MONTHS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, number)| *number)
}
