//! The advertiser record produced by a crawl and its derived fields.
//!
//! `count` and `location` are never stored: they are recomputed from the raw
//! text every time they are read, so they cannot drift from their source.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// First number, an optional fraction, and an optional `K`/`M` magnitude that
/// is not the start of a longer word.
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)(?:\.(\d+))?(?:\s*([km])\b)?").expect("valid count regex")
});

/// One advertiser discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    identity: String,
    raw_count_text: Option<String>,
    raw_location_text: Option<String>,
    verified: bool,
    detail_url: Option<String>,
    sub_urls: BTreeSet<String>,
    discovered_at: DateTime<Utc>,
}

impl Record {
    /// Creates a record with the given identity. The identity is trimmed and
    /// cannot be changed afterwards.
    #[must_use]
    pub fn new(identity: &str, discovered_at: DateTime<Utc>) -> Self {
        Self {
            identity: identity.trim().to_owned(),
            raw_count_text: None,
            raw_location_text: None,
            verified: false,
            detail_url: None,
            sub_urls: BTreeSet::new(),
            discovered_at,
        }
    }

    #[must_use]
    pub fn with_count_text(mut self, raw: Option<String>) -> Self {
        self.raw_count_text = raw;
        self
    }

    #[must_use]
    pub fn with_location_text(mut self, raw: Option<String>) -> Self {
        self.raw_location_text = raw;
        self
    }

    #[must_use]
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn raw_count_text(&self) -> Option<&str> {
        self.raw_count_text.as_deref()
    }

    #[must_use]
    pub fn raw_location_text(&self) -> Option<&str> {
        self.raw_location_text.as_deref()
    }

    /// Ad count parsed from [`Self::raw_count_text`]; `0` when absent or
    /// unparseable.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.raw_count_text.as_deref().map_or(0, parse_count)
    }

    /// Location normalized from [`Self::raw_location_text`].
    #[must_use]
    pub fn location(&self) -> Option<String> {
        self.raw_location_text.as_deref().and_then(normalize_location)
    }

    #[must_use]
    pub fn verified(&self) -> bool {
        self.verified
    }

    #[must_use]
    pub fn detail_url(&self) -> Option<&str> {
        self.detail_url.as_deref()
    }

    pub fn set_detail_url(&mut self, url: String) {
        self.detail_url = Some(url);
    }

    /// Adds a sub-page URL. Returns `false` if it was already present.
    pub fn insert_sub_url(&mut self, url: String) -> bool {
        self.sub_urls.insert(url)
    }

    #[must_use]
    pub fn sub_urls(&self) -> &BTreeSet<String> {
        &self.sub_urls
    }

    #[must_use]
    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }
}

/// Flat, serializable view of a [`Record`] handed to export sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub identity: String,
    pub raw_count_text: Option<String>,
    pub count: u64,
    pub raw_location_text: Option<String>,
    pub location: Option<String>,
    pub verified: bool,
    pub detail_url: Option<String>,
    pub sub_url_count: usize,
    pub discovered_at: DateTime<Utc>,
}

impl From<&Record> for ExportRow {
    fn from(record: &Record) -> Self {
        Self {
            identity: record.identity.clone(),
            raw_count_text: record.raw_count_text.clone(),
            count: record.count(),
            raw_location_text: record.raw_location_text.clone(),
            location: record.location(),
            verified: record.verified,
            detail_url: record.detail_url.clone(),
            sub_url_count: record.sub_urls.len(),
            discovered_at: record.discovered_at,
        }
    }
}

/// Parses an ad-count string such as `"~63 ads"` into an integer.
///
/// Reads the first number in the text. Thousands separators (`1,234`) and a
/// trailing `K`/`M` magnitude (`~1.2K ads`) are understood. Returns `0` when no
/// number is present or it does not fit in a `u64`.
#[must_use]
pub fn parse_count(raw: &str) -> u64 {
    let Some(caps) = COUNT_RE.captures(raw) else {
        return 0;
    };
    let whole: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    let Ok(whole) = whole.parse::<u64>() else {
        return 0;
    };

    let multiplier: u64 = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => 1_000,
        Some(suffix) if suffix == "m" => 1_000_000,
        _ => return whole,
    };

    // Scale the fractional digits without going through floating point:
    // "1.25K" -> 1000 + 25 * 1000 / 100.
    let mut scaled_fraction: u64 = 0;
    if let Some(fraction) = caps.get(2).map(|m| m.as_str()) {
        let digits = fraction.len().min(6);
        let Ok(frac) = fraction[..digits].parse::<u64>() else {
            return 0;
        };
        let divisor = 10u64.pow(u32::try_from(digits).unwrap_or(6));
        scaled_fraction = frac.saturating_mul(multiplier) / divisor;
    }

    whole
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(scaled_fraction))
        .unwrap_or(0)
}

/// Trims a raw location and collapses inner whitespace. Returns `None` when
/// nothing is left.
#[must_use]
pub fn normalize_location(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
