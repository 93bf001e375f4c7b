//! Listing item to [`Record`] extraction.
//!
//! Reading an item off the page ([`snapshot_item`]) is the only step that
//! touches the driver; turning the snapshot into a record
//! ([`RecordExtractor::extract`]) is pure.

use adtrawl_core::Record;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::driver::ItemHandle;
use crate::error::{ExtractionFailure, ExtractionFailureReason};
use crate::site::SiteProfile;

/// What was read from one listing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// Position of the item on its listing page, in DOM order.
    pub index: usize,
    pub text: String,
    pub verified_marker_present: bool,
}

/// Reads the text and verification marker of a listing item.
///
/// # Errors
///
/// Returns [`ExtractionFailureReason::Unreadable`] if either read fails.
pub async fn snapshot_item<H: ItemHandle>(
    handle: &H,
    index: usize,
    profile: &SiteProfile,
) -> Result<RawItem, ExtractionFailure> {
    let unreadable = |error: crate::error::DriverError| {
        tracing::debug!(item = index, error = %error, "listing item unreadable");
        ExtractionFailure {
            item_index: index,
            reason: ExtractionFailureReason::Unreadable,
        }
    };
    let text = handle.text().await.map_err(unreadable)?;
    let verified_marker_present = handle
        .has_descendant(&profile.verified_marker)
        .await
        .map_err(unreadable)?;
    Ok(RawItem {
        index,
        text,
        verified_marker_present,
    })
}

/// First trimmed non-empty line of an item's text, the advertiser name.
#[must_use]
pub fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Parses raw listing items into records.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    location_prefix: String,
    /// `None` when the profile has no count units.
    count_token: Option<Regex>,
}

impl RecordExtractor {
    /// Builds an extractor for the profile's count units and location prefix.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the count token pattern cannot be built.
    pub fn new(profile: &SiteProfile) -> Result<Self, regex::Error> {
        let mut units: Vec<&str> = profile
            .count_units
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect();
        // Longest first so "ads" is preferred over "ad".
        units.sort_by_key(|u| std::cmp::Reverse(u.len()));
        let alternation = units
            .iter()
            .map(|u| regex::escape(u))
            .collect::<Vec<_>>()
            .join("|");

        let count_token = if alternation.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)\d[\d,.]*\s*[km]?\s*(?:{alternation})\b"
            ))?)
        };

        Ok(Self {
            location_prefix: profile.location_prefix.clone(),
            count_token,
        })
    }

    /// Turns one snapshot into a record discovered at `now`.
    ///
    /// The first non-empty line is the name. Of the remaining lines, the
    /// first one holding a count token becomes the count text and the first
    /// one starting with the location prefix becomes the location text. A
    /// line is only ever tested for location if it is not a count line.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionFailureReason::EmptyName`] when the text has no
    /// non-empty line.
    pub fn extract(&self, raw: &RawItem, now: DateTime<Utc>) -> Result<Record, ExtractionFailure> {
        let mut lines = raw.text.lines().map(str::trim).filter(|l| !l.is_empty());

        let Some(name) = lines.next() else {
            return Err(ExtractionFailure {
                item_index: raw.index,
                reason: ExtractionFailureReason::EmptyName,
            });
        };

        let mut count_text: Option<&str> = None;
        let mut location_line: Option<&str> = None;

        for line in lines {
            if self.is_count_line(line) {
                count_text.get_or_insert(line);
            } else if let Some(rest) = line.strip_prefix(self.location_prefix.as_str()) {
                location_line.get_or_insert(rest);
            }
        }

        let location_text = location_line
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned);

        Ok(Record::new(name, now)
            .with_count_text(count_text.map(str::to_owned))
            .with_location_text(location_text)
            .with_verified(raw.verified_marker_present))
    }

    fn is_count_line(&self, line: &str) -> bool {
        self.count_token.as_ref().is_some_and(|re| re.is_match(line))
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
