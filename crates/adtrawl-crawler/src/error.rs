use thiserror::Error;

/// Failures reported by a [`crate::Driver`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("could not connect to driver at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u128 },

    #[error("element is no longer attached to the page")]
    StaleElement,

    #[error("driver command failed: {0}")]
    Command(String),

    /// The crawl was cancelled while waiting to retry.
    #[error("cancelled before {what} could be retried")]
    Cancelled { what: String },
}

impl DriverError {
    /// Connection, navigation and timeout failures may clear up on a retry;
    /// stale handles and rejected commands will not.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DriverError::Connection { .. }
                | DriverError::Navigation { .. }
                | DriverError::Timeout { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailureReason {
    /// The item text had no non-empty first line.
    EmptyName,
    /// The item's text or markers could not be read from the page.
    Unreadable,
}

/// A single listing item could not be turned into a record. Skipped, never
/// fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("extraction failed for item {item_index}: {reason:?}")]
pub struct ExtractionFailure {
    pub item_index: usize,
    pub reason: ExtractionFailureReason,
}

/// Enrichment of one record stopped early. The record is kept with whatever
/// was collected before the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailVisitSoftFailure {
    #[error("could not read the listing URL before visiting: {0}")]
    OriginUnknown(DriverError),

    #[error("listing item is no longer on the page")]
    ItemMissing,

    #[error("click on listing item failed: {0}")]
    Click(DriverError),

    #[error("page did not navigate after click")]
    NoNavigation,

    #[error("landed on {url}, which is not a detail page")]
    NotADetailPage { url: String },

    #[error("collecting sub-page links failed: {0}")]
    SubLinks(DriverError),
}

/// The driver could not be returned to the listing page after a visit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("navigation lost: could not return to {origin_url} (back: {back_error}; reload: {reload_error})")]
pub struct NavigationLost {
    pub origin_url: String,
    pub back_error: String,
    pub reload_error: String,
}

/// The listing could not be moved to the wanted page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationFailure {
    #[error("clicking the next control failed: {0}")]
    Click(DriverError),

    #[error("listing did not change within {timeout_ms}ms after advancing")]
    Stalled { timeout_ms: u128 },

    #[error("listing did not render: {0}")]
    ListingNotRendered(DriverError),

    #[error("no usable next control on page {page}")]
    NoNextControl { page: u32 },
}

/// Errors that prevent a crawl from being constructed at all.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid site profile: {0}")]
    InvalidProfile(#[from] regex::Error),

    #[error("invalid start URL: {0}")]
    InvalidStartUrl(#[from] url::ParseError),
}
