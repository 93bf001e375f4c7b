//! Stateful, paginated crawling of an advertiser search listing.
//!
//! A crawl walks the listing page by page, turns each item into a
//! [`adtrawl_core::Record`], drops repeated identities, optionally visits
//! each advertiser's detail page for its URL and sub-page URLs, and ends with
//! a [`CrawlReport`]. The browser is abstracted behind [`Driver`].

pub mod dedup;
pub mod detail;
pub mod driver;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod pagination;
pub mod rate_limit;
pub mod session;
pub mod site;
pub mod wait;

pub use dedup::{Admission, IdentityDeduplicator};
pub use detail::{DetailVisitor, Restoration, Visit, VisitOutcome};
pub use driver::{Driver, ItemHandle, Paced, Selector};
#[cfg(feature = "webdriver")]
pub use driver::{BrowserOptions, WebDriverSession};
pub use error::{
    CrawlError, DetailVisitSoftFailure, DriverError, ExtractionFailure, ExtractionFailureReason,
    NavigationLost, PaginationFailure,
};
pub use extract::{snapshot_item, RawItem, RecordExtractor};
pub use orchestrator::Orchestrator;
pub use pagination::{NextControl, PaginationController};
pub use rate_limit::{load_with_backoff, retry_with_backoff};
pub use session::{CrawlReport, CrawlSession, CrawlState, DoneReason, FailureCounters, FailureKind};
pub use site::SiteProfile;
pub use wait::WaitPolicy;
