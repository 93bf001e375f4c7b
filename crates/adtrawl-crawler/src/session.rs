//! Per-run crawl state and the report handed to exporters.

use std::fmt;

use adtrawl_core::Record;
use uuid::Uuid;

use crate::dedup::{Admission, IdentityDeduplicator};

/// Why a crawl session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoneReason {
    EndOfResults,
    PageLimitReached,
    PaginationStalled,
    NavigationLost,
    Cancelled,
    SetupFailed,
}

impl DoneReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoneReason::EndOfResults => "end_of_results",
            DoneReason::PageLimitReached => "page_limit_reached",
            DoneReason::PaginationStalled => "pagination_stalled",
            DoneReason::NavigationLost => "navigation_lost",
            DoneReason::Cancelled => "cancelled",
            DoneReason::SetupFailed => "setup_failed",
        }
    }

    /// Whether the session ended before exhausting what it was asked to
    /// crawl.
    #[must_use]
    pub fn is_abnormal(self) -> bool {
        matches!(
            self,
            DoneReason::NavigationLost | DoneReason::Cancelled | DoneReason::SetupFailed
        )
    }
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Processing the listing page with the given 1-based index.
    Listing { page: u32 },
    VisitingItem { page: u32, item: usize },
    Paginating { page: u32 },
    Done(DoneReason),
}

/// Non-fatal events counted over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Extraction,
    Duplicate,
    DetailVisit,
    Pagination,
    NavigationLost,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Extraction,
        FailureKind::Duplicate,
        FailureKind::DetailVisit,
        FailureKind::Pagination,
        FailureKind::NavigationLost,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Extraction => "extraction",
            FailureKind::Duplicate => "duplicates",
            FailureKind::DetailVisit => "detail_visit",
            FailureKind::Pagination => "pagination",
            FailureKind::NavigationLost => "navigation_lost",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounters {
    extraction: u32,
    duplicates: u32,
    detail_visit: u32,
    pagination: u32,
    navigation_lost: u32,
}

impl FailureCounters {
    pub fn record(&mut self, kind: FailureKind) {
        let slot = match kind {
            FailureKind::Extraction => &mut self.extraction,
            FailureKind::Duplicate => &mut self.duplicates,
            FailureKind::DetailVisit => &mut self.detail_visit,
            FailureKind::Pagination => &mut self.pagination,
            FailureKind::NavigationLost => &mut self.navigation_lost,
        };
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub fn count(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::Extraction => self.extraction,
            FailureKind::Duplicate => self.duplicates,
            FailureKind::DetailVisit => self.detail_visit,
            FailureKind::Pagination => self.pagination,
            FailureKind::NavigationLost => self.navigation_lost,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        FailureKind::ALL
            .iter()
            .map(|kind| self.count(*kind))
            .fold(0, u32::saturating_add)
    }
}

/// Mutable state of one crawl run. Owned and mutated by the orchestrator
/// only.
#[derive(Debug)]
pub struct CrawlSession {
    id: Uuid,
    query: String,
    region: String,
    seen: IdentityDeduplicator,
    page_index: u32,
    results: Vec<Record>,
    failures: FailureCounters,
    state: CrawlState,
}

impl CrawlSession {
    #[must_use]
    pub fn new(query: &str, region: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_owned(),
            region: region.to_owned(),
            seen: IdentityDeduplicator::new(),
            page_index: 1,
            results: Vec::new(),
            failures: FailureCounters::default(),
            state: CrawlState::Listing { page: 1 },
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    #[must_use]
    pub fn state(&self) -> CrawlState {
        self.state
    }

    #[must_use]
    pub fn results(&self) -> &[Record] {
        &self.results
    }

    #[must_use]
    pub fn failures(&self) -> &FailureCounters {
        &self.failures
    }

    /// Runs the deduplicator; counts rejections.
    pub fn admit(&mut self, record: &Record) -> Admission {
        let admission = self.seen.admit(record);
        if admission == Admission::Rejected {
            self.failures.record(FailureKind::Duplicate);
        }
        admission
    }

    pub fn push(&mut self, record: Record) {
        self.results.push(record);
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.failures.record(kind);
    }

    pub fn transition(&mut self, next: CrawlState) {
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// Moves to the next listing page. The page index only ever grows.
    pub fn next_page(&mut self) -> u32 {
        self.page_index = self.page_index.saturating_add(1);
        self.page_index
    }

    /// Ends the session. `pages_visited` is 0 when setup never reached the
    /// first listing page.
    #[must_use]
    pub fn finish(mut self, reason: DoneReason) -> CrawlReport {
        self.transition(CrawlState::Done(reason));
        let pages_visited = if reason == DoneReason::SetupFailed {
            0
        } else {
            self.page_index
        };
        CrawlReport {
            session_id: self.id,
            query: self.query,
            region: self.region,
            pages_visited,
            reason,
            records: self.results,
            failures: self.failures,
        }
    }
}

/// The read-only outcome of one session. Always carries whatever records
/// were collected, whatever the reason.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub session_id: Uuid,
    pub query: String,
    pub region: String,
    pub pages_visited: u32,
    pub reason: DoneReason,
    pub records: Vec<Record>,
    pub failures: FailureCounters,
}

impl CrawlReport {
    #[must_use]
    pub fn verified_count(&self) -> usize {
        self.records.iter().filter(|r| r.verified()).count()
    }

    #[must_use]
    pub fn with_detail_url_count(&self) -> usize {
        self.records.iter().filter(|r| r.detail_url().is_some()).count()
    }

    #[must_use]
    pub fn sub_url_count(&self) -> usize {
        self.records.iter().map(|r| r.sub_urls().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn new_session_starts_on_page_one() {
        let session = CrawlSession::new("a", "US");
        assert_eq!(session.page_index(), 1);
        assert_eq!(session.state(), CrawlState::Listing { page: 1 });
        assert!(session.results().is_empty());
    }

    #[test]
    fn sessions_get_distinct_ids() {
        assert_ne!(CrawlSession::new("a", "US").id(), CrawlSession::new("a", "US").id());
    }

    #[test]
    fn duplicate_admission_is_counted() {
        let mut session = CrawlSession::new("a", "US");
        let record = Record::new("Acme", Utc::now());
        assert_eq!(session.admit(&record), Admission::Accepted);
        assert_eq!(session.admit(&record), Admission::Rejected);
        assert_eq!(session.failures().count(FailureKind::Duplicate), 1);
    }

    #[test]
    fn counters_are_per_kind() {
        let mut counters = FailureCounters::default();
        counters.record(FailureKind::Extraction);
        counters.record(FailureKind::Extraction);
        counters.record(FailureKind::Pagination);
        assert_eq!(counters.count(FailureKind::Extraction), 2);
        assert_eq!(counters.count(FailureKind::Pagination), 1);
        assert_eq!(counters.count(FailureKind::NavigationLost), 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn finish_hands_off_results() {
        let mut session = CrawlSession::new("shoes", "DE");
        session.push(Record::new("Acme", Utc::now()).with_verified(true));
        session.next_page();
        let id = session.id();
        let report = session.finish(DoneReason::EndOfResults);
        assert_eq!(report.session_id, id);
        assert_eq!(report.query, "shoes");
        assert_eq!(report.region, "DE");
        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.verified_count(), 1);
    }

    #[test]
    fn setup_failure_reports_no_pages() {
        let report = CrawlSession::new("a", "US").finish(DoneReason::SetupFailed);
        assert_eq!(report.pages_visited, 0);
        assert!(report.reason.is_abnormal());
    }

    #[test]
    fn reason_labels() {
        assert_eq!(DoneReason::PageLimitReached.to_string(), "page_limit_reached");
        assert_eq!(FailureKind::Duplicate.as_str(), "duplicates");
    }
}
