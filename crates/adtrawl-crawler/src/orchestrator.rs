//! The crawl state machine.
//!
//! ```text
//! Listing(n) --item admitted--> VisitingItem(n, i) --restored--> Listing(n)
//!     |                                  |--reloaded, paged back to n--> Listing(n)
//!     |                                  '--navigation lost--> Done(NavigationLost)
//!     '--items exhausted--> Paginating(n) --advanced--> Listing(n + 1)
//!                                '--cap / no next / stalled / cancelled--> Done(..)
//! ```
//!
//! One session drives one driver strictly sequentially. Every exit path,
//! fatal or not, produces a [`CrawlReport`] with the records collected so
//! far, and the driver is always shut down.

use std::future::Future;

use adtrawl_core::CrawlConfig;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::dedup::Admission;
use crate::detail::{DetailVisitor, Restoration, VisitOutcome};
use crate::driver::Driver;
use crate::error::{CrawlError, DriverError, ExtractionFailure};
use crate::extract::{snapshot_item, RawItem, RecordExtractor};
use crate::pagination::{NextControl, PaginationController};
use crate::rate_limit::{load_with_backoff, retry_with_backoff};
use crate::session::{CrawlReport, CrawlSession, CrawlState, DoneReason, FailureKind};
use crate::site::SiteProfile;
use crate::wait::WaitPolicy;

/// Runs crawl sessions for one [`CrawlConfig`] against one [`SiteProfile`].
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: CrawlConfig,
    profile: SiteProfile,
    extractor: RecordExtractor,
    policy: WaitPolicy,
    start_url: String,
}

impl Orchestrator {
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the profile's count units do not form a valid
    /// pattern or the start URL cannot be built.
    pub fn new(config: CrawlConfig, profile: SiteProfile) -> Result<Self, CrawlError> {
        let extractor = RecordExtractor::new(&profile)?;
        let start_url = profile.search_url(&config.start_query, &config.region)?;
        let policy = WaitPolicy::new(config.wait_timeout, config.poll_interval);
        Ok(Self {
            config,
            profile,
            extractor,
            policy,
            start_url,
        })
    }

    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Connects a driver with `connect`, retrying transient failures, then
    /// runs the crawl on it. A session that cannot connect ends in
    /// [`DoneReason::SetupFailed`] with no records.
    pub async fn crawl<D, C, Fut>(&self, mut connect: C, cancel: &CancellationToken) -> CrawlReport
    where
        D: Driver,
        C: FnMut() -> Fut,
        Fut: Future<Output = Result<D, DriverError>>,
    {
        let session = CrawlSession::new(&self.config.start_query, &self.config.region);
        let span = self.span(&session);

        async move {
            if cancel.is_cancelled() {
                return self.finish(session, DoneReason::Cancelled);
            }
            let connected = retry_with_backoff(
                "connect",
                self.config.setup_max_retries,
                self.config.setup_backoff_base_secs,
                cancel,
                &mut connect,
            )
            .await;
            match connected {
                Ok(driver) => self.drive_and_shutdown(driver, session, cancel).await,
                Err(DriverError::Cancelled { .. }) => self.finish(session, DoneReason::Cancelled),
                Err(error) => {
                    tracing::error!(error = %error, "could not start a browser session");
                    self.finish(session, DoneReason::SetupFailed)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the crawl on an already connected driver and shuts it down.
    pub async fn run<D: Driver>(&self, driver: D, cancel: &CancellationToken) -> CrawlReport {
        let session = CrawlSession::new(&self.config.start_query, &self.config.region);
        let span = self.span(&session);
        self.drive_and_shutdown(driver, session, cancel)
            .instrument(span)
            .await
    }

    fn span(&self, session: &CrawlSession) -> tracing::Span {
        tracing::info_span!(
            "crawl_session",
            session_id = %session.id(),
            query = %self.config.start_query,
            region = %self.config.region,
        )
    }

    async fn drive_and_shutdown<D: Driver>(
        &self,
        mut driver: D,
        mut session: CrawlSession,
        cancel: &CancellationToken,
    ) -> CrawlReport {
        let reason = self.drive(&mut driver, &mut session, cancel).await;
        if let Err(error) = driver.shutdown().await {
            tracing::warn!(error = %error, "browser shutdown failed");
        }
        self.finish(session, reason)
    }

    fn finish(&self, session: CrawlSession, reason: DoneReason) -> CrawlReport {
        let report = session.finish(reason);
        tracing::info!(
            reason = %report.reason,
            pages = report.pages_visited,
            records = report.records.len(),
            failures = report.failures.total(),
            start_url = %self.start_url,
            "crawl session finished"
        );
        report
    }

    async fn drive<D: Driver>(
        &self,
        driver: &mut D,
        session: &mut CrawlSession,
        cancel: &CancellationToken,
    ) -> DoneReason {
        if cancel.is_cancelled() {
            return DoneReason::Cancelled;
        }
        match load_with_backoff(
            driver,
            &self.start_url,
            self.config.setup_max_retries,
            self.config.setup_backoff_base_secs,
            cancel,
        )
        .await
        {
            Ok(()) => {}
            Err(DriverError::Cancelled { .. }) => return DoneReason::Cancelled,
            Err(error) => {
                tracing::error!(url = %self.start_url, error = %error, "start page unreachable");
                return DoneReason::SetupFailed;
            }
        }
        tracing::info!(url = %self.start_url, "crawl started");

        let pagination = PaginationController::new(&self.profile, self.policy);
        loop {
            let page = session.page_index();
            if let Err(reason) = self.process_listing(driver, session, page, cancel).await {
                return reason;
            }

            session.transition(CrawlState::Paginating { page });
            if cancel.is_cancelled() {
                return DoneReason::Cancelled;
            }
            if self.config.page_limit_reached(page) {
                tracing::info!(page, "page limit reached");
                return DoneReason::PageLimitReached;
            }
            let control = match pagination.has_next(driver).await {
                NextControl::Enabled(control) => control,
                NextControl::Disabled | NextControl::Absent => {
                    tracing::info!(page, "no further pages");
                    return DoneReason::EndOfResults;
                }
            };
            if let Err(error) = pagination.advance(driver, &control).await {
                session.record_failure(FailureKind::Pagination);
                tracing::warn!(page, error = %error, "pagination stalled, treating as end of results");
                return DoneReason::PaginationStalled;
            }
            let next = session.next_page();
            tracing::debug!(page = next, "advanced to next page");
        }
    }

    /// Processes every item of listing page `page`. `Err` carries the reason
    /// the session must stop.
    async fn process_listing<D: Driver>(
        &self,
        driver: &mut D,
        session: &mut CrawlSession,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<(), DoneReason> {
        session.transition(CrawlState::Listing { page });
        let snapshots = self.snapshot_listing(driver).await;
        let admitted_before = session.results().len();

        let visitor = DetailVisitor::new(&self.profile, self.policy, self.config.probe_sub_page);
        let pagination = PaginationController::new(&self.profile, self.policy);
        for (item, snapshot) in snapshots.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DoneReason::Cancelled);
            }

            let extracted = snapshot.and_then(|raw| self.extractor.extract(&raw, Utc::now()));
            let mut record = match extracted {
                Ok(record) => record,
                Err(failure) => {
                    session.record_failure(FailureKind::Extraction);
                    tracing::warn!(page, item, reason = ?failure.reason, "listing item skipped");
                    continue;
                }
            };
            if session.admit(&record) == Admission::Rejected {
                continue;
            }

            if self.config.visit_detail_pages {
                session.transition(CrawlState::VisitingItem { page, item });
                let visit = match visitor.visit(driver, &mut record, item).await {
                    Ok(visit) => visit,
                    Err(lost) => {
                        session.record_failure(FailureKind::NavigationLost);
                        tracing::error!(page, item, error = %lost, "listing unreachable, stopping");
                        session.push(record);
                        return Err(DoneReason::NavigationLost);
                    }
                };
                if matches!(visit.outcome, VisitOutcome::Soft(_)) {
                    session.record_failure(FailureKind::DetailVisit);
                }
                if visit.restoration == Restoration::Reloaded && page > 1 {
                    if let Err(error) = pagination.seek(driver, page).await {
                        session.record_failure(FailureKind::NavigationLost);
                        tracing::error!(page, item, error = %error, "could not page back after reload, stopping");
                        session.push(record);
                        return Err(DoneReason::NavigationLost);
                    }
                    tracing::info!(page, item, "paged back after reload");
                }
                session.transition(CrawlState::Listing { page });
            }
            session.push(record);
        }

        tracing::info!(
            page,
            admitted = session.results().len() - admitted_before,
            total = session.results().len(),
            "listing page processed"
        );
        Ok(())
    }

    /// Reads every listing item in DOM order. An unrendered listing is an
    /// empty page.
    async fn snapshot_listing<D: Driver>(
        &self,
        driver: &mut D,
    ) -> Vec<Result<RawItem, ExtractionFailure>> {
        if let Err(error) = driver
            .wait_for_selector(&self.profile.listing_container, &self.policy)
            .await
        {
            tracing::warn!(error = %error, "listing did not render");
            return Vec::new();
        }
        let handles = match driver
            .wait_for_selector(&self.profile.listing_item, &self.policy)
            .await
        {
            Ok(handles) => handles,
            Err(error) => {
                tracing::info!(error = %error, "listing has no items");
                return Vec::new();
            }
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for (index, handle) in handles.iter().enumerate() {
            snapshots.push(snapshot_item(handle, index, &self.profile).await);
        }
        snapshots
    }
}
