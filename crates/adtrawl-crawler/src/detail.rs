//! Detail page enrichment for admitted records.
//!
//! A visit clicks the listing item, reads what it can from the detail page
//! and always returns the driver to the listing URL it started from. Only a
//! failed return is fatal to the crawl; everything else degrades to a soft
//! failure attributed to the record.

use adtrawl_core::Record;

use crate::driver::{Driver, ItemHandle};
use crate::error::{DetailVisitSoftFailure, DriverError, NavigationLost};
use crate::extract::first_line;
use crate::site::{urls_match, SiteProfile};
use crate::wait::{Deadline, WaitPolicy};

/// Sub-page candidates clicked at most per detail page.
const MAX_PROBE_CANDIDATES: usize = 5;

/// How a visit that kept the listing reachable went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    Enriched,
    Soft(DetailVisitSoftFailure),
}

/// How the driver got back to the listing URL after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restoration {
    /// The driver never left the listing, or was already back on it.
    InPlace,
    Back,
    /// The listing URL was loaded again. The listing paginates in place, so
    /// it now shows its first page.
    Reloaded,
}

/// Result of a visit after which the listing is reachable again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub outcome: VisitOutcome,
    pub restoration: Restoration,
}

/// Polls the current URL until `done` accepts it. Returns the accepted URL,
/// or `None` when the policy timeout elapses first. Read errors count as
/// "not yet".
pub(crate) async fn wait_for_url<D, F>(
    driver: &mut D,
    policy: &WaitPolicy,
    mut done: F,
) -> Option<String>
where
    D: Driver,
    F: FnMut(&str) -> bool + Send,
{
    let mut deadline = Deadline::start(policy);
    loop {
        match driver.current_url().await {
            Ok(url) if done(&url) => return Some(url),
            Ok(_) => {}
            Err(error) => tracing::debug!(error = %error, "current URL unreadable while waiting"),
        }
        if !deadline.tick().await {
            return None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailVisitor<'a> {
    profile: &'a SiteProfile,
    policy: WaitPolicy,
    probe_sub_page: bool,
}

impl<'a> DetailVisitor<'a> {
    #[must_use]
    pub fn new(profile: &'a SiteProfile, policy: WaitPolicy, probe_sub_page: bool) -> Self {
        Self {
            profile,
            policy,
            probe_sub_page,
        }
    }

    /// Visits the detail page of the listing item at `item_index` and
    /// records its URL and sub-page URLs on `record`.
    ///
    /// The item is looked up again on the live page: at `item_index` if its
    /// name still matches, otherwise anywhere in the listing by name.
    ///
    /// A [`Restoration::Reloaded`] visit leaves the listing on its first
    /// page; the caller is responsible for paginating back.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationLost`] when neither back navigation nor reloading
    /// the listing URL brings the driver back to the listing.
    pub async fn visit<D: Driver>(
        &self,
        driver: &mut D,
        record: &mut Record,
        item_index: usize,
    ) -> Result<Visit, NavigationLost> {
        let origin = match driver.current_url().await {
            Ok(url) => url,
            Err(error) => {
                return Ok(Visit {
                    outcome: self.soft(record, DetailVisitSoftFailure::OriginUnknown(error)),
                    restoration: Restoration::InPlace,
                });
            }
        };

        let mut hops = 0u32;
        let enriched = self
            .enrich(driver, record, item_index, &origin, &mut hops)
            .await;
        let restoration = self.restore(driver, &origin, hops).await?;

        let outcome = match enriched {
            Ok(()) => VisitOutcome::Enriched,
            Err(failure) => self.soft(record, failure),
        };
        Ok(Visit {
            outcome,
            restoration,
        })
    }

    fn soft(&self, record: &Record, failure: DetailVisitSoftFailure) -> VisitOutcome {
        tracing::warn!(
            identity = record.identity(),
            detail_url = record.detail_url(),
            probe = self.probe_sub_page,
            error = %failure,
            "detail visit incomplete"
        );
        VisitOutcome::Soft(failure)
    }

    async fn enrich<D: Driver>(
        &self,
        driver: &mut D,
        record: &mut Record,
        item_index: usize,
        origin: &str,
        hops: &mut u32,
    ) -> Result<(), DetailVisitSoftFailure> {
        let item = self
            .locate_item(driver, record.identity(), item_index)
            .await?;

        if let Err(error) = driver.scroll_into_view(&item).await {
            tracing::debug!(identity = record.identity(), error = %error, "scroll into view failed");
        }
        driver
            .click(&item)
            .await
            .map_err(DetailVisitSoftFailure::Click)?;

        let landed = wait_for_url(driver, &self.policy, |url| !urls_match(url, origin))
            .await
            .ok_or(DetailVisitSoftFailure::NoNavigation)?;
        *hops += 1;

        if !self.profile.is_detail_url(&landed) {
            return Err(DetailVisitSoftFailure::NotADetailPage { url: landed });
        }
        tracing::debug!(identity = record.identity(), detail_url = %landed, "on detail page");
        record.set_detail_url(landed.clone());

        let found = self
            .collect_sub_links(driver, record)
            .await
            .map_err(DetailVisitSoftFailure::SubLinks)?;

        if found == 0 && self.probe_sub_page {
            self.probe(driver, record, &landed, hops).await;
        }
        Ok(())
    }

    async fn locate_item<D: Driver>(
        &self,
        driver: &mut D,
        identity: &str,
        item_index: usize,
    ) -> Result<D::Handle, DetailVisitSoftFailure> {
        let mut handles = match driver
            .wait_for_selector(&self.profile.listing_item, &self.policy)
            .await
        {
            Ok(handles) => handles,
            Err(error) => {
                tracing::debug!(identity, error = %error, "listing items not found");
                return Err(DetailVisitSoftFailure::ItemMissing);
            }
        };

        let mut order = Vec::with_capacity(handles.len());
        if item_index < handles.len() {
            order.push(item_index);
        }
        order.extend((0..handles.len()).filter(|&i| i != item_index));

        for position in order {
            let Ok(text) = handles[position].text().await else {
                continue;
            };
            if first_line(&text) == Some(identity) {
                if position != item_index {
                    tracing::debug!(identity, item_index, position, "listing re-rendered, item moved");
                }
                return Ok(handles.swap_remove(position));
            }
        }
        Err(DetailVisitSoftFailure::ItemMissing)
    }

    /// Adds every sub-page link on the current page to `record`. Returns how
    /// many links were found. A page without links is not an error.
    async fn collect_sub_links<D: Driver>(
        &self,
        driver: &mut D,
        record: &mut Record,
    ) -> Result<usize, DriverError> {
        let links = match driver
            .wait_for_selector(&self.profile.sub_link, &self.policy)
            .await
        {
            Ok(links) => links,
            Err(DriverError::Timeout { .. }) => return Ok(0),
            Err(error) => return Err(error),
        };

        let mut found = 0;
        for link in &links {
            let href = match link.attribute("href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(error) => {
                    tracing::debug!(error = %error, "sub-page link unreadable");
                    continue;
                }
            };
            let Some(url) = self.profile.absolute_url(&href) else {
                continue;
            };
            if self.profile.is_sub_url(&url) {
                found += 1;
                record.insert_sub_url(url);
            }
        }
        tracing::debug!(identity = record.identity(), found, "collected sub-page links");
        Ok(found)
    }

    /// Clicks up to [`MAX_PROBE_CANDIDATES`] candidates until one leads to a
    /// sub-page. Stops at the first navigation either way, since the
    /// remaining handles are stale after it.
    async fn probe<D: Driver>(
        &self,
        driver: &mut D,
        record: &mut Record,
        detail_url: &str,
        hops: &mut u32,
    ) {
        let candidates = match driver.query_all(&self.profile.sub_page_candidate).await {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::debug!(error = %error, "sub-page candidates unreadable");
                return;
            }
        };

        for (index, candidate) in candidates.iter().take(MAX_PROBE_CANDIDATES).enumerate() {
            if let Err(error) = driver.click(candidate).await {
                tracing::debug!(candidate = index, error = %error, "sub-page candidate click failed");
                continue;
            }
            let Some(url) = wait_for_url(driver, &self.policy, |url| !urls_match(url, detail_url)).await
            else {
                continue;
            };
            *hops += 1;
            if self.profile.is_sub_url(&url) {
                tracing::debug!(identity = record.identity(), sub_url = %url, "sub-page reached");
                record.insert_sub_url(url);
            }
            return;
        }
    }

    /// Returns the driver to `origin`: no-op if already there, else back
    /// navigation over `hops` entries, else a fresh load.
    async fn restore<D: Driver>(
        &self,
        driver: &mut D,
        origin: &str,
        hops: u32,
    ) -> Result<Restoration, NavigationLost> {
        if let Ok(url) = driver.current_url().await {
            if urls_match(&url, origin) {
                return Ok(Restoration::InPlace);
            }
        }

        let back_error = match go_back(driver, hops.max(1)).await {
            Ok(()) => {
                if wait_for_url(driver, &self.policy, |url| urls_match(url, origin))
                    .await
                    .is_some()
                {
                    return Ok(Restoration::Back);
                }
                format!(
                    "back navigation did not reach the listing within {}ms",
                    self.policy.timeout_ms()
                )
            }
            Err(error) => error.to_string(),
        };
        tracing::warn!(origin_url = origin, error = %back_error, "back navigation failed, reloading listing");

        let reload_error = match driver.load(origin).await {
            Ok(()) => {
                if wait_for_url(driver, &self.policy, |url| urls_match(url, origin))
                    .await
                    .is_some()
                {
                    tracing::info!(origin_url = origin, "listing restored by reload");
                    return Ok(Restoration::Reloaded);
                }
                format!(
                    "reload did not reach the listing within {}ms",
                    self.policy.timeout_ms()
                )
            }
            Err(error) => error.to_string(),
        };

        Err(NavigationLost {
            origin_url: origin.to_owned(),
            back_error,
            reload_error,
        })
    }
}

async fn go_back<D: Driver>(driver: &mut D, times: u32) -> Result<(), DriverError> {
    for _ in 0..times {
        driver.go_back().await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "detail_test.rs"]
mod tests;
