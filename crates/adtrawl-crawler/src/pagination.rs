//! In-place pagination of the result listing.
//!
//! The listing URL does not change between pages, so a successful advance is
//! detected by the listing content changing. The content is compared through
//! a SHA-256 fingerprint of the item texts in DOM order.

use sha2::{Digest, Sha256};

use crate::driver::{Driver, ItemHandle};
use crate::error::PaginationFailure;
use crate::site::SiteProfile;
use crate::wait::{Deadline, WaitPolicy};

/// State of the listing's next control.
#[derive(Debug)]
pub enum NextControl<H> {
    Enabled(H),
    Disabled,
    Absent,
}

impl<H> NextControl<H> {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, NextControl::Enabled(_))
    }
}

#[derive(Debug, Clone)]
pub struct PaginationController<'a> {
    profile: &'a SiteProfile,
    policy: WaitPolicy,
}

impl<'a> PaginationController<'a> {
    #[must_use]
    pub fn new(profile: &'a SiteProfile, policy: WaitPolicy) -> Self {
        Self { profile, policy }
    }

    /// Locates the next control by selector and reports whether it can be
    /// used. A control whose state cannot be read is reported as absent.
    pub async fn has_next<D: Driver>(&self, driver: &mut D) -> NextControl<D::Handle> {
        let control = match driver.query_all(&self.profile.next_control).await {
            Ok(found) => found.into_iter().next(),
            Err(error) => {
                tracing::warn!(error = %error, "next control lookup failed");
                None
            }
        };
        let Some(control) = control else {
            return NextControl::Absent;
        };

        match is_disabled(&control).await {
            Ok(true) => NextControl::Disabled,
            Ok(false) => NextControl::Enabled(control),
            Err(error) => {
                tracing::warn!(error = %error, "next control state unreadable");
                NextControl::Absent
            }
        }
    }

    /// Clicks `control` and waits until the listing shows different items.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationFailure::Click`] if the click is rejected and
    /// [`PaginationFailure::Stalled`] if the listing does not change within
    /// the wait timeout.
    pub async fn advance<D: Driver>(
        &self,
        driver: &mut D,
        control: &D::Handle,
    ) -> Result<(), PaginationFailure> {
        let before = self.fingerprint(driver).await;

        if let Err(error) = driver.scroll_into_view(control).await {
            tracing::debug!(error = %error, "scroll to next control failed");
        }
        driver
            .click(control)
            .await
            .map_err(PaginationFailure::Click)?;

        let mut deadline = Deadline::start(&self.policy);
        loop {
            if let Some(after) = self.fingerprint(driver).await {
                if before.as_ref() != Some(&after) {
                    return Ok(());
                }
            }
            if !deadline.tick().await {
                return Err(PaginationFailure::Stalled {
                    timeout_ms: self.policy.timeout_ms(),
                });
            }
        }
    }

    /// Pages forward from the listing's first page until page `page`
    /// (1-based) is shown. Used after the listing URL had to be reloaded,
    /// which resets the listing to its first page.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationFailure::ListingNotRendered`] if the first page
    /// never renders, [`PaginationFailure::NoNextControl`] if a page on the
    /// way cannot be advanced from, or the failure of [`Self::advance`].
    pub async fn seek<D: Driver>(
        &self,
        driver: &mut D,
        page: u32,
    ) -> Result<(), PaginationFailure> {
        driver
            .wait_for_selector(&self.profile.listing_item, &self.policy)
            .await
            .map_err(PaginationFailure::ListingNotRendered)?;

        for from in 1..page {
            let NextControl::Enabled(control) = self.has_next(driver).await else {
                return Err(PaginationFailure::NoNextControl { page: from });
            };
            self.advance(driver, &control).await?;
            tracing::debug!(page = from + 1, "paged forward");
        }
        Ok(())
    }

    /// Fingerprint of the listing items currently rendered. `None` while the
    /// listing is empty or unreadable.
    pub async fn fingerprint<D: Driver>(&self, driver: &mut D) -> Option<String> {
        let items = driver.query_all(&self.profile.listing_item).await.ok()?;
        if items.is_empty() {
            return None;
        }
        let mut hasher = Sha256::new();
        for item in &items {
            let text = item.text().await.ok()?;
            hasher.update(text.as_bytes());
            hasher.update([0u8]);
        }
        Some(format!("{:x}", hasher.finalize()))
    }
}

async fn is_disabled<H: ItemHandle>(control: &H) -> Result<bool, crate::error::DriverError> {
    let aria = control.attribute("aria-disabled").await?;
    if aria.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return Ok(true);
    }
    Ok(control.attribute("disabled").await?.is_some())
}
