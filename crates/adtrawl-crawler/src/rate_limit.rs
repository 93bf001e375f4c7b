//! Retry utilities for driver setup.
//!
//! Connecting to the browser and loading the first listing page are retried
//! with exponential backoff on transient driver errors. Everything after
//! setup is handled by the crawl's own recovery paths instead. Spacing
//! between individual driver operations is [`crate::Paced`]'s job.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::driver::Driver;
use crate::error::DriverError;

/// Wait before retry number `attempt + 1`: `backoff_base_secs * 2^attempt`.
#[must_use]
pub fn backoff_delay(backoff_base_secs: u64, attempt: u32) -> Duration {
    // Cap the shift so extreme configs cannot overflow.
    Duration::from_secs(backoff_base_secs.saturating_mul(1u64 << attempt.min(62)))
}

/// Sleeps for `delay` unless `cancel` fires first.
async fn backoff_sleep(
    what: &str,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), DriverError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!(what, "cancelled during setup backoff");
            Err(DriverError::Cancelled {
                what: what.to_owned(),
            })
        }
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Executes `operation` with exponential backoff retries on retriable
/// [`DriverError`]s.
///
/// The wait before the n-th retry is `backoff_base_secs * 2^(n-1)` seconds.
/// With `max_retries = 3` the operation is attempted at most 4 times total.
/// Non-retriable errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, the first
/// non-retriable error, or [`DriverError::Cancelled`] if `cancel` fires
/// during a backoff wait.
pub async fn retry_with_backoff<T, F, Fut>(
    what: &str,
    max_retries: u32,
    backoff_base_secs: u64,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, DriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DriverError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retriable() || attempt >= max_retries {
            return Err(err);
        }

        let delay = backoff_delay(backoff_base_secs, attempt);
        tracing::warn!(
            what,
            attempt,
            max_retries,
            delay_secs = delay.as_secs(),
            error = %err,
            "driver setup failed, retrying after backoff"
        );
        backoff_sleep(what, delay, cancel).await?;
        attempt += 1;
    }
}

/// Loads `url` on `driver`, retrying retriable failures the same way as
/// [`retry_with_backoff`].
///
/// # Errors
///
/// Returns the last load error once retries are exhausted, the first
/// non-retriable one, or [`DriverError::Cancelled`] if `cancel` fires during
/// a backoff wait.
pub async fn load_with_backoff<D: Driver>(
    driver: &mut D,
    url: &str,
    max_retries: u32,
    backoff_base_secs: u64,
    cancel: &CancellationToken,
) -> Result<(), DriverError> {
    let mut attempt = 0u32;

    loop {
        let err = match driver.load(url).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if !err.is_retriable() || attempt >= max_retries {
            return Err(err);
        }

        let delay = backoff_delay(backoff_base_secs, attempt);
        tracing::warn!(
            url,
            attempt,
            max_retries,
            delay_secs = delay.as_secs(),
            error = %err,
            "start page load failed, retrying after backoff"
        );
        backoff_sleep("start page load", delay, cancel).await?;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{ScriptedDriver, ScriptedPage, ScriptedSite};
        use crate::site::SiteProfile;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const LISTING_URL: &str = "https://adstransparency.google.com/search?region=US&query=a";

    fn connection_refused() -> DriverError {
        DriverError::Connection {
            endpoint: "http://localhost:4444".to_owned(),
            reason: "connection refused".to_owned(),
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff("connect", 3, 0, &CancellationToken::new(), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, DriverError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_connection_error_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff("connect", 3, 0, &CancellationToken::new(), || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(connection_refused())
                } else {
                    Ok::<u32, DriverError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff("connect", 2, 0, &CancellationToken::new(), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, DriverError>(connection_refused())
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(DriverError::Connection { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_stale_element() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff("load", 3, 0, &CancellationToken::new(), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, DriverError>(DriverError::StaleElement)
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(DriverError::StaleElement)));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(2, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2, 3), Duration::from_secs(16));
        assert_eq!(backoff_delay(0, 5), Duration::ZERO);
        assert_eq!(backoff_delay(u64::MAX, 70), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn load_retries_transient_navigation_errors() {
        let site = ScriptedSite::new(LISTING_URL, vec![ScriptedPage::last(Vec::new())]);
        let mut driver = ScriptedDriver::new(site, SiteProfile::default()).failing_loads(2);
        let probe = driver.probe();
        load_with_backoff(&mut driver, LISTING_URL, 3, 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(probe.loads(), 3);
        assert_eq!(probe.current_url(), LISTING_URL);
    }

    #[tokio::test]
    async fn load_gives_up_after_max_retries() {
        let site = ScriptedSite::new(LISTING_URL, vec![ScriptedPage::last(Vec::new())]);
        let mut driver = ScriptedDriver::new(site, SiteProfile::default()).failing_loads(10);
        let probe = driver.probe();
        let err = load_with_backoff(&mut driver, LISTING_URL, 1, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Navigation { .. }));
        assert_eq!(probe.loads(), 2);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff_wait() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = std::time::Instant::now();
        let result = retry_with_backoff("connect", 3, 60, &cancel, || {
            let cc = Arc::clone(&cc);
            let trigger = trigger.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                trigger.cancel();
                Err::<u32, DriverError>(connection_refused())
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(DriverError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn load_backoff_stops_when_cancelled() {
        let site = ScriptedSite::new(LISTING_URL, vec![ScriptedPage::last(Vec::new())]);
        let mut driver = ScriptedDriver::new(site, SiteProfile::default()).failing_loads(10);
        let probe = driver.probe();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = load_with_backoff(&mut driver, LISTING_URL, 3, 60, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Cancelled { .. }));
        assert_eq!(probe.loads(), 1);
    }

    #[tokio::test]
    async fn does_not_retry_rejected_command() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff("load", 3, 0, &CancellationToken::new(), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, DriverError>(DriverError::Command("invalid argument".to_owned()))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(DriverError::Command(_))));
    }
}
