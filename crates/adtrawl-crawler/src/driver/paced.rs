use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Driver, Selector};
use crate::error::DriverError;

/// Enforces a minimum interval between consecutive driver operations.
///
/// The first operation runs immediately; every later one waits until
/// `spacing` has elapsed since the previous operation started.
pub struct Paced<D> {
    inner: D,
    spacing: Duration,
    last_op: Option<Instant>,
}

impl<D: Driver> Paced<D> {
    #[must_use]
    pub fn new(inner: D, spacing: Duration) -> Self {
        Self {
            inner,
            spacing,
            last_op: None,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    async fn pace(&mut self) {
        if let Some(last) = self.last_op {
            let ready_at = last + self.spacing;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last_op = Some(Instant::now());
    }
}

#[async_trait]
impl<D: Driver> Driver for Paced<D> {
    type Handle = D::Handle;

    async fn load(&mut self, url: &str) -> Result<(), DriverError> {
        self.pace().await;
        self.inner.load(url).await
    }

    async fn query_all(&mut self, selector: &Selector) -> Result<Vec<Self::Handle>, DriverError> {
        self.pace().await;
        self.inner.query_all(selector).await
    }

    async fn click(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        self.pace().await;
        self.inner.click(handle).await
    }

    async fn scroll_into_view(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        self.pace().await;
        self.inner.scroll_into_view(handle).await
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.pace().await;
        self.inner.current_url().await
    }

    async fn go_back(&mut self) -> Result<(), DriverError> {
        self.pace().await;
        self.inner.go_back().await
    }

    async fn shutdown(self) -> Result<(), DriverError>
    where
        Self: Sized,
    {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{ScriptedDriver, ScriptedItem, ScriptedPage, ScriptedSite};
    use crate::site::SiteProfile;

    fn driver() -> ScriptedDriver {
        let site = ScriptedSite::new(
            "https://ads.example.com/search?region=US&query=a",
            vec![ScriptedPage::last(vec![ScriptedItem::new("Acme\n~3 ads")])],
        );
        ScriptedDriver::new(site, SiteProfile::default())
    }

    #[tokio::test]
    async fn spaces_consecutive_operations() {
        let mut paced = Paced::new(driver(), Duration::from_millis(30));
        let started = std::time::Instant::now();
        paced.current_url().await.unwrap();
        paced.current_url().await.unwrap();
        paced.current_url().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn zero_spacing_does_not_wait() {
        let mut paced = Paced::new(driver(), Duration::ZERO);
        let started = std::time::Instant::now();
        for _ in 0..10 {
            paced.current_url().await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn forwards_to_inner_driver() {
        let mut paced = Paced::new(driver(), Duration::ZERO);
        paced
            .load("https://ads.example.com/search?region=US&query=a")
            .await
            .unwrap();
        let items = paced
            .query_all(&Selector::css("[role='option']"))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(paced.inner().probe().loads(), 1);
    }
}
