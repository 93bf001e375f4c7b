//! The page-automation capabilities a crawl needs from a browser.
//!
//! The crawl logic only ever talks to a [`Driver`]; concrete adapters live
//! next to it:
//! - [`WebDriverSession`] drives Chrome through a WebDriver server
//!   (`webdriver` feature);
//! - `scripted::ScriptedDriver` serves an in-memory site for the crawl tests
//!   (`test-support` feature);
//! - [`Paced`] wraps any driver to enforce a minimum spacing between
//!   operations.

mod paced;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;
#[cfg(feature = "webdriver")]
mod webdriver;

use std::fmt;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::wait::{Deadline, WaitPolicy};

pub use paced::Paced;
#[cfg(feature = "webdriver")]
pub use webdriver::{BrowserOptions, WebDriverSession};

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    #[must_use]
    pub fn css(selector: &str) -> Self {
        Selector::Css(selector.to_owned())
    }

    #[must_use]
    pub fn xpath(expression: &str) -> Self {
        Selector::XPath(expression.to_owned())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// A reference to an element found on the current page.
///
/// Handles may go stale once the driver navigates; callers re-query rather
/// than hold them across navigation.
#[async_trait]
pub trait ItemHandle: Send + Sync {
    /// Rendered text of the element, lines separated by `\n`.
    async fn text(&self) -> Result<String, DriverError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;

    /// Whether any descendant matches `selector`.
    async fn has_descendant(&self, selector: &Selector) -> Result<bool, DriverError>;
}

/// One interactive browser page, driven strictly sequentially.
#[async_trait]
pub trait Driver: Send {
    type Handle: ItemHandle;

    async fn load(&mut self, url: &str) -> Result<(), DriverError>;

    /// All elements currently matching `selector`, in document order. Never
    /// waits; an empty result is not an error.
    async fn query_all(&mut self, selector: &Selector) -> Result<Vec<Self::Handle>, DriverError>;

    async fn click(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;

    async fn scroll_into_view(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    async fn go_back(&mut self) -> Result<(), DriverError>;

    /// Closes the browser session.
    async fn shutdown(self) -> Result<(), DriverError>
    where
        Self: Sized;

    /// Polls until at least one element matches `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Timeout`] when nothing matched before the policy
    /// timeout, or the first error raised by [`Driver::query_all`].
    async fn wait_for_selector(
        &mut self,
        selector: &Selector,
        policy: &WaitPolicy,
    ) -> Result<Vec<Self::Handle>, DriverError> {
        let mut deadline = Deadline::start(policy);
        loop {
            let found = self.query_all(selector).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if !deadline.tick().await {
                return Err(DriverError::Timeout {
                    what: selector.to_string(),
                    timeout_ms: policy.timeout_ms(),
                });
            }
        }
    }
}
