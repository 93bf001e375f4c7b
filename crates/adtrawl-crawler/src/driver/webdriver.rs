//! Chrome driven through a WebDriver server (chromedriver, Selenium grid).

use async_trait::async_trait;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;

use super::{Driver, ItemHandle, Selector};
use crate::error::DriverError;

/// How to reach and configure the browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
}

/// A live browser session. One per crawl session; never shared.
pub struct WebDriverSession {
    driver: WebDriver,
}

/// Element handle backed by a WebDriver element reference.
#[derive(Clone)]
pub struct WebDriverHandle(WebElement);

fn by(selector: &Selector) -> By {
    match selector {
        Selector::Css(s) => By::Css(s.as_str()),
        Selector::XPath(s) => By::XPath(s.as_str()),
    }
}

fn command_error(err: &WebDriverError) -> DriverError {
    let message = err.to_string();
    if message.to_lowercase().contains("stale element") {
        DriverError::StaleElement
    } else {
        DriverError::Command(message)
    }
}

impl WebDriverSession {
    /// Starts a Chrome session on the configured WebDriver server.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Connection`] if the server is unreachable or
    /// refuses the session, and [`DriverError::Command`] if the capabilities
    /// cannot be built.
    pub async fn connect(options: &BrowserOptions) -> Result<Self, DriverError> {
        let mut caps = DesiredCapabilities::chrome();
        let caps_error = |e: WebDriverError| DriverError::Command(e.to_string());

        if options.headless {
            caps.set_headless().map_err(caps_error)?;
        }
        for arg in [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-blink-features=AutomationControlled",
        ] {
            caps.add_arg(arg).map_err(caps_error)?;
        }
        let (width, height) = options.window_size;
        caps.add_arg(&format!("--window-size={width},{height}"))
            .map_err(caps_error)?;
        caps.add_arg(&format!("--user-agent={}", options.user_agent))
            .map_err(caps_error)?;

        let driver = WebDriver::new(options.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| DriverError::Connection {
                endpoint: options.webdriver_url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(endpoint = %options.webdriver_url, "browser session started");
        Ok(Self { driver })
    }
}

#[async_trait]
impl ItemHandle for WebDriverHandle {
    async fn text(&self) -> Result<String, DriverError> {
        self.0.text().await.map_err(|e| command_error(&e))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.0.attr(name).await.map_err(|e| command_error(&e))
    }

    async fn has_descendant(&self, selector: &Selector) -> Result<bool, DriverError> {
        let found = self
            .0
            .find_all(by(selector))
            .await
            .map_err(|e| command_error(&e))?;
        Ok(!found.is_empty())
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    type Handle = WebDriverHandle;

    async fn load(&mut self, url: &str) -> Result<(), DriverError> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn query_all(&mut self, selector: &Selector) -> Result<Vec<Self::Handle>, DriverError> {
        let elements = self
            .driver
            .find_all(by(selector))
            .await
            .map_err(|e| command_error(&e))?;
        Ok(elements.into_iter().map(WebDriverHandle).collect())
    }

    async fn click(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        handle.0.click().await.map_err(|e| command_error(&e))
    }

    async fn scroll_into_view(&mut self, handle: &Self::Handle) -> Result<(), DriverError> {
        handle
            .0
            .scroll_into_view()
            .await
            .map_err(|e| command_error(&e))
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.driver
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| command_error(&e))
    }

    async fn go_back(&mut self) -> Result<(), DriverError> {
        self.driver.back().await.map_err(|e| command_error(&e))
    }

    async fn shutdown(self) -> Result<(), DriverError>
    where
        Self: Sized,
    {
        self.driver.quit().await.map_err(|e| command_error(&e))
    }
}
