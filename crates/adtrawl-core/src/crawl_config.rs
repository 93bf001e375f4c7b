use std::time::Duration;

use crate::AppConfig;

/// Settings for one crawl session (one start query against one region).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub start_query: String,
    pub region: String,
    /// Stop after this many listing pages. `None` crawls until the next
    /// control disappears or is disabled.
    pub max_pages: Option<u32>,
    pub visit_detail_pages: bool,
    /// When a detail page exposes no sub-page links, click through the
    /// candidates to discover one.
    pub probe_sub_page: bool,
    /// Minimum spacing between consecutive driver operations.
    pub request_spacing: Duration,
    /// Upper bound for every condition-based wait.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub setup_max_retries: u32,
    pub setup_backoff_base_secs: u64,
}

impl CrawlConfig {
    /// Builds a session config for `start_query` from process-wide defaults.
    #[must_use]
    pub fn from_app_config(app: &AppConfig, start_query: &str) -> Self {
        Self {
            start_query: start_query.to_owned(),
            region: app.region.clone(),
            max_pages: app.max_pages,
            visit_detail_pages: app.visit_detail_pages,
            probe_sub_page: app.probe_sub_page,
            request_spacing: Duration::from_millis(app.request_spacing_ms),
            wait_timeout: Duration::from_secs(app.wait_timeout_secs),
            poll_interval: Duration::from_millis(app.poll_interval_ms),
            setup_max_retries: app.setup_max_retries,
            setup_backoff_base_secs: app.setup_backoff_base_secs,
        }
    }

    /// Whether the page cap (if any) has been reached at `page_index`.
    #[must_use]
    pub fn page_limit_reached(&self, page_index: u32) -> bool {
        self.max_pages.is_some_and(|cap| page_index >= cap)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_query: "a".to_owned(),
            region: "US".to_owned(),
            max_pages: None,
            visit_detail_pages: true,
            probe_sub_page: false,
            request_spacing: Duration::from_millis(250),
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(200),
            setup_max_retries: 3,
            setup_backoff_base_secs: 2,
        }
    }
}
