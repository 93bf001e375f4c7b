use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings read from the environment.
///
/// Per-run values (`region`, `max_pages`, ...) act as defaults; the CLI can
/// override them for a single invocation before building a
/// [`crate::CrawlConfig`] for each session.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
    pub region: String,
    pub max_pages: Option<u32>,
    pub visit_detail_pages: bool,
    pub probe_sub_page: bool,
    pub request_spacing_ms: u64,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub setup_max_retries: u32,
    pub setup_backoff_base_secs: u64,
    pub max_concurrent_sessions: usize,
    pub output_dir: PathBuf,
}
