pub mod app_config;
pub mod config;
pub mod crawl_config;
pub mod plan;
pub mod record;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use crawl_config::CrawlConfig;
pub use plan::{load_plan, parse_plan, CrawlPlan, PlannedSession};
pub use record::{normalize_location, parse_count, ExportRow, Record};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read crawl plan {path}: {source}")]
    PlanFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse crawl plan: {0}")]
    PlanFileParse(#[from] serde_yaml::Error),

    #[error("crawl plan validation failed: {0}")]
    Validation(String),
}
