//! Crawl plan files: a YAML list of start queries to crawl as independent
//! sessions.
//!
//! ```yaml
//! sessions:
//!   - query: a
//!   - query: b
//!     region: GB
//!     max_pages: 3
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSession {
    pub query: String,
    /// Falls back to the run-wide region when absent.
    pub region: Option<String>,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CrawlPlan {
    pub sessions: Vec<PlannedSession>,
}

/// Load and validate a crawl plan from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_plan(path: &Path) -> Result<CrawlPlan, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PlanFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_plan(&content)
}

/// Parse and validate a crawl plan from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text is not a valid plan.
pub fn parse_plan(content: &str) -> Result<CrawlPlan, ConfigError> {
    let plan: CrawlPlan = serde_yaml::from_str(content)?;
    validate_plan(&plan)?;
    Ok(plan)
}

fn validate_plan(plan: &CrawlPlan) -> Result<(), ConfigError> {
    if plan.sessions.is_empty() {
        return Err(ConfigError::Validation(
            "plan must contain at least one session".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for session in &plan.sessions {
        if session.query.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session query must be non-empty".to_string(),
            ));
        }

        if session.max_pages == Some(0) {
            return Err(ConfigError::Validation(format!(
                "session '{}' has max_pages 0; omit the field to crawl all pages",
                session.query
            )));
        }

        let key = (
            session.query.trim().to_lowercase(),
            session
                .region
                .as_deref()
                .map(|r| r.trim().to_uppercase()),
        );
        if !seen.insert(key) {
            return Err(ConfigError::Validation(format!(
                "duplicate session for query '{}'",
                session.query
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_plan() {
        let plan = parse_plan("sessions:\n  - query: a\n").unwrap();
        assert_eq!(plan.sessions.len(), 1);
        assert_eq!(plan.sessions[0].query, "a");
        assert!(plan.sessions[0].region.is_none());
        assert!(plan.sessions[0].max_pages.is_none());
    }

    #[test]
    fn parses_overrides() {
        let yaml = "sessions:\n  - query: b\n    region: GB\n    max_pages: 3\n";
        let plan = parse_plan(yaml).unwrap();
        assert_eq!(plan.sessions[0].region.as_deref(), Some("GB"));
        assert_eq!(plan.sessions[0].max_pages, Some(3));
    }

    #[test]
    fn rejects_empty_plan() {
        let err = parse_plan("sessions: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_blank_query() {
        let err = parse_plan("sessions:\n  - query: '  '\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("non-empty")));
    }

    #[test]
    fn rejects_duplicate_query_region_pair() {
        let yaml = "sessions:\n  - query: a\n    region: us\n  - query: A\n    region: US\n";
        let err = parse_plan(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn same_query_different_region_is_allowed() {
        let yaml = "sessions:\n  - query: a\n    region: US\n  - query: a\n    region: GB\n";
        assert!(parse_plan(yaml).is_ok());
    }

    #[test]
    fn rejects_zero_max_pages() {
        let err = parse_plan("sessions:\n  - query: a\n    max_pages: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("max_pages")));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_plan("sessions: [\n").unwrap_err();
        assert!(matches!(err, ConfigError::PlanFileParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_plan(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::PlanFileIo { .. }));
    }
}
