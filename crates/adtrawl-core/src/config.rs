use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds a value that cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; use it from tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds a value that cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_flag = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_bool(&or_default(var, default)).ok_or_else(|| {
            invalid(var, "expected one of true/false/1/0/yes/no".to_string())
        })
    };

    let env = parse_environment(&or_default("ADTRAWL_ENV", "development"))?;
    let log_level = or_default("ADTRAWL_LOG_LEVEL", "info");
    let webdriver_url = or_default("ADTRAWL_WEBDRIVER_URL", "http://localhost:4444");
    let headless = parse_flag("ADTRAWL_HEADLESS", "true")?;
    let user_agent = or_default("ADTRAWL_USER_AGENT", DEFAULT_USER_AGENT);

    let window_raw = or_default("ADTRAWL_WINDOW_SIZE", "1920,1080");
    let window_size = parse_window_size(&window_raw).ok_or_else(|| {
        invalid(
            "ADTRAWL_WINDOW_SIZE",
            format!("expected WIDTH,HEIGHT, got \"{window_raw}\""),
        )
    })?;

    let region = or_default("ADTRAWL_REGION", "US");
    let max_pages = match lookup("ADTRAWL_MAX_PAGES") {
        Ok(raw) if !raw.trim().is_empty() => {
            let pages = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| invalid("ADTRAWL_MAX_PAGES", e.to_string()))?;
            if pages == 0 {
                return Err(invalid("ADTRAWL_MAX_PAGES", "must be at least 1".to_string()));
            }
            Some(pages)
        }
        _ => None,
    };

    let visit_detail_pages = parse_flag("ADTRAWL_VISIT_DETAIL_PAGES", "true")?;
    let probe_sub_page = parse_flag("ADTRAWL_PROBE_SUB_PAGE", "false")?;
    let request_spacing_ms = parse_u64("ADTRAWL_REQUEST_SPACING_MS", "250")?;
    let wait_timeout_secs = parse_u64("ADTRAWL_WAIT_TIMEOUT_SECS", "10")?;
    let poll_interval_ms = parse_u64("ADTRAWL_POLL_INTERVAL_MS", "200")?;
    let setup_max_retries = parse_u32("ADTRAWL_SETUP_MAX_RETRIES", "3")?;
    let setup_backoff_base_secs = parse_u64("ADTRAWL_SETUP_BACKOFF_BASE_SECS", "2")?;
    let max_concurrent_sessions = parse_usize("ADTRAWL_MAX_CONCURRENT_SESSIONS", "1")?;
    let output_dir = PathBuf::from(or_default("ADTRAWL_OUTPUT_DIR", "./results"));

    Ok(AppConfig {
        env,
        log_level,
        webdriver_url,
        headless,
        user_agent,
        window_size,
        region,
        max_pages,
        visit_detail_pages,
        probe_sub_page,
        request_spacing_ms,
        wait_timeout_secs,
        poll_interval_ms,
        setup_max_retries,
        setup_backoff_base_secs,
        max_concurrent_sessions,
        output_dir,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ADTRAWL_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses `"1920,1080"` (or `"1920x1080"`) into `(width, height)`.
fn parse_window_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(',').or_else(|| s.split_once('x'))?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
