use std::path::PathBuf;

use adtrawl_core::PlannedSession;

use super::*;
use crate::crawl::{apply_overrides, planned_sessions, session_config};

fn crawl_args(args: &[&str]) -> CrawlArgs {
    let mut argv = vec!["adtrawl", "crawl"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).expect("expected valid cli args").command {
        Commands::Crawl(args) => args,
        other => panic!("expected crawl command, got {other:?}"),
    }
}

fn app_config() -> adtrawl_core::AppConfig {
    adtrawl_core::AppConfig {
        env: adtrawl_core::Environment::Test,
        log_level: "info".to_string(),
        webdriver_url: "http://localhost:4444".to_string(),
        headless: true,
        user_agent: "adtrawl-test".to_string(),
        window_size: (1920, 1080),
        region: "US".to_string(),
        max_pages: None,
        visit_detail_pages: true,
        probe_sub_page: false,
        request_spacing_ms: 250,
        wait_timeout_secs: 10,
        poll_interval_ms: 200,
        setup_max_retries: 3,
        setup_backoff_base_secs: 2,
        max_concurrent_sessions: 1,
        output_dir: PathBuf::from("./results"),
    }
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["adtrawl"]).is_err());
}

#[test]
fn parses_bare_crawl_command() {
    let args = crawl_args(&[]);
    assert!(args.queries.is_empty());
    assert!(args.plan.is_none());
    assert!(!args.no_details);
    assert!(!args.headed);
}

#[test]
fn parses_repeated_queries() {
    let args = crawl_args(&["--query", "a", "--query", "shoes"]);
    assert_eq!(args.queries, vec!["a".to_string(), "shoes".to_string()]);
}

#[test]
fn parses_all_crawl_flags() {
    let args = crawl_args(&[
        "--query",
        "a",
        "--region",
        "GB",
        "--max-pages",
        "3",
        "--no-details",
        "--probe-sub-page",
        "--output-dir",
        "out",
        "--webdriver-url",
        "http://grid:4444",
        "--headed",
        "--concurrency",
        "2",
    ]);
    assert_eq!(args.region.as_deref(), Some("GB"));
    assert_eq!(args.max_pages, Some(3));
    assert!(args.no_details);
    assert!(args.probe_sub_page);
    assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    assert_eq!(args.webdriver_url.as_deref(), Some("http://grid:4444"));
    assert!(args.headed);
    assert_eq!(args.concurrency, Some(2));
}

#[test]
fn zero_max_pages_is_rejected() {
    assert!(Cli::try_parse_from(["adtrawl", "crawl", "--max-pages", "0"]).is_err());
}

#[test]
fn zero_concurrency_is_rejected() {
    assert!(Cli::try_parse_from(["adtrawl", "crawl", "--concurrency", "0"]).is_err());
}

#[test]
fn query_conflicts_with_plan() {
    assert!(
        Cli::try_parse_from(["adtrawl", "crawl", "--query", "a", "--plan", "plan.yaml"]).is_err()
    );
}

#[test]
fn parses_plan_validate() {
    let cli = Cli::try_parse_from(["adtrawl", "plan", "validate", "crawl.yaml"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Plan {
            command: PlanCommands::Validate { ref file }
        } if file == &PathBuf::from("crawl.yaml")
    ));
}

#[test]
fn flags_override_environment_config() {
    let mut config = app_config();
    let args = crawl_args(&[
        "--region",
        "DE",
        "--max-pages",
        "2",
        "--no-details",
        "--headed",
        "--concurrency",
        "4",
    ]);
    apply_overrides(&mut config, &args);
    assert_eq!(config.region, "DE");
    assert_eq!(config.max_pages, Some(2));
    assert!(!config.visit_detail_pages);
    assert!(!config.headless);
    assert_eq!(config.max_concurrent_sessions, 4);
    assert_eq!(config.webdriver_url, "http://localhost:4444");
}

#[test]
fn absent_flags_keep_environment_config() {
    let mut config = app_config();
    config.max_pages = Some(7);
    apply_overrides(&mut config, &crawl_args(&[]));
    assert_eq!(config.max_pages, Some(7));
    assert!(config.visit_detail_pages);
    assert!(config.headless);
}

#[test]
fn default_session_uses_query_a() {
    let sessions = planned_sessions(&crawl_args(&[])).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].query, "a");
}

#[test]
fn repeated_queries_are_deduplicated() {
    let sessions = planned_sessions(&crawl_args(&["--query", "a", "--query", " a "])).unwrap();
    assert_eq!(sessions.len(), 1);
}

#[test]
fn blank_query_is_an_error() {
    assert!(planned_sessions(&crawl_args(&["--query", "  "])).is_err());
}

#[test]
fn missing_plan_file_is_an_error() {
    let args = crawl_args(&["--plan", "/nonexistent/adtrawl-plan.yaml"]);
    assert!(planned_sessions(&args).is_err());
}

#[test]
fn plan_entry_overrides_region_and_page_cap() {
    let config = app_config();
    let session = PlannedSession {
        query: "shoes".to_string(),
        region: Some("FR".to_string()),
        max_pages: Some(5),
    };
    let crawl = session_config(&config, &session);
    assert_eq!(crawl.start_query, "shoes");
    assert_eq!(crawl.region, "FR");
    assert_eq!(crawl.max_pages, Some(5));
}

#[test]
fn plan_entry_without_overrides_uses_run_defaults() {
    let mut config = app_config();
    config.max_pages = Some(9);
    let session = PlannedSession {
        query: "a".to_string(),
        region: None,
        max_pages: None,
    };
    let crawl = session_config(&config, &session);
    assert_eq!(crawl.region, "US");
    assert_eq!(crawl.max_pages, Some(9));
}
