//! The `crawl` command: one browser session per start query, run
//! concurrently up to the configured limit.

use std::path::PathBuf;

use adtrawl_core::{AppConfig, CrawlConfig, PlannedSession};
use adtrawl_crawler::{
    BrowserOptions, CrawlReport, DoneReason, Orchestrator, Paced, SiteProfile, WebDriverSession,
};
use anyhow::Context;
use clap::Args;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::export::export_report;
use crate::summary::render_summary;

const DEFAULT_QUERY: &str = "a";

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Start query; repeat for several sessions (defaults to "a")
    #[arg(long = "query", conflicts_with = "plan")]
    pub queries: Vec<String>,

    /// YAML crawl plan listing the sessions to run
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Region code passed to the search (e.g. US, GB)
    #[arg(long)]
    pub region: Option<String>,

    /// Stop each session after this many listing pages
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,

    /// Only read listing pages; skip advertiser detail pages
    #[arg(long)]
    pub no_details: bool,

    /// Click through to a nested sub-page when a detail page lists none
    #[arg(long)]
    pub probe_sub_page: bool,

    /// Directory for the exported CSV and JSON files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// WebDriver server URL
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Maximum number of sessions crawling at once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,
}

/// Applies per-invocation flags on top of the environment configuration.
pub(crate) fn apply_overrides(config: &mut AppConfig, args: &CrawlArgs) {
    if let Some(region) = &args.region {
        config.region.clone_from(region);
    }
    if args.max_pages.is_some() {
        config.max_pages = args.max_pages;
    }
    if args.no_details {
        config.visit_detail_pages = false;
    }
    if args.probe_sub_page {
        config.probe_sub_page = true;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(url) = &args.webdriver_url {
        config.webdriver_url.clone_from(url);
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(n) = args.concurrency {
        config.max_concurrent_sessions = usize::try_from(n).unwrap_or(usize::MAX);
    }
}

/// The sessions to run, from the plan file or the `--query` flags.
pub(crate) fn planned_sessions(args: &CrawlArgs) -> anyhow::Result<Vec<PlannedSession>> {
    if let Some(path) = &args.plan {
        let plan = adtrawl_core::load_plan(path)
            .with_context(|| format!("invalid crawl plan {}", path.display()))?;
        return Ok(plan.sessions);
    }

    let queries = if args.queries.is_empty() {
        vec![DEFAULT_QUERY.to_string()]
    } else {
        args.queries.clone()
    };
    let mut seen = std::collections::HashSet::new();
    let mut sessions = Vec::with_capacity(queries.len());
    for query in queries {
        let query = query.trim().to_string();
        if query.is_empty() {
            anyhow::bail!("--query must not be blank");
        }
        if seen.insert(query.clone()) {
            sessions.push(PlannedSession {
                query,
                region: None,
                max_pages: None,
            });
        }
    }
    Ok(sessions)
}

/// Session config for one planned session. Plan entries override the
/// run-wide region and page cap.
pub(crate) fn session_config(config: &AppConfig, session: &PlannedSession) -> CrawlConfig {
    let mut crawl = CrawlConfig::from_app_config(config, &session.query);
    if let Some(region) = &session.region {
        crawl.region.clone_from(region);
    }
    if session.max_pages.is_some() {
        crawl.max_pages = session.max_pages;
    }
    crawl
}

pub(crate) async fn run_crawl(mut config: AppConfig, args: CrawlArgs) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);
    let sessions = planned_sessions(&args)?;

    let orchestrators = sessions
        .iter()
        .map(|session| {
            Orchestrator::new(session_config(&config, session), SiteProfile::default())
                .with_context(|| format!("cannot crawl query {:?}", session.query))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = BrowserOptions {
        webdriver_url: config.webdriver_url.clone(),
        headless: config.headless,
        user_agent: config.user_agent.clone(),
        window_size: config.window_size,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current item");
            interrupt.cancel();
        }
    });

    let max_concurrent = config.max_concurrent_sessions.max(1);
    tracing::info!(
        sessions = orchestrators.len(),
        max_concurrent,
        webdriver_url = %options.webdriver_url,
        "starting crawl"
    );

    let options = &options;
    let cancel_ref = &cancel;
    let reports: Vec<CrawlReport> = stream::iter(&orchestrators)
        .map(|orchestrator| {
            let spacing = orchestrator.config().request_spacing;
            orchestrator.crawl(
                move || async move {
                    WebDriverSession::connect(options)
                        .await
                        .map(|session| Paced::new(session, spacing))
                },
                cancel_ref,
            )
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut export_failures = 0usize;
    for report in &reports {
        if let Err(e) = export_report(&config.output_dir, report) {
            tracing::error!(session_id = %report.session_id, error = %format!("{e:#}"), "export failed");
            export_failures += 1;
        }
        println!("{}", render_summary(report));
    }

    if export_failures > 0 {
        anyhow::bail!("{export_failures} session export(s) failed");
    }
    if reports.iter().all(|r| r.reason == DoneReason::SetupFailed) {
        anyhow::bail!(
            "no session could reach the listing; is a WebDriver server running at {}?",
            config.webdriver_url
        );
    }
    Ok(())
}
