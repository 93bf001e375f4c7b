//! `plan` sub-commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum PlanCommands {
    /// Check that a crawl plan file parses and is valid
    Validate {
        /// Path to the YAML plan file
        file: PathBuf,
    },
}

pub(crate) fn run_plan_validate(file: &Path) -> anyhow::Result<()> {
    let plan = adtrawl_core::load_plan(file)
        .with_context(|| format!("invalid crawl plan {}", file.display()))?;

    println!("{}: {} session(s)", file.display(), plan.sessions.len());
    for session in &plan.sessions {
        let region = session.region.as_deref().unwrap_or("(default)");
        let pages = session
            .max_pages
            .map_or_else(|| "unlimited".to_string(), |p| p.to_string());
        println!("  query={:?} region={region} max_pages={pages}", session.query);
    }
    Ok(())
}
