mod crawl;
mod export;
mod plan;
mod summary;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::crawl::CrawlArgs;
use crate::plan::PlanCommands;

#[derive(Debug, Parser)]
#[command(name = "adtrawl")]
#[command(about = "Crawl advertiser listings from the ads transparency search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl one or more start queries and export the results
    Crawl(CrawlArgs),
    /// Crawl plan file utilities
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = adtrawl_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(env = %config.env, "configuration loaded");

    match cli.command {
        Commands::Crawl(args) => crawl::run_crawl(config, args).await,
        Commands::Plan {
            command: PlanCommands::Validate { file },
        } => plan::run_plan_validate(&file),
    }
}

#[cfg(test)]
mod tests;
