use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use llc_crawler::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "llc-crawler",
    version,
    about = "Submission crawler and score ledger for a LeetCode community leaderboard",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (environment variables are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl loop until Ctrl-C
    Run {
        /// Start the loop even when START_UP_TASKS is not set
        #[arg(long, default_value = "false")]
        start: bool,
    },

    /// Run one reconciliation pass over this month's leaderboard
    Tick,

    /// Reconcile a single user by LeetCode handle
    Reconcile {
        /// LeetCode username
        handle: String,
    },

    /// Create the database and schema
    InitDb,

    /// Show the monthly leaderboard
    Leaderboard {
        /// Show the previous month instead of the current one
        #[arg(long, default_value = "false")]
        last_month: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    config.validate()?;
    tracing::info!("llc-crawler starting");

    match cli.command {
        Commands::Run { start } => {
            tracing::info!(start = %start, "Starting run command");
            commands::run(config, start).await?;
        }

        Commands::Tick => {
            commands::tick(config).await?;
        }

        Commands::Reconcile { handle } => {
            tracing::info!(handle = %handle, "Starting reconcile command");
            commands::reconcile(config, handle).await?;
        }

        Commands::InitDb => {
            commands::init_db(config)?;
        }

        Commands::Leaderboard { last_month } => {
            commands::leaderboard(config, last_month)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("llc_crawler=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
            tracing_subscriber::EnvFilter::try_new(format!("llc_crawler={level},warn"))
        })?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
