use anyhow::{Context, Result};

use llc_crawler::config::Config;
use llc_crawler::scheduler::CrawlJob;

use super::Components;

/// Run the crawl loop until Ctrl-C
pub async fn run(config: Config, start: bool) -> Result<()> {
    let components = Components::build(&config)?;
    let scheduler = components.scheduler(&config);

    if !(start || config.crawler.start_on_startup) {
        println!("Crawl loop not started (pass --start or set START_UP_TASKS=true)");
        return Ok(());
    }

    scheduler.start().await?;
    println!(
        "Crawl loop running every {}s, press Ctrl-C to stop",
        config.crawler.interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    // The loop may already have given up under the restart policy
    if scheduler.is_running().await {
        scheduler.stop().await?;
    }

    println!("\n{}", scheduler.status().await.display());
    Ok(())
}

/// Run a single reconciliation pass over the leaderboard
pub async fn tick(config: Config) -> Result<()> {
    let components = Components::build(&config)?;
    let report = components.job().run_tick().await?;

    println!("Tick Report");
    println!("===========");
    println!("Users:       {}", report.users);
    println!("Skipped:     {}", report.skipped_users);
    println!("Fetched:     {}", report.fetched);
    println!("Credited:    {}", report.credited);
    println!("Duplicates:  {}", report.duplicates);
    println!("Unresolved:  {}", report.unresolved);
    println!("Failed:      {}", report.failed);
    Ok(())
}

/// Reconcile one user by external handle
pub async fn reconcile(config: Config, handle: String) -> Result<()> {
    let components = Components::build(&config)?;
    let user = components
        .db
        .user_by_handle(&handle)?
        .with_context(|| format!("No tracked user with handle '{handle}'"))?;

    let report = components.reconciler.reconcile(&user).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
