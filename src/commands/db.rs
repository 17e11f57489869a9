use anyhow::{Context, Result};

use llc_crawler::config::Config;
use llc_crawler::storage::Database;
use llc_crawler::utils::{Clock, SystemClock};

/// Create the database file and schema
pub fn init_db(config: Config) -> Result<()> {
    let path = &config.database.sqlite_path;
    let db =
        Database::open(path).with_context(|| format!("Failed to initialize {}", path.display()))?;
    let problems = db.problems()?;
    let topics = db.topics()?;

    println!("Database ready at {}", path.display());
    println!("Catalog: {} problems, {} topics", problems.len(), topics.len());
    if let Some(today) = db.latest_daily()? {
        println!(
            "Latest daily: {} ({})",
            today.problem.title_slug, today.daily.generated_date
        );
    }
    Ok(())
}

/// Print the current (or previous) month's leaderboard
pub fn leaderboard(config: Config, last_month: bool) -> Result<()> {
    let db = Database::open(&config.database.sqlite_path)?;
    let clock = SystemClock::from_offset_hours(config.crawler.utc_offset_hours)?;

    let (month, entries) = if last_month {
        (clock.previous_month(), db.last_month_leaderboard(&clock)?)
    } else {
        (clock.current_month(), db.current_month_leaderboard(&clock)?)
    };

    println!("Leaderboard for {}", month.format("%B %Y"));
    println!("{:-<40}", "");
    if entries.is_empty() {
        println!("(no entries)");
    }
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {:<24} {:>6}",
            rank + 1,
            entry.user.leetcode_username,
            entry.monthly.score_earned
        );
    }
    Ok(())
}
