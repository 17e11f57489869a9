//! Configuration management for llc-crawler
//!
//! Configuration comes from environment variables (`LLC_*`, plus the
//! historical `START_UP_TASKS` switch) or from a TOML file. Every section
//! has defaults, so a file only needs the keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::notifications::{Severity, WebhookConfig};
use crate::scheduler::RestartPolicy;
use crate::source::DEFAULT_ENDPOINT;
use crate::storage::{DailyCreditPolicy, DuplicatePolicy, LedgerPolicy};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Crawl loop configuration
    pub crawler: CrawlerConfig,

    /// Activity source configuration
    pub source: SourceConfig,

    /// Score ledger policies
    pub ledger: LedgerPolicy,

    /// Restart policy for the crawl loop
    pub supervisor: RestartPolicy,

    /// Operator notifications
    pub notifications: NotificationsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/llc.db"),
        }
    }
}

/// Crawl loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seconds between tick starts
    pub interval_secs: u64,

    /// Recent submissions requested per user per tick
    pub submission_limit: usize,

    /// Start the loop as soon as the process is up
    pub start_on_startup: bool,

    /// Offset from UTC used to decide "today" and "this month"
    pub utc_offset_hours: i32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            submission_limit: 20,
            start_on_startup: false,
            utc_offset_hours: 0,
        }
    }
}

/// Activity source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// GraphQL endpoint
    pub endpoint: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub request_timeout_secs: u64,

    /// Client-side rate limit
    pub requests_per_second: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 30,
            requests_per_second: 2,
        }
    }
}

/// Operator notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Chat webhook; notifications only go to the log when unset
    pub webhook_url: Option<String>,

    /// Display name for webhook posts
    pub webhook_username: String,

    /// Lowest severity posted to the webhook
    pub min_severity: Severity,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_username: "llc-crawler".to_string(),
            min_severity: Severity::Warning,
        }
    }
}

impl NotificationsConfig {
    /// Webhook sink configuration, when a webhook is set
    pub fn webhook(&self) -> Option<WebhookConfig> {
        self.webhook_url.as_ref().map(|url| {
            WebhookConfig::new(url.clone())
                .with_username(self.webhook_username.clone())
                .with_min_severity(self.min_severity)
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("LLC_SQLITE_PATH") {
            config.database.sqlite_path = path.into();
        }

        let crawler = &mut config.crawler;
        crawler.interval_secs =
            env_parse("LLC_TICK_INTERVAL_SECS").unwrap_or(crawler.interval_secs);
        crawler.submission_limit =
            env_parse("LLC_SUBMISSION_LIMIT").unwrap_or(crawler.submission_limit);
        crawler.start_on_startup = env_flag("LLC_START_ON_STARTUP")
            .or_else(|| env_flag("START_UP_TASKS"))
            .unwrap_or(crawler.start_on_startup);
        crawler.utc_offset_hours =
            env_parse("LLC_UTC_OFFSET_HOURS").unwrap_or(crawler.utc_offset_hours);

        let source = &mut config.source;
        if let Ok(endpoint) = std::env::var("LLC_SOURCE_ENDPOINT") {
            source.endpoint = endpoint;
        }
        source.request_timeout_secs =
            env_parse("LLC_REQUEST_TIMEOUT").unwrap_or(source.request_timeout_secs);
        source.requests_per_second =
            env_parse("LLC_REQUESTS_PER_SECOND").unwrap_or(source.requests_per_second);

        if let Ok(value) = std::env::var("LLC_DAILY_CREDIT") {
            config.ledger.daily_credit = match value.trim().to_ascii_lowercase().as_str() {
                "always" => DailyCreditPolicy::Always,
                "designated_only" | "designated" => DailyCreditPolicy::DesignatedOnly,
                other => anyhow::bail!("LLC_DAILY_CREDIT: unknown policy '{other}'"),
            };
        }
        if let Ok(value) = std::env::var("LLC_DUPLICATES") {
            config.ledger.duplicates = match value.trim().to_ascii_lowercase().as_str() {
                "allow" => DuplicatePolicy::Allow,
                "skip" => DuplicatePolicy::Skip,
                other => anyhow::bail!("LLC_DUPLICATES: unknown policy '{other}'"),
            };
        }

        let supervisor = &mut config.supervisor;
        if let Ok(value) = std::env::var("LLC_MAX_CONSECUTIVE_FAILURES") {
            let value = value.trim();
            supervisor.max_consecutive_failures = if value.eq_ignore_ascii_case("unlimited") {
                None
            } else {
                Some(value.parse().with_context(|| {
                    format!(
                        "LLC_MAX_CONSECUTIVE_FAILURES: expected a count or 'unlimited', \
                         got '{value}'"
                    )
                })?)
            };
        }
        supervisor.base_delay_ms =
            env_parse("LLC_RESTART_BASE_DELAY_MS").unwrap_or(supervisor.base_delay_ms);
        supervisor.max_delay_ms =
            env_parse("LLC_RESTART_MAX_DELAY_MS").unwrap_or(supervisor.max_delay_ms);

        let notifications = &mut config.notifications;
        notifications.webhook_url = std::env::var("LLC_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        if let Ok(username) = std::env::var("LLC_WEBHOOK_USERNAME") {
            notifications.webhook_username = username;
        }
        notifications.min_severity =
            env_parse("LLC_WEBHOOK_MIN_SEVERITY").unwrap_or(notifications.min_severity);

        if let Ok(level) = std::env::var("LLC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("LLC_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }

        if self.crawler.submission_limit == 0 {
            anyhow::bail!("submission_limit must be greater than 0");
        }

        if !(-23..=23).contains(&self.crawler.utc_offset_hours) {
            anyhow::bail!("utc_offset_hours must be between -23 and 23");
        }

        if self.source.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        self.supervisor
            .validate()
            .context("invalid supervisor restart policy")?;

        if let Some(webhook) = self.notifications.webhook() {
            webhook.validate().map_err(anyhow::Error::msg)?;
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Get tick interval as Duration
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.crawler.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_KEYS: &[&str] = &[
        "LLC_SQLITE_PATH",
        "LLC_TICK_INTERVAL_SECS",
        "LLC_START_ON_STARTUP",
        "START_UP_TASKS",
        "LLC_DAILY_CREDIT",
        "LLC_DUPLICATES",
        "LLC_MAX_CONSECUTIVE_FAILURES",
        "LLC_WEBHOOK_URL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.crawler.submission_limit, 20);
        assert_eq!(config.ledger, LedgerPolicy::default());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.crawler.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notifications.webhook_url = Some("not-a-url".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "yaml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[crawler]
interval_secs = 30

[ledger]
duplicates = "skip"

[supervisor]
max_consecutive_failures = 3
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.crawler.interval_secs, 30);
        assert_eq!(config.crawler.submission_limit, 20);
        assert_eq!(config.ledger.duplicates, DuplicatePolicy::Skip);
        assert_eq!(config.supervisor.max_consecutive_failures, Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("LLC_SQLITE_PATH", "/tmp/llc-test.db");
        std::env::set_var("LLC_TICK_INTERVAL_SECS", "5");
        std::env::set_var("START_UP_TASKS", "True");
        std::env::set_var("LLC_DAILY_CREDIT", "designated_only");
        std::env::set_var("LLC_MAX_CONSECUTIVE_FAILURES", "4");

        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.database.sqlite_path, PathBuf::from("/tmp/llc-test.db"));
        assert_eq!(config.crawler.interval_secs, 5);
        assert!(config.crawler.start_on_startup);
        assert_eq!(config.ledger.daily_credit, DailyCreditPolicy::DesignatedOnly);
        assert_eq!(config.supervisor.max_consecutive_failures, Some(4));
        assert!(config.notifications.webhook().is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_policy() {
        clear_env();
        std::env::set_var("LLC_DUPLICATES", "sometimes");
        let result = Config::from_env();
        clear_env();

        assert!(result.is_err());
    }
}
