//! Crawl scheduler and its supervisor loop

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::{SchedulerError, SchedulerResult};
use super::job::{CrawlJob, TickReport};
use super::policy::RestartPolicy;
use crate::notifications::{Notification, Notifier, Severity};

/// Default time between tick starts
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
    /// A tick failed; waiting out the restart backoff
    Recovering,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Recovering => "recovering",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler status information
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub ticks_completed: u64,
    pub failed_ticks: u64,
    pub restarts: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_report: Option<TickReport>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Stopped,
            ticks_completed: 0,
            failed_ticks: 0,
            restarts: 0,
            consecutive_failures: 0,
            last_error: None,
            last_tick_at: None,
            last_report: None,
        }
    }
}

impl SchedulerStatus {
    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Crawl Scheduler Status\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("State: {}\n", self.state));
        output.push_str(&format!("Ticks Completed: {}\n", self.ticks_completed));
        output.push_str(&format!("Failed Ticks: {}\n", self.failed_ticks));
        output.push_str(&format!("Restarts: {}\n", self.restarts));

        if let Some(at) = self.last_tick_at {
            output.push_str(&format!("Last Tick: {}\n", at.to_rfc3339()));
        }
        if let Some(err) = &self.last_error {
            output.push_str(&format!("Last Error: {err}\n"));
        }

        output
    }
}

struct Control {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a [`CrawlJob`] on a fixed interval under a [`RestartPolicy`]
///
/// Ticks never overlap: a long tick delays the next one. `stop()` waits for
/// the tick in progress to finish.
///
/// [`SchedulerStatus::state`] is the only record of whether the loop is alive.
/// The supervisor writes `Stopped` as its last action, and `start`, `stop` and
/// `is_running` all read it.
pub struct CrawlScheduler {
    job: Arc<dyn CrawlJob>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    policy: RestartPolicy,
    status: Arc<RwLock<SchedulerStatus>>,
    control: Mutex<Option<Control>>,
}

impl CrawlScheduler {
    pub fn new(job: Arc<dyn CrawlJob>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            job,
            notifier,
            interval: DEFAULT_TICK_INTERVAL,
            policy: RestartPolicy::default(),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            control: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the supervisor loop
    pub async fn start(&self) -> SchedulerResult<()> {
        let mut control = self.control.lock().await;
        if self.is_running().await {
            return Err(SchedulerError::AlreadyRunning);
        }

        if self.interval.is_zero() {
            return Err(SchedulerError::invalid_config("interval", "must be greater than 0"));
        }
        self.policy.validate()?;

        {
            let mut status = self.status.write().await;
            status.state = SchedulerState::Running;
            status.consecutive_failures = 0;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let supervisor = Supervisor {
            job: self.job.clone(),
            notifier: self.notifier.clone(),
            interval: self.interval,
            policy: self.policy.clone(),
            status: self.status.clone(),
        };
        let handle = tokio::spawn(supervisor.run(stop_rx));
        // A supervisor that gave up on its own has already written `Stopped`
        *control = Some(Control { stop_tx, handle });

        tracing::info!(
            job = self.job.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Crawl scheduler started"
        );
        Ok(())
    }

    /// Stop the loop after the tick in progress, if any
    pub async fn stop(&self) -> SchedulerResult<()> {
        let mut control = self.control.lock().await;
        if !self.is_running().await {
            *control = None;
            return Err(SchedulerError::NotRunning);
        }
        let Some(c) = control.take() else {
            return Err(SchedulerError::NotRunning);
        };

        // The supervisor may exit on its own between the check and the send
        let _ = c.stop_tx.send(true);
        let joined = c.handle.await;
        self.status.write().await.state = SchedulerState::Stopped;
        joined?;

        tracing::info!(job = self.job.name(), "Crawl scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.status.read().await.state != SchedulerState::Stopped
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }
}

struct Supervisor {
    job: Arc<dyn CrawlJob>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    policy: RestartPolicy,
    status: Arc<RwLock<SchedulerStatus>>,
}

impl Supervisor {
    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }

            let outcome = AssertUnwindSafe(self.job.run_tick()).catch_unwind().await;
            let error = match outcome {
                Ok(Ok(report)) => {
                    self.record_success(report).await;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            let failures = self.record_failure(&error).await;
            tracing::error!(job = self.job.name(), failures, error = %error, "Crawl tick failed");
            self.notifier
                .alert(&format!("Crawl job '{}' failed: {error}", self.job.name()));

            if self.policy.should_give_up(failures) {
                let message = format!(
                    "Crawl job '{}' failed {failures} times in a row; scheduler stopped",
                    self.job.name()
                );
                tracing::error!("{message}");
                self.notifier.notify(Notification::alert(Severity::Critical, message));
                break;
            }

            self.status.write().await.state = SchedulerState::Recovering;
            let delay = self.policy.delay_for(failures);
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            {
                let mut status = self.status.write().await;
                status.state = SchedulerState::Running;
                status.restarts += 1;
            }
            tracing::warn!(
                job = self.job.name(),
                delay_ms = delay.as_millis() as u64,
                "Crawl loop restarted"
            );
            ticker.reset_immediately();
        }

        self.status.write().await.state = SchedulerState::Stopped;
    }

    async fn record_success(&self, report: TickReport) {
        let mut status = self.status.write().await;
        status.ticks_completed += 1;
        status.consecutive_failures = 0;
        status.last_tick_at = Some(Utc::now());
        status.last_report = Some(report);
    }

    async fn record_failure(&self, error: &str) -> u32 {
        let mut status = self.status.write().await;
        status.failed_ticks += 1;
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(error.to_string());
        status.last_tick_at = Some(Utc::now());
        status.consecutive_failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
