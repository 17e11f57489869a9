//! Restart policy for the crawl supervisor

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

/// How the supervisor reacts to failed ticks
///
/// After each failure the loop waits `base_delay_ms * backoff_multiplier^(n-1)`
/// (capped at `max_delay_ms`) before restarting, where `n` is the number of
/// consecutive failures. A successful tick resets `n`. The default restarts
/// forever; setting `max_consecutive_failures` makes the supervisor stop once
/// `n` exceeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    /// Written as a count or `"unlimited"` in config files
    #[serde(with = "restart_bound")]
    pub max_consecutive_failures: Option<u32>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: None,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RestartPolicy {
    /// Default backoff, giving up after more than `max` failures in a row
    pub fn bounded(max: u32) -> Self {
        Self {
            max_consecutive_failures: Some(max),
            ..Default::default()
        }
    }

    /// Restart immediately, at most `max` times in a row
    pub fn immediate(max: Option<u32>) -> Self {
        Self {
            max_consecutive_failures: max,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Backoff before the restart that follows the `failures`-th consecutive failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        let delay_ms = if failures == 0 {
            0
        } else {
            let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
            let exponential = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }

    /// Whether `failures` consecutive failures exhaust the policy
    pub fn should_give_up(&self, failures: u32) -> bool {
        self.max_consecutive_failures
            .is_some_and(|max| failures > max)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(SchedulerError::invalid_config(
                "backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(SchedulerError::invalid_config(
                "base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }

        Ok(())
    }
}

mod restart_bound {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const UNLIMITED: &str = "unlimited";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bound {
        Count(u32),
        Word(String),
    }

    pub fn serialize<S: Serializer>(
        bound: &Option<u32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bound {
            Some(max) => serializer.serialize_u32(*max),
            None => serializer.serialize_str(UNLIMITED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        match Bound::deserialize(deserializer)? {
            Bound::Count(max) => Ok(Some(max)),
            Bound::Word(word) if word.eq_ignore_ascii_case(UNLIMITED) => Ok(None),
            Bound::Word(word) => Err(D::Error::custom(format!(
                "expected a failure count or \"{UNLIMITED}\", got \"{word}\""
            ))),
        }
    }
}
