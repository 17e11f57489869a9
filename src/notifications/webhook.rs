//! Chat webhook sink
//!
//! Posts notifications to a chat-platform incoming webhook as
//! `{"content": ..., "username": ...}`. Delivery runs on a spawned task so the
//! store's commit path never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Notification, Notifier, Severity};

/// Chat platforms reject longer messages
const MAX_CONTENT_CHARS: usize = 2000;

/// Errors raised while delivering a webhook
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Invalid webhook configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Webhook sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Incoming webhook URL
    pub url: String,
    /// Display name for posted messages
    #[serde(default = "default_username")]
    pub username: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// First retry delay; doubles on every further attempt
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Notifications below this severity are not posted
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

fn default_username() -> String {
    "llc-crawler".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_min_severity() -> Severity {
    Severity::Warning
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: default_username(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_base_ms: default_retry_base_ms(),
            min_severity: default_min_severity(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_ms = retry_base_ms;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Posts notifications to a chat webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    config: Arc<WebhookConfig>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        config.validate().map_err(WebhookError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        let content: String = notification
            .format_message()
            .chars()
            .take(MAX_CONTENT_CHARS)
            .collect();

        serde_json::json!({
            "content": content,
            "username": self.config.username,
        })
    }

    /// Post one notification, retrying server errors with exponential backoff
    pub async fn deliver(&self, notification: &Notification) -> Result<(), WebhookError> {
        let payload = self.build_payload(notification);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.retry_base_ms.saturating_mul(1 << (attempt - 1).min(16));
                tokio::time::sleep(Duration::from_millis(delay)).await;
                tracing::debug!(
                    "Retrying webhook request (attempt {}/{})",
                    attempt + 1,
                    self.config.max_retries + 1
                );
            }

            match self.client.post(&self.config.url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Webhook delivered");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    last_error = Some(WebhookError::Status {
                        status: status.as_u16(),
                        body,
                    });

                    // Don't retry on client errors (4xx)
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => last_error = Some(WebhookError::Http(e)),
            }
        }

        Err(last_error
            .unwrap_or_else(|| WebhookError::InvalidConfig("no attempts made".to_string())))
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(&self, notification: Notification) {
        if notification.severity < self.config.min_severity {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = self.clone();
                handle.spawn(async move {
                    if let Err(e) = sink.deliver(&notification).await {
                        tracing::error!(
                            url = %sink.config.url,
                            error = %e,
                            "Failed to deliver webhook"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    title = %notification.title,
                    "No async runtime; webhook notification dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationKind;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_webhook_config_validation() {
        assert!(WebhookConfig::new("https://example.com/webhook").validate().is_ok());
        assert!(WebhookConfig::new("").validate().is_err());
        assert!(WebhookConfig::new("example.com/webhook").validate().is_err());

        let mut zero_timeout = WebhookConfig::new("https://example.com");
        zero_timeout.timeout_secs = 0;
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_payload_is_truncated() {
        let config = WebhookConfig::new("https://example.com/hook").with_username("bot");
        let sink = WebhookNotifier::new(config).unwrap();
        let n = Notification::alert(Severity::Warning, "x".repeat(5000));

        let payload = sink.build_payload(&n);
        assert_eq!(payload["username"], "bot");
        assert_eq!(payload["content"].as_str().unwrap().chars().count(), MAX_CONTENT_CHARS);
    }

    #[tokio::test]
    async fn test_deliver_posts_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({"username": "llc-crawler"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink =
            WebhookNotifier::new(WebhookConfig::new(format!("{}/hook", server.uri()))).unwrap();
        let n =
            Notification::new(NotificationKind::Alert, Severity::Warning, "Crawler error", "boom");

        sink.deliver(&n).await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let sink = WebhookNotifier::new(
            WebhookConfig::new(format!("{}/hook", server.uri())).with_retries(2, 5),
        )
        .unwrap();

        let err = sink
            .deliver(&Notification::alert(Severity::Critical, "down"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_deliver_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookNotifier::new(
            WebhookConfig::new(format!("{}/hook", server.uri())).with_retries(3, 5),
        )
        .unwrap();

        assert!(sink.deliver(&Notification::alert(Severity::Warning, "x")).await.is_err());
    }
}
