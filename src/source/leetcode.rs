//! LeetCode GraphQL client
//!
//! Uses the public `recentAcSubmissionList` query. The endpoint is public and
//! unauthenticated; it rate limits aggressively, so every request waits on a
//! client-side limiter first.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde::Deserialize;

use super::{SourceError, SubmissionSource};
use crate::config::SourceConfig;
use crate::models::RecentSubmission;

pub const DEFAULT_ENDPOINT: &str = "https://leetcode.com/graphql";

const RECENT_AC_QUERY: &str = "\
query recentAcSubmissions($username: String!, $limit: Int!) {
  recentAcSubmissionList(username: $username, limit: $limit) {
    id
    titleSlug
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<RecentAcData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentAcData {
    recent_ac_submission_list: Option<Vec<RecentAcItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentAcItem {
    id: String,
    title_slug: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Client for the judge's GraphQL API
pub struct LeetCodeClient {
    client: Client,
    endpoint: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl LeetCodeClient {
    /// Create a client for `endpoint`
    ///
    /// A `timeout_secs` of 0 disables the request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        timeout_secs: u64,
        requests_per_second: u32,
    ) -> Result<Self, SourceError> {
        let mut builder =
            Client::builder().user_agent(concat!("llc-crawler/", env!("CARGO_PKG_VERSION")));
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let client = builder.build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            rate_limiter,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        Self::new(
            config.endpoint.clone(),
            config.request_timeout_secs,
            config.requests_per_second,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch recent accepted submissions, distinguishing failures from "no data"
    ///
    /// `Ok(None)` means the judge answered but had no list for the handle
    /// (unknown user, GraphQL error).
    pub async fn fetch_recent(
        &self,
        handle: &str,
        limit: usize,
    ) -> Result<Option<Vec<RecentSubmission>>, SourceError> {
        self.rate_limiter.until_ready().await;

        let body = serde_json::json!({
            "operationName": "recentAcSubmissions",
            "query": RECENT_AC_QUERY,
            "variables": { "username": handle, "limit": limit },
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidPayload(e.to_string()))?;

        if let Some(err) = payload.errors.first() {
            tracing::debug!(handle, error = %err.message, "GraphQL error for handle");
        }

        let Some(items) = payload.data.and_then(|d| d.recent_ac_submission_list) else {
            return Ok(None);
        };

        let submissions = items
            .into_iter()
            .take(limit)
            .map(|item| {
                let id = item.id.parse::<i64>().map_err(|_| {
                    SourceError::InvalidPayload(format!("non-numeric submission id {:?}", item.id))
                })?;
                Ok(RecentSubmission::new(id, item.title_slug))
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Some(submissions))
    }
}

#[async_trait]
impl SubmissionSource for LeetCodeClient {
    async fn recent_accepted_submissions(
        &self,
        handle: &str,
        limit: usize,
    ) -> Option<Vec<RecentSubmission>> {
        match self.fetch_recent(handle, limit).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(handle, error = %e, "Failed to fetch recent submissions");
                None
            }
        }
    }
}
