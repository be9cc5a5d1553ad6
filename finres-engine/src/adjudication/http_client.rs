// HTTP Reasoning Client - JSON POST to a Configured Adjudication Endpoint
//
// Request body carries the structured request plus a rendered prompt. The
// response body is the reply JSON, optionally wrapped in a code fence.

use crate::adjudication::reasoning::{
    build_prompt, parse_reasoning_reply, AdjudicationRequest, ReasoningReply, ReasoningService,
};
use crate::config::AdjudicationConfig;
use crate::error::ReasoningError;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ReasoningPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: String,
    request: &'a AdjudicationRequest,
}

pub struct HttpReasoningClient {
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpReasoningClient {
    /// Build a client from adjudication settings
    ///
    /// # Returns
    /// * `None` when no endpoint is configured
    /// * `Err` when the HTTP client cannot be built
    pub fn from_config(config: &AdjudicationConfig) -> Result<Option<Self>, ReasoningError> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        // The adjudicator enforces the hard timeout; this only bounds a stuck socket
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Some(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn adjudicate(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<ReasoningReply, ReasoningError> {
        self.rate_limiter.until_ready().await;

        let payload = ReasoningPayload {
            model: self.model.as_deref(),
            prompt: build_prompt(request),
            request,
        };

        debug!(
            "POST {} ({} {} candidates)",
            self.endpoint,
            request.metric,
            request.candidates.len()
        );

        let mut builder = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReasoningError::Transport(format!(
                "reasoning endpoint returned {}",
                status
            )));
        }

        let body = response.text().await?;
        parse_reasoning_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_endpoint_means_no_client() {
        let client = HttpReasoningClient::from_config(&AdjudicationConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn test_endpoint_builds_client() {
        let config = AdjudicationConfig {
            endpoint: Some("http://127.0.0.1:9/adjudicate".to_string()),
            requests_per_second: 0,
            ..AdjudicationConfig::default()
        };
        let client = HttpReasoningClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/adjudicate");
        assert_eq!(client.name(), "http");
    }
}
