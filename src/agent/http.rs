//! HTTP agent backend.
//!
//! POSTs `{"input": ...}` to the configured endpoint. Transport failures
//! (timeouts, connection resets) are retried with linear backoff; HTTP
//! error statuses are not retried and become failed responses carrying
//! the status code and body.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{extract_output, Agent, AgentResponse};
use crate::config::AgentConfig;

/// Base delay of the linear retry backoff.
const BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Agent reached over HTTP.
pub struct HttpAgent {
    endpoint: String,
    headers: BTreeMap<String, String>,
    retries: u32,
    client: Client,
}

impl HttpAgent {
    /// Creates an HTTP agent with an explicit per-call timeout.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        headers: BTreeMap<String, String>,
        retries: u32,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers,
            retries,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates an HTTP agent from the agent section of a run config.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
            config.headers.clone(),
            config.retries,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn invoke(&self, input: &str) -> AgentResponse {
        let start = Instant::now();
        let payload = serde_json::json!({ "input": input });
        let mut last_error = String::new();

        for attempt in 0..=self.retries {
            let mut request = self.client.post(&self.endpoint).json(&payload);
            for (name, value) in &self.headers {
                request = request.header(name, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        // Error statuses are the agent's answer; retrying
                        // would not change it.
                        let body = response.text().await.unwrap_or_default();
                        let mut failed =
                            AgentResponse::failure(format!("HTTP {}: {}", status.as_u16(), body));
                        failed.latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                        return failed;
                    }

                    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                    let text = response.text().await.unwrap_or_default();

                    let (output, raw) = match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(body) => (extract_output(&body), Some(body)),
                        Err(_) => (text, None),
                    };

                    let mut ok = AgentResponse::success(output, raw);
                    ok.latency_ms = latency_ms;
                    return ok;
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.retries {
                        let backoff = BACKOFF_STEP * (attempt + 1);
                        debug!(
                            attempt,
                            error = %last_error,
                            backoff_ms = backoff.as_millis() as u64,
                            "agent transport error, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        warn!(endpoint = %self.endpoint, error = %last_error, "agent unreachable after retries");
        let mut failed = AgentResponse::failure(last_error);
        failed.latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        failed
    }
}
