//! Agent adapters: a uniform invocation surface over heterogeneous agents.
//!
//! Every backend is reached through [`AgentAdapter::invoke_timed`], which
//! measures wall-clock latency around the whole call, retries included.
//! Invocation failures are data (`AgentResponse::error`), never panics or
//! propagated errors.

pub mod chain;
pub mod http;
pub mod inproc;

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};

pub use chain::{ChainAgent, ChainRunnable};
pub use http::HttpAgent;
pub use inproc::InprocAgent;

/// Errors raised while wiring an adapter, before any invocation happens.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("chain object exposes no usable entry point")]
    NoChainEntryPoint,

    #[error("agent kind '{0:?}' cannot be constructed from configuration; embed promptstorm as a library and pass the object directly")]
    NotConstructibleFromConfig(AgentKind),
}

/// Structured response from one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The agent's textual output; empty on failure.
    pub output: String,
    /// Wall-clock latency in milliseconds, including retries.
    pub latency_ms: f64,
    /// The raw response body, when one was obtained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
    /// Failure description; `None` means success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// A successful response. Latency is filled in by the adapter when
    /// left at zero.
    pub fn success(output: impl Into<String>, raw: Option<serde_json::Value>) -> Self {
        Self {
            output: output.into(),
            latency_ms: 0.0,
            raw,
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            latency_ms: 0.0,
            raw: None,
            error: Some(error.into()),
        }
    }

    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A black-box agent under test.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Invokes the agent. Failures are encoded in the response, not
    /// returned as errors.
    async fn invoke(&self, input: &str) -> AgentResponse;
}

/// Wraps an agent backend with latency measurement.
///
/// The adapter holds no cross-call state; it is safe to share across
/// concurrent invocations as long as the backend is.
pub struct AgentAdapter {
    inner: Box<dyn Agent>,
}

impl AgentAdapter {
    pub fn new(inner: Box<dyn Agent>) -> Self {
        Self { inner }
    }

    /// Builds an adapter from configuration.
    ///
    /// Only `http` agents are constructible this way; in-process and chain
    /// agents are handed over by the embedding host.
    pub fn from_config(config: &AgentConfig) -> Result<Self, WiringError> {
        match config.kind {
            AgentKind::Http => Ok(Self::new(Box::new(HttpAgent::from_config(config)))),
            kind => Err(WiringError::NotConstructibleFromConfig(kind)),
        }
    }

    /// Invokes the agent and stamps wall-clock latency on the response.
    ///
    /// Latency covers the entire call including retries; on failure it
    /// reflects elapsed time until abandonment.
    pub async fn invoke_timed(&self, input: &str) -> AgentResponse {
        let start = Instant::now();
        let mut response = self.inner.invoke(input).await;
        if response.latency_ms == 0.0 {
            response.latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        }
        response
    }
}

/// Extracts the agent's textual output from a JSON body: the `output`
/// key, then `response`, falling back to the stringified body.
pub(crate) fn extract_output(body: &serde_json::Value) -> String {
    for key in ["output", "response"] {
        if let Some(value) = body.get(key) {
            return match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
    }
    body.to_string()
}
