//! Chain-library agent backend.
//!
//! Chain objects from orchestration libraries expose different entry
//! points. Capability detection happens once, at construction: an object
//! with no usable entry point fails at wiring time rather than on every
//! call.

use std::sync::Arc;

use async_trait::async_trait;

use super::{extract_output, Agent, AgentResponse, WiringError};

/// Capability surface of a wrapped chain object.
///
/// `invoke` takes a JSON mapping (`{"input": ...}`) and may return a
/// mapping; `run` takes and returns bare text. Implementations override
/// the pair they actually support.
#[async_trait]
pub trait ChainRunnable: Send + Sync {
    fn supports_invoke(&self) -> bool {
        false
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let _ = input;
        Err("invoke entry point not supported".to_string())
    }

    fn supports_run(&self) -> bool {
        false
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let _ = input;
        Err("run entry point not supported".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEntry {
    Invoke,
    Run,
}

/// Agent backed by a chain object.
pub struct ChainAgent {
    chain: Arc<dyn ChainRunnable>,
    entry: ChainEntry,
}

impl ChainAgent {
    /// Probes the chain's entry points, preferring the mapping-based
    /// `invoke` over the text-based `run`.
    pub fn new(chain: Arc<dyn ChainRunnable>) -> Result<Self, WiringError> {
        let entry = if chain.supports_invoke() {
            ChainEntry::Invoke
        } else if chain.supports_run() {
            ChainEntry::Run
        } else {
            return Err(WiringError::NoChainEntryPoint);
        };
        Ok(Self { chain, entry })
    }
}

#[async_trait]
impl Agent for ChainAgent {
    async fn invoke(&self, input: &str) -> AgentResponse {
        match self.entry {
            ChainEntry::Invoke => {
                let payload = serde_json::json!({ "input": input });
                match self.chain.invoke(payload).await {
                    Ok(result) => {
                        let output = match &result {
                            serde_json::Value::String(s) => s.clone(),
                            other => extract_output(other),
                        };
                        AgentResponse::success(output, Some(result))
                    }
                    Err(e) => AgentResponse::failure(e),
                }
            }
            ChainEntry::Run => match self.chain.run(input).await {
                Ok(output) => AgentResponse::success(output, None),
                Err(e) => AgentResponse::failure(e),
            },
        }
    }
}
