//! In-process agent backend.
//!
//! Wraps a host-provided async function. Errors returned by the handler
//! become failed responses; there is no retry.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{Agent, AgentResponse};

/// Host-provided handler: input prompt in, output text or error out.
pub type InprocHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// Agent backed by an in-process callable.
pub struct InprocAgent {
    handler: InprocHandler,
}

impl InprocAgent {
    pub fn new(handler: InprocHandler) -> Self {
        Self { handler }
    }

    /// Convenience constructor wrapping an async closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, String>> + Send + 'static,
    {
        let handler: InprocHandler = Arc::new(move |input| Box::pin(f(input)));
        Self::new(handler)
    }
}

#[async_trait]
impl Agent for InprocAgent {
    async fn invoke(&self, input: &str) -> AgentResponse {
        match (self.handler)(input.to_string()).await {
            Ok(output) => AgentResponse::success(output, None),
            Err(e) => AgentResponse::failure(e),
        }
    }
}
