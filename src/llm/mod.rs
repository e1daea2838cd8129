//! Attacker-model backend port.
//!
//! The mutation engine talks to a language model through the [`LlmBackend`]
//! trait: one completion per call, with temperature and token limits chosen
//! by the caller. The shipped implementation speaks the OpenAI-compatible
//! chat-completions protocol.

pub mod openai;

use async_trait::async_trait;

pub use crate::error::LlmError;
pub use openai::OpenAiClient;

/// A backend that can complete a single prompt.
///
/// Implementations own their transport timeout; callers only pick sampling
/// parameters. Failures map onto the four kinds of [`LlmError`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Requests one completion for `prompt` and returns its text.
    async fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}
