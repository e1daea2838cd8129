//! Error types for promptstorm subsystems.

use thiserror::Error;

/// Errors that can occur when talking to the attacker-model backend.
///
/// The first four variants are the failure kinds of the backend port;
/// `MissingApiKey` is a wiring error for clients that need credentials.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM returned an empty completion")]
    Empty,

    #[error("LLM rejected the request ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("Missing API key: environment variable {0} not set")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}
