//! Invariant verification.
//!
//! A battery of configurable checks runs against every agent response.
//! Deterministic checks (substring, regex, latency, JSON shape) are pure;
//! semantic similarity goes through the [`Embedder`] port; safety checks
//! cover PII leakage and refusal behavior.

pub mod deterministic;
pub mod safety;
pub mod semantic;
pub mod verifier;

use async_trait::async_trait;

pub use deterministic::{ContainsChecker, LatencyChecker, RegexChecker, ValidJsonChecker};
pub use safety::{PiiChecker, RefusalChecker};
pub use semantic::{cosine_similarity, Embedder, HttpEmbedder, SimilarityChecker};
pub use verifier::{CheckError, CheckOutcome, InvariantVerifier, Verdict, VerifierBuildError};

/// Check kind tag recorded when the agent invocation itself failed.
pub const AGENT_ERROR_KIND: &str = "agent_error";

/// One configured check in the battery.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Kind tag recorded in outcomes, e.g. `contains`.
    fn kind(&self) -> &'static str;

    /// Evaluates the check against a response. Errors are contained by
    /// the verifier and reported as failed outcomes.
    async fn check(&self, output: &str, latency_ms: f64) -> Result<CheckOutcome, CheckError>;
}
