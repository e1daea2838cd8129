//! Verdict types and the invariant verifier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::deterministic::{ContainsChecker, LatencyChecker, RegexChecker, ValidJsonChecker};
use super::safety::{PiiChecker, RefusalChecker};
use super::semantic::{Embedder, SimilarityChecker};
use super::Checker;
use crate::config::InvariantSpec;

/// Errors raised by a checker at evaluation time.
///
/// These never abort a run; the verifier converts them into failed
/// outcomes so the report surfaces them.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("{0}")]
    Internal(String),
}

/// Errors raised while building the checker battery.
#[derive(Debug, Error)]
pub enum VerifierBuildError {
    #[error("invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("semantic_similarity invariant configured but no embedder was provided")]
    MissingEmbedder,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Checker kind tag, e.g. `contains` or `latency`.
    pub kind: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn passed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn failed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Aggregated result of a full battery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Logical AND over all check outcomes; `true` for an empty battery.
    pub all_passed: bool,
    pub checks: Vec<CheckOutcome>,
}

/// Runs a battery of checks against one agent response.
///
/// Checks run in registration order and all of them always run, so a
/// report shows every violated invariant rather than just the first.
pub struct InvariantVerifier {
    checkers: Vec<Box<dyn Checker>>,
}

impl InvariantVerifier {
    pub fn new(checkers: Vec<Box<dyn Checker>>) -> Self {
        Self { checkers }
    }

    /// Builds the battery from configured specs.
    ///
    /// An embedder is required only when a `semantic_similarity` spec is
    /// present.
    pub fn from_specs(
        specs: &[InvariantSpec],
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, VerifierBuildError> {
        let mut checkers: Vec<Box<dyn Checker>> = Vec::with_capacity(specs.len());

        for spec in specs {
            let checker: Box<dyn Checker> = match spec {
                InvariantSpec::Contains {
                    substring,
                    case_sensitive,
                } => Box::new(ContainsChecker::new(substring.clone(), *case_sensitive)),
                InvariantSpec::Regex { pattern, flags } => {
                    Box::new(RegexChecker::new(pattern, flags).map_err(|e| {
                        VerifierBuildError::InvalidRegex {
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        }
                    })?)
                }
                InvariantSpec::Latency { max_ms } => Box::new(LatencyChecker::new(*max_ms)),
                InvariantSpec::ValidJson { schema } => {
                    Box::new(ValidJsonChecker::new(schema.clone()))
                }
                InvariantSpec::SemanticSimilarity {
                    reference,
                    min_similarity,
                    model: _,
                } => {
                    let embedder = embedder
                        .as_ref()
                        .cloned()
                        .ok_or(VerifierBuildError::MissingEmbedder)?;
                    Box::new(SimilarityChecker::new(
                        reference.clone(),
                        *min_similarity,
                        embedder,
                    ))
                }
                InvariantSpec::ExcludesPii { categories } => {
                    Box::new(PiiChecker::new(categories.clone()))
                }
                InvariantSpec::Refusal {
                    refusal_markers,
                    require_refusal,
                } => Box::new(RefusalChecker::new(refusal_markers.clone(), *require_refusal)),
            };
            checkers.push(checker);
        }

        Ok(Self::new(checkers))
    }

    /// Number of configured checks.
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Runs every check against the response.
    pub async fn verify(&self, output: &str, latency_ms: f64) -> Verdict {
        let mut checks = Vec::with_capacity(self.checkers.len());

        for checker in &self.checkers {
            let outcome = match checker.check(output, latency_ms).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(kind = checker.kind(), error = %e, "checker failed to evaluate");
                    CheckOutcome::failed(checker.kind(), e.to_string())
                }
            };
            checks.push(outcome);
        }

        Verdict {
            all_passed: checks.iter().all(|c| c.passed),
            checks,
        }
    }
}
