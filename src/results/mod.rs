//! Result model: per-mutation records and run-level output.
//!
//! Everything here is plain serializable data. Reporters consume it;
//! nothing mutates it after creation.

pub mod stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::invariants::CheckOutcome;
use crate::mutations::Mutation;

pub use stats::{KindStatistics, RunStatistics};

/// Outcome of one executed mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    /// The golden prompt the mutation was derived from.
    pub original: String,
    /// The mutation that was sent to the agent.
    pub mutation: Mutation,
    /// The agent's textual response; empty on invocation failure.
    pub response_output: String,
    /// Wall-clock latency of the agent call in milliseconds.
    pub latency_ms: f64,
    /// Whether every check passed.
    pub passed: bool,
    /// Per-check outcomes, in battery order.
    pub checks: Vec<CheckOutcome>,
    /// Invocation failure description, when the agent call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete output of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    /// The configuration the run executed with.
    pub config_snapshot: RunConfig,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Per-mutation results, in queue order.
    pub mutations: Vec<MutationResult>,
    pub statistics: RunStatistics,
}

impl RunResults {
    /// The weighted robustness score of the run.
    pub fn robustness_score(&self) -> f64 {
        self.statistics.robustness_score
    }
}
