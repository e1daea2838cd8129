//! Reporter port for run observability.
//!
//! Reporters are optional; the orchestrator works without one.

use tracing::info;

use crate::results::RunResults;

/// Receives progress events during a run.
pub trait ProgressReporter: Send + Sync {
    /// Called after each mutation completes execution.
    fn on_progress(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    /// Called once with the finished results.
    fn on_run_complete(&self, results: &RunResults) {
        let _ = results;
    }
}

/// Reporter that logs progress through `tracing`.
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn on_progress(&self, completed: usize, total: usize) {
        info!(completed, total, "mutation executed");
    }

    fn on_run_complete(&self, results: &RunResults) {
        info!(
            total = results.statistics.total,
            passed = results.statistics.passed,
            failed = results.statistics.failed,
            score = format!("{:.3}", results.statistics.robustness_score),
            "run complete"
        );
    }
}
