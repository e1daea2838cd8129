//! Terminal summary rendering.

use std::fmt::Write as _;

use crate::results::RunResults;

/// Renders a plain-text summary of a finished run.
pub fn render_summary(results: &RunResults) -> String {
    let stats = &results.statistics;
    let mut out = String::new();

    let _ = writeln!(out, "Robustness score: {:.1}%", stats.robustness_score * 100.0);
    let _ = writeln!(
        out,
        "Mutations: {} total, {} passed, {} failed",
        stats.total, stats.passed, stats.failed
    );
    let _ = writeln!(
        out,
        "Latency: mean {:.0} ms, p50 {:.0} ms, p95 {:.0} ms, p99 {:.0} ms",
        stats.avg_latency_ms, stats.p50_latency_ms, stats.p95_latency_ms, stats.p99_latency_ms
    );
    let _ = writeln!(out, "Duration: {:.1}s", stats.duration_seconds);

    if !stats.by_kind.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<18} {:>6} {:>8} {:>10}", "Kind", "Total", "Passed", "Pass rate");
        for kind_stats in &stats.by_kind {
            let _ = writeln!(
                out,
                "{:<18} {:>6} {:>8} {:>9.1}%",
                kind_stats.kind.display_name(),
                kind_stats.total,
                kind_stats.passed,
                kind_stats.pass_rate * 100.0
            );
        }
    }

    let failures: Vec<_> = results.mutations.iter().filter(|m| !m.passed).collect();
    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed mutations:");
        for failure in failures {
            let reason = failure
                .checks
                .iter()
                .find(|c| !c.passed)
                .map(|c| c.detail.as_str())
                .unwrap_or("unknown");
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                failure.mutation.kind, failure.mutation.mutated, reason
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, AgentKind, ModelConfig, MutationConfig, RunConfig};
    use crate::invariants::CheckOutcome;
    use crate::mutations::{Mutation, MutationKind};
    use crate::results::{MutationResult, RunStatistics};
    use chrono::Utc;

    fn sample_results() -> RunResults {
        let mutations = vec![
            MutationResult {
                original: "Book a flight".to_string(),
                mutation: Mutation::new("Book a flight", "fly me there", MutationKind::Paraphrase),
                response_output: "ok".to_string(),
                latency_ms: 120.0,
                passed: true,
                checks: Vec::new(),
                error: None,
            },
            MutationResult {
                original: "Book a flight".to_string(),
                mutation: Mutation::new("Book a flight", "bok a flite", MutationKind::Noise),
                response_output: String::new(),
                latency_ms: 80.0,
                passed: false,
                checks: vec![CheckOutcome::failed("contains", "'flight' not found")],
                error: None,
            },
        ];
        let statistics = RunStatistics::from_results(&mutations, &MutationConfig::default(), 0.4);

        RunResults {
            config_snapshot: RunConfig {
                agent: AgentConfig {
                    kind: AgentKind::Http,
                    endpoint: "http://localhost:8000".to_string(),
                    timeout_ms: 30_000,
                    headers: Default::default(),
                    retries: 2,
                },
                model: ModelConfig {
                    backend: "openai".to_string(),
                    name: "test".to_string(),
                    temperature: 0.8,
                    max_tokens: 256,
                    timeout_ms: 60_000,
                    api_base: String::new(),
                    api_key_env: None,
                },
                mutations: Default::default(),
                invariants: Vec::new(),
                golden_prompts: vec!["Book a flight".to_string()],
                advanced: Default::default(),
                output: Default::default(),
            },
            started_at: Utc::now(),
            completed_at: Utc::now(),
            mutations,
            statistics,
        }
    }

    #[test]
    fn test_summary_contains_score_and_breakdown() {
        let summary = render_summary(&sample_results());

        assert!(summary.contains("Robustness score"));
        assert!(summary.contains("2 total, 1 passed, 1 failed"));
        assert!(summary.contains("Paraphrase"));
        assert!(summary.contains("Noise"));
        assert!(summary.contains("Failed mutations:"));
        assert!(summary.contains("'flight' not found"));
    }

    #[test]
    fn test_summary_for_empty_run() {
        let mut results = sample_results();
        results.mutations.clear();
        results.statistics = RunStatistics::default();

        let summary = render_summary(&results);
        assert!(summary.contains("0 total"));
        assert!(!summary.contains("Failed mutations:"));
    }
}
