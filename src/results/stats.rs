//! Run statistics, derived purely from the result list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MutationResult;
use crate::config::MutationConfig;
use crate::mutations::MutationKind;

/// Per-kind pass/fail breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindStatistics {
    pub kind: MutationKind,
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Weighted fraction of passed mutations, in `[0, 1]`.
    pub robustness_score: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    /// Per-kind subtotals, in canonical kind order.
    pub by_kind: Vec<KindStatistics>,
    /// Wall-clock duration from generation start to aggregation end.
    pub duration_seconds: f64,
}

impl RunStatistics {
    /// Computes statistics over a result list.
    ///
    /// Weights come from the config's override table, falling back to
    /// each kind's default. Latencies of failed invocations are included.
    pub fn from_results(
        results: &[MutationResult],
        mutations: &MutationConfig,
        duration_seconds: f64,
    ) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = total - passed;

        let total_weight: f64 = results
            .iter()
            .map(|r| mutations.weight_for(r.mutation.kind))
            .sum();
        let passed_weight: f64 = results
            .iter()
            .filter(|r| r.passed)
            .map(|r| mutations.weight_for(r.mutation.kind))
            .sum();
        let robustness_score = if total_weight > 0.0 {
            passed_weight / total_weight
        } else {
            0.0
        };

        let mut latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));
        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        let mut per_kind: BTreeMap<MutationKind, (usize, usize)> = BTreeMap::new();
        for result in results {
            let entry = per_kind.entry(result.mutation.kind).or_insert((0, 0));
            entry.0 += 1;
            if result.passed {
                entry.1 += 1;
            }
        }
        let by_kind = per_kind
            .into_iter()
            .map(|(kind, (total, passed))| KindStatistics {
                kind,
                total,
                passed,
                pass_rate: if total > 0 {
                    passed as f64 / total as f64
                } else {
                    0.0
                },
            })
            .collect();

        Self {
            total,
            passed,
            failed,
            robustness_score,
            avg_latency_ms,
            p50_latency_ms: percentile(&latencies, 50),
            p95_latency_ms: percentile(&latencies, 95),
            p99_latency_ms: percentile(&latencies, 99),
            by_kind,
            duration_seconds,
        }
    }
}

/// Nearest-rank percentile with low interpolation: index
/// `floor(p/100 * (n-1))` into the sorted array.
pub fn percentile(sorted: &[f64], p: u32) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (f64::from(p) / 100.0 * (sorted.len() - 1) as f64) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::Mutation;

    fn result(kind: MutationKind, passed: bool, latency_ms: f64) -> MutationResult {
        MutationResult {
            original: "original".to_string(),
            mutation: Mutation::new("original", format!("mutated {latency_ms}"), kind),
            response_output: "response".to_string(),
            latency_ms,
            passed,
            checks: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_percentile_low_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 50), 3.0);
        assert_eq!(percentile(&sorted, 95), 4.0);
        assert_eq!(percentile(&sorted, 99), 4.0);
        assert_eq!(percentile(&sorted, 100), 5.0);
        assert_eq!(percentile(&sorted, 0), 1.0);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 50), 0.0);
    }

    #[test]
    fn test_counts_and_score() {
        let results = vec![
            result(MutationKind::Paraphrase, true, 100.0),
            result(MutationKind::Paraphrase, false, 200.0),
            result(MutationKind::PromptInjection, true, 300.0),
        ];
        let stats = RunStatistics::from_results(&results, &MutationConfig::default(), 1.5);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
        // passed weight = 1.0 + 1.5, total weight = 1.0 + 1.0 + 1.5
        let expected = 2.5 / 3.5;
        assert!((stats.robustness_score - expected).abs() < 1e-9);
        assert!((stats.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((stats.duration_seconds - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weight_overrides_respected() {
        let mut config = MutationConfig::default();
        config.weights.insert(MutationKind::Paraphrase, 4.0);

        let results = vec![
            result(MutationKind::Paraphrase, true, 10.0),
            result(MutationKind::Noise, false, 20.0),
        ];
        let stats = RunStatistics::from_results(&results, &config, 0.1);

        let expected = 4.0 / 4.8;
        assert!((stats.robustness_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results() {
        let stats = RunStatistics::from_results(&[], &MutationConfig::default(), 0.0);

        assert_eq!(stats.total, 0);
        assert_eq!(stats.robustness_score, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert_eq!(stats.p99_latency_ms, 0.0);
        assert!(stats.by_kind.is_empty());
        assert!(stats.duration_seconds >= 0.0);
    }

    #[test]
    fn test_all_passed_scores_one() {
        let results = vec![
            result(MutationKind::Paraphrase, true, 1.0),
            result(MutationKind::Noise, true, 2.0),
            result(MutationKind::PromptInjection, true, 3.0),
        ];
        let stats = RunStatistics::from_results(&results, &MutationConfig::default(), 0.1);
        assert!((stats.robustness_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_failed_scores_zero() {
        let results = vec![
            result(MutationKind::Paraphrase, false, 1.0),
            result(MutationKind::Noise, false, 2.0),
        ];
        let stats = RunStatistics::from_results(&results, &MutationConfig::default(), 0.1);
        assert_eq!(stats.robustness_score, 0.0);
    }

    #[test]
    fn test_by_kind_breakdown() {
        let results = vec![
            result(MutationKind::Noise, true, 1.0),
            result(MutationKind::Noise, false, 2.0),
            result(MutationKind::Paraphrase, true, 3.0),
        ];
        let stats = RunStatistics::from_results(&results, &MutationConfig::default(), 0.1);

        assert_eq!(stats.by_kind.len(), 2);
        // Canonical order: paraphrase before noise.
        assert_eq!(stats.by_kind[0].kind, MutationKind::Paraphrase);
        assert_eq!(stats.by_kind[0].total, 1);
        assert!((stats.by_kind[0].pass_rate - 1.0).abs() < 1e-9);
        assert_eq!(stats.by_kind[1].kind, MutationKind::Noise);
        assert_eq!(stats.by_kind[1].total, 2);
        assert!((stats.by_kind[1].pass_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_failed_latencies_included() {
        let results = vec![
            result(MutationKind::Noise, true, 100.0),
            result(MutationKind::Noise, false, 900.0),
        ];
        let stats = RunStatistics::from_results(&results, &MutationConfig::default(), 0.1);
        assert!((stats.avg_latency_ms - 500.0).abs() < 1e-9);
        assert_eq!(stats.p50_latency_ms, 100.0);
        assert_eq!(stats.p99_latency_ms, 100.0);
    }
}
