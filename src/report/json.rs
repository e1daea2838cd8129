//! JSON report writer.

use std::fs;
use std::path::Path;

use tracing::info;

use super::ReportError;
use crate::results::RunResults;

/// Serializes the results to pretty-printed JSON at `path`, creating
/// parent directories as needed.
pub fn write_json_report(results: &RunResults, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let body = serde_json::to_string_pretty(results)?;
    fs::write(path, body)?;

    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, AgentKind, ModelConfig, RunConfig};
    use crate::results::RunStatistics;
    use chrono::Utc;

    fn empty_results() -> RunResults {
        RunResults {
            config_snapshot: RunConfig {
                agent: AgentConfig {
                    kind: AgentKind::Http,
                    endpoint: "http://localhost:8000/chat".to_string(),
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
                golden_prompts: Vec::new(),
                advanced: Default::default(),
                output: Default::default(),
            },
            started_at: Utc::now(),
            completed_at: Utc::now(),
            mutations: Vec::new(),
            statistics: RunStatistics::default(),
        }
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");

        write_json_report(&empty_results(), &path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["statistics"]["total"], 0);
        assert!(value["config_snapshot"]["agent"]["endpoint"]
            .as_str()
            .unwrap()
            .contains("localhost"));
    }

    #[test]
    fn test_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json_report(&empty_results(), &path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let restored: RunResults = serde_json::from_str(&body).unwrap();
        assert_eq!(restored.statistics.total, 0);
    }
}
