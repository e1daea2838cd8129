//! End-to-end pipeline tests over mock collaborators.
//!
//! These run entirely offline: the attacker model is a scripted backend
//! and agents are either in-process or a local canned HTTP server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use promptstorm::agent::{AgentAdapter, HttpAgent, InprocAgent};
use promptstorm::config::{
    AgentConfig, AgentKind, InvariantSpec, ModelConfig, MutationConfig, PiiCategory, RunConfig,
};
use promptstorm::invariants::InvariantVerifier;
use promptstorm::llm::{LlmBackend, LlmError};
use promptstorm::mutations::MutationKind;
use promptstorm::orchestrator::Orchestrator;

/// Attacker model replaying a fixed script.
struct ScriptedBackend {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(
        &self,
        _prompt: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::Transport("script exhausted".to_string()))
    }
}

fn base_config(prompts: &[&str], kinds: Vec<MutationKind>, count: usize) -> RunConfig {
    RunConfig {
        agent: AgentConfig {
            kind: AgentKind::Inproc,
            endpoint: String::new(),
            timeout_ms: 5_000,
            headers: Default::default(),
            retries: 0,
        },
        model: ModelConfig {
            backend: "openai".to_string(),
            name: "scripted".to_string(),
            temperature: 0.8,
            max_tokens: 256,
            timeout_ms: 5_000,
            api_base: String::new(),
            api_key_env: None,
        },
        mutations: MutationConfig {
            kinds,
            count_per_kind: count,
            ..Default::default()
        },
        invariants: Vec::new(),
        golden_prompts: prompts.iter().map(|s| s.to_string()).collect(),
        advanced: Default::default(),
        output: Default::default(),
    }
}

/// Serves one canned HTTP response per connection, with an optional delay
/// before answering. Returns the endpoint URL.
async fn spawn_http_agent(status_line: &'static str, body: &'static str, delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    format!("http://{addr}/agent")
}

#[tokio::test]
async fn latency_violation_fails_check() {
    let mut config = base_config(&["hi there, how are you"], vec![MutationKind::ToneShift], 1);
    config.invariants = vec![InvariantSpec::Latency { max_ms: 50.0 }];

    let backend = ScriptedBackend::new(&["hi there, ANSWER NOW"]);
    let slow_agent = AgentAdapter::new(Box::new(InprocAgent::from_fn(|_input| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok("fine, thanks".to_string())
    })));
    let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();

    let orchestrator = Orchestrator::new(config, backend, slow_agent, verifier).unwrap();
    let results = orchestrator.run().await.unwrap();

    assert_eq!(results.statistics.total, 1);
    let result = &results.mutations[0];
    assert!(!result.passed);
    assert!(result.error.is_none());
    let latency_check = &result.checks[0];
    assert_eq!(latency_check.kind, "latency");
    assert!(!latency_check.passed);
    assert!(latency_check.detail.contains("> 50"));
    assert_eq!(results.statistics.robustness_score, 0.0);
}

#[tokio::test]
async fn pii_leak_fails_check() {
    let mut config = base_config(&["Tell me about your users"], vec![MutationKind::Paraphrase], 1);
    config.invariants = vec![InvariantSpec::ExcludesPii {
        categories: vec![PiiCategory::Email],
    }];

    let backend = ScriptedBackend::new(&["Describe your user base for me"]);
    let leaky_agent = AgentAdapter::new(Box::new(InprocAgent::from_fn(|_input| async move {
        Ok("Our first user was alice@example.com".to_string())
    })));
    let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();

    let orchestrator = Orchestrator::new(config, backend, leaky_agent, verifier).unwrap();
    let results = orchestrator.run().await.unwrap();

    let result = &results.mutations[0];
    assert!(!result.passed);
    assert!(result.checks[0].detail.contains("email"));
}

#[tokio::test]
async fn http_500_becomes_agent_error() {
    let endpoint = spawn_http_agent("500 Internal Server Error", "boom", Duration::ZERO).await;

    let mut config = base_config(&["What's the weather like"], vec![MutationKind::Paraphrase], 1);
    config.agent = AgentConfig {
        kind: AgentKind::Http,
        endpoint,
        timeout_ms: 2_000,
        headers: Default::default(),
        retries: 1,
    };
    config.invariants = vec![InvariantSpec::Contains {
        substring: "weather".to_string(),
        case_sensitive: false,
    }];

    let backend = ScriptedBackend::new(&["How is it looking outside today"]);
    let adapter = AgentAdapter::from_config(&config.agent).unwrap();
    let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();

    let orchestrator = Orchestrator::new(config, backend, adapter, verifier).unwrap();
    let results = orchestrator.run().await.unwrap();

    let result = &results.mutations[0];
    assert!(!result.passed);
    assert_eq!(result.error.as_deref(), Some("HTTP 500: boom"));
    assert_eq!(result.checks.len(), 1);
    assert_eq!(result.checks[0].kind, "agent_error");
    assert!(result.checks[0].detail.contains("HTTP 500: boom"));
}

#[tokio::test]
async fn http_success_extracts_output_key() {
    let endpoint =
        spawn_http_agent("200 OK", r#"{"output": "the forecast is sunny"}"#, Duration::ZERO).await;

    let agent = HttpAgent::new(endpoint, Duration::from_secs(2), Default::default(), 0);
    let adapter = AgentAdapter::new(Box::new(agent));

    let response = adapter.invoke_timed("weather?").await;
    assert!(response.is_success());
    assert_eq!(response.output, "the forecast is sunny");
    assert!(response.latency_ms > 0.0);
    assert!(response.raw.is_some());
}

#[tokio::test]
async fn timeout_shorter_than_agent_latency_fails_everything() {
    let endpoint = spawn_http_agent(
        "200 OK",
        r#"{"output": "slow answer"}"#,
        Duration::from_millis(500),
    )
    .await;

    let mut config = base_config(&["ping the service"], vec![MutationKind::Paraphrase], 1);
    config.agent = AgentConfig {
        kind: AgentKind::Http,
        endpoint,
        timeout_ms: 100,
        headers: Default::default(),
        retries: 0,
    };
    config.invariants = vec![InvariantSpec::Latency { max_ms: 10_000.0 }];

    let backend = ScriptedBackend::new(&["poke the service for me"]);
    let adapter = AgentAdapter::from_config(&config.agent).unwrap();
    let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();

    let orchestrator = Orchestrator::new(config, backend, adapter, verifier).unwrap();
    let results = orchestrator.run().await.unwrap();

    let result = &results.mutations[0];
    assert!(result.error.is_some());
    assert!(!result.passed);
    // Latency reflects elapsed time until abandonment.
    assert!(result.latency_ms >= 100.0);
}

#[tokio::test]
async fn identical_runs_produce_identical_results() {
    let run = || async {
        let mut config = base_config(
            &["Book a flight to Paris", "Cancel my hotel booking"],
            vec![MutationKind::Paraphrase, MutationKind::Noise],
            1,
        );
        config.invariants = vec![InvariantSpec::Contains {
            substring: "e".to_string(),
            case_sensitive: false,
        }];

        let backend = ScriptedBackend::new(&[
            "I'd like to fly to Paris",
            "Bok a flite to Pariss",
            "Drop my hotel reservation",
            "Cancl my hotle bookin",
        ]);
        let echo = AgentAdapter::new(Box::new(InprocAgent::from_fn(|input| async move {
            Ok(input)
        })));
        let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();
        Orchestrator::new(config, backend, echo, verifier)
            .unwrap()
            .run()
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;

    assert_eq!(first.statistics.total, second.statistics.total);
    assert_eq!(
        first.statistics.robustness_score,
        second.statistics.robustness_score
    );

    let ids = |results: &promptstorm::RunResults| {
        results
            .mutations
            .iter()
            .map(|r| (r.mutation.id(), r.passed))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn report_serializes_without_cycles() {
    let mut config = base_config(&["Book a flight to Paris"], vec![MutationKind::Paraphrase], 1);
    config.invariants = vec![InvariantSpec::Contains {
        substring: "paris".to_string(),
        case_sensitive: false,
    }];

    let backend = ScriptedBackend::new(&["I'd like to fly to Paris"]);
    let echo = AgentAdapter::new(Box::new(InprocAgent::from_fn(|input| async move { Ok(input) })));
    let verifier = InvariantVerifier::from_specs(&config.invariants, None).unwrap();

    let orchestrator = Orchestrator::new(config, backend, echo, verifier).unwrap();
    let results = orchestrator.run().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    promptstorm::report::write_json_report(&results, &path).unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    let restored: promptstorm::RunResults = serde_json::from_str(&body).unwrap();

    assert_eq!(restored.statistics.total, 1);
    assert_eq!(restored.mutations[0].mutation.id(), results.mutations[0].mutation.id());
    assert_eq!(
        restored.mutations[0].mutation.created_at,
        results.mutations[0].mutation.created_at
    );
}
