//! Run orchestration.
//!
//! A run has three phases in strict order: *generate* mutations for every
//! golden prompt, *execute* them against the agent under test, and
//! *aggregate* the outcomes into statistics. Generation and execution are
//! internally parallel, bounded by one semaphore; aggregation is pure.

pub mod progress;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{AgentAdapter, AgentResponse, WiringError};
use crate::config::{ConfigError, InvariantSpec, RunConfig};
use crate::invariants::{
    CheckOutcome, Embedder, HttpEmbedder, InvariantVerifier, VerifierBuildError, AGENT_ERROR_KIND,
};
use crate::llm::{LlmBackend, LlmError, OpenAiClient};
use crate::mutations::{Mutation, MutationEngine, TemplateRegistry};
use crate::results::{MutationResult, RunResults, RunStatistics};

pub use progress::{ProgressReporter, TracingReporter};

/// Embedding model used when a similarity invariant names none.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Errors that abort a run.
///
/// Everything else (agent failures, check failures, generation
/// shortfalls) is data in the results.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent wiring error: {0}")]
    Wiring(#[from] WiringError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierBuildError),

    #[error("no mutations were produced; the attacker-model backend appears unreachable")]
    NoMutations,
}

/// Drives a full test run.
pub struct Orchestrator {
    config: RunConfig,
    engine: MutationEngine,
    adapter: AgentAdapter,
    verifier: InvariantVerifier,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Wires an orchestrator from pre-built parts.
    ///
    /// The template registry is built from the config's overrides; the
    /// config must already be validated.
    pub fn new(
        config: RunConfig,
        backend: Arc<dyn LlmBackend>,
        adapter: AgentAdapter,
        verifier: InvariantVerifier,
    ) -> Result<Self, RunError> {
        let templates = TemplateRegistry::with_overrides(&config.mutations.templates)
            .map_err(|e| RunError::Config(ConfigError::ValidationFailed(e.to_string())))?;
        let engine = MutationEngine::new(backend, templates, &config.model, &config.mutations);

        Ok(Self {
            config,
            engine,
            adapter,
            verifier,
            reporter: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Wires every collaborator from configuration alone: an
    /// OpenAI-compatible backend, an HTTP agent, and an HTTP embedder when
    /// a similarity invariant is configured.
    pub fn from_config(config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;

        let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiClient::from_config(&config.model)?);
        let adapter = AgentAdapter::from_config(&config.agent)?;

        let embedder: Option<Arc<dyn Embedder>> = config
            .invariants
            .iter()
            .find_map(|spec| match spec {
                InvariantSpec::SemanticSimilarity { model, .. } => Some(model.clone()),
                _ => None,
            })
            .map(|model| {
                Arc::new(HttpEmbedder::new(
                    config.model.api_base.clone(),
                    model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                    Duration::from_millis(config.model.timeout_ms),
                )) as Arc<dyn Embedder>
            });

        let verifier = InvariantVerifier::from_specs(&config.invariants, embedder)?;

        Self::new(config, backend, adapter, verifier)
    }

    /// Attaches a progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// A token that cancels the whole run when triggered. In-flight
    /// invocations record an error, nothing further is dispatched, and
    /// aggregation runs over whatever completed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Executes the three run phases and returns the aggregated results.
    pub async fn run(&self) -> Result<RunResults, RunError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        // Phase G: generate.
        let queue = self.generate_all().await;
        if queue.is_empty() && !self.config.golden_prompts.is_empty() && !self.cancel.is_cancelled()
        {
            return Err(RunError::NoMutations);
        }
        info!(mutations = queue.len(), "generation complete");

        // Phase E: execute.
        let results = self.execute_all(queue).await;

        // Phase A: aggregate. Pure, over whatever completed.
        let duration_seconds = clock.elapsed().as_secs_f64();
        let statistics =
            RunStatistics::from_results(&results, &self.config.mutations, duration_seconds);

        let run_results = RunResults {
            config_snapshot: self.config.clone(),
            started_at,
            completed_at: Utc::now(),
            mutations: results,
            statistics,
        };

        if let Some(reporter) = &self.reporter {
            reporter.on_run_complete(&run_results);
        }

        Ok(run_results)
    }

    /// Generates mutations for every golden prompt, concurrently across
    /// prompts but bounded by the execution concurrency limit. Emission
    /// order is deterministic: prompt order, then kind order, then
    /// acceptance order.
    async fn generate_all(&self) -> Vec<(String, Mutation)> {
        let kinds = self.config.mutations.kinds.as_slice();
        let count = self.config.mutations.count_per_kind;

        let per_prompt: Vec<Vec<Mutation>> = stream::iter(self.config.golden_prompts.iter())
            .map(|prompt| {
                self.engine
                    .generate_cancellable(prompt, kinds, count, &self.cancel)
            })
            .buffered(self.config.advanced.concurrency)
            .collect()
            .await;

        self.config
            .golden_prompts
            .iter()
            .zip(per_prompt)
            .flat_map(|(prompt, mutations)| {
                mutations
                    .into_iter()
                    .map(move |mutation| (prompt.clone(), mutation))
            })
            .collect()
    }

    /// Fans out agent invocations with at most `concurrency` in flight.
    /// The returned list preserves queue order, not completion order.
    async fn execute_all(&self, queue: Vec<(String, Mutation)>) -> Vec<MutationResult> {
        let total = queue.len();
        let semaphore = Arc::new(Semaphore::new(self.config.advanced.concurrency));
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks = queue.into_iter().map(|(original, mutation)| {
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            async move {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };

                let result = self.run_single(original, mutation).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(reporter) = &self.reporter {
                    reporter.on_progress(done, total);
                }
                Some(result)
            }
        });

        // join_all preserves input order, so no reordering pass is needed.
        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Invokes the agent with one mutation and verifies the response.
    async fn run_single(&self, original: String, mutation: Mutation) -> MutationResult {
        let response = tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!(mutation = %mutation.id(), "invocation abandoned by cancellation");
                AgentResponse::failure("run cancelled")
            }
            response = self.adapter.invoke_timed(&mutation.mutated) => response,
        };

        let (passed, checks) = if response.is_success() {
            let verdict = self
                .verifier
                .verify(&response.output, response.latency_ms)
                .await;
            (verdict.all_passed, verdict.checks)
        } else {
            let detail = response
                .error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            (false, vec![CheckOutcome::failed(AGENT_ERROR_KIND, detail)])
        };

        MutationResult {
            original,
            response_output: response.output,
            latency_ms: response.latency_ms,
            passed,
            checks,
            error: response.error,
            mutation,
        }
    }
}
