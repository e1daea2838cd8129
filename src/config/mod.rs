//! Run configuration: schema, loading, and validation.
//!
//! A run is described by one YAML document with sections for the agent
//! under test, the attacker model, mutation generation, the invariant
//! battery, golden prompts, and execution limits. Everything is validated
//! up front; a bad config is the only error that aborts before generation
//! starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mutations::{MutationKind, PROMPT_PLACEHOLDER};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the agent under test is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// POST JSON to an HTTP endpoint.
    Http,
    /// Host-provided in-process callable (library embedding only).
    Inproc,
    /// Host-provided chain object (library embedding only).
    Chain,
}

/// Configuration for the agent under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Endpoint URL for `http` agents.
    #[serde(default)]
    pub endpoint: String,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_agent_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra request headers for `http` agents.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Retry attempts for transport failures.
    #[serde(default = "default_agent_retries")]
    pub retries: u32,
}

fn default_agent_timeout_ms() -> u64 {
    30_000
}

fn default_agent_retries() -> u32 {
    2
}

/// Configuration for the attacker-model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend identifier (currently `openai` for any OpenAI-compatible
    /// endpoint).
    #[serde(default = "default_model_backend")]
    pub backend: String,
    /// Model name passed through to the backend.
    pub name: String,
    /// Base sampling temperature; the engine adjusts per mutation kind.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Backend request timeout in milliseconds.
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_model_backend() -> String {
    "openai".to_string()
}

fn default_temperature() -> f64 {
    0.8
}

fn default_max_tokens() -> u32 {
    256
}

fn default_model_timeout_ms() -> u64 {
    60_000
}

fn default_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}

/// Configuration for mutation generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Kinds to generate, in the order they should be produced.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<MutationKind>,
    /// Mutations requested per kind per golden prompt.
    #[serde(default = "default_count_per_kind")]
    pub count_per_kind: usize,
    /// Per-kind scoring weight overrides.
    #[serde(default)]
    pub weights: BTreeMap<MutationKind, f64>,
    /// Per-kind template overrides; each must contain `{prompt}`.
    #[serde(default)]
    pub templates: BTreeMap<MutationKind, String>,
}

fn default_kinds() -> Vec<MutationKind> {
    MutationKind::ALL.to_vec()
}

fn default_count_per_kind() -> usize {
    3
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            count_per_kind: default_count_per_kind(),
            weights: BTreeMap::new(),
            templates: BTreeMap::new(),
        }
    }
}

impl MutationConfig {
    /// The scoring weight for a kind: the configured override or the
    /// kind's default.
    pub fn weight_for(&self, kind: MutationKind) -> f64 {
        self.weights
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_weight())
    }
}

/// Categories of personally identifiable information the safety checker
/// can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    Ssn,
    CreditCard,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::Ssn => "ssn",
            PiiCategory::CreditCard => "credit_card",
        }
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured invariant check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvariantSpec {
    /// Response must contain a substring.
    Contains {
        substring: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Response must match a regular expression.
    Regex {
        pattern: String,
        /// Inline flag characters, e.g. `i` for case-insensitive.
        #[serde(default)]
        flags: String,
    },
    /// Response latency must stay under a bound.
    Latency { max_ms: f64 },
    /// Response must parse as JSON, optionally conforming to a minimal
    /// structural schema.
    ValidJson {
        #[serde(default)]
        schema: Option<serde_json::Value>,
    },
    /// Response must be semantically similar to a reference text.
    SemanticSimilarity {
        reference: String,
        min_similarity: f64,
        /// Embedding model name, when the embedder supports several.
        #[serde(default)]
        model: Option<String>,
    },
    /// Response must not leak PII of the given categories.
    ExcludesPii { categories: Vec<PiiCategory> },
    /// Presence of refusal markers must match the expectation.
    Refusal {
        refusal_markers: Vec<String>,
        require_refusal: bool,
    },
}

/// Execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Maximum in-flight agent invocations during execution. Generation
    /// shares the same bound.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    5
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
}

/// Where and how the report is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("promptstorm-report.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: default_output_path(),
        }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub agent: AgentConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub mutations: MutationConfig,
    #[serde(default)]
    pub invariants: Vec<InvariantSpec>,
    #[serde(default)]
    pub golden_prompts: Vec<String>,
    #[serde(default)]
    pub advanced: AdvancedConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Loads and validates a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parses and validates a config from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.kind == AgentKind::Http && self.agent.endpoint.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "agent.endpoint is required for http agents".to_string(),
            ));
        }

        if self.agent.timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "agent.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.model.name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model.name cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationFailed(
                "model.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.model.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "model.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.model.timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "model.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.mutations.kinds.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "mutations.kinds cannot be empty".to_string(),
            ));
        }

        if self.mutations.count_per_kind == 0 {
            return Err(ConfigError::ValidationFailed(
                "mutations.count_per_kind must be greater than 0".to_string(),
            ));
        }

        for (kind, weight) in &self.mutations.weights {
            if *weight <= 0.0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "mutations.weights[{kind}] must be positive"
                )));
            }
        }

        for (kind, template) in &self.mutations.templates {
            if !template.contains(PROMPT_PLACEHOLDER) {
                return Err(ConfigError::ValidationFailed(format!(
                    "mutations.templates[{kind}] must contain the {{prompt}} placeholder"
                )));
            }
        }

        if self.advanced.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "advanced.concurrency must be at least 1".to_string(),
            ));
        }

        for (idx, spec) in self.invariants.iter().enumerate() {
            validate_invariant(idx, spec)?;
        }

        Ok(())
    }
}

fn validate_invariant(idx: usize, spec: &InvariantSpec) -> Result<(), ConfigError> {
    match spec {
        InvariantSpec::Contains { substring, .. } => {
            if substring.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: contains.substring cannot be empty"
                )));
            }
        }
        InvariantSpec::Regex { pattern, flags } => {
            let full = if flags.is_empty() {
                pattern.clone()
            } else {
                format!("(?{flags}){pattern}")
            };
            if let Err(e) = regex::Regex::new(&full) {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: invalid regex: {e}"
                )));
            }
        }
        InvariantSpec::Latency { max_ms } => {
            if *max_ms <= 0.0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: latency.max_ms must be positive"
                )));
            }
        }
        InvariantSpec::ValidJson { .. } => {}
        InvariantSpec::SemanticSimilarity { min_similarity, .. } => {
            if !(0.0..=1.0).contains(min_similarity) {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: semantic_similarity.min_similarity must be in [0, 1]"
                )));
            }
        }
        InvariantSpec::ExcludesPii { categories } => {
            if categories.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: excludes_pii.categories cannot be empty"
                )));
            }
        }
        InvariantSpec::Refusal {
            refusal_markers, ..
        } => {
            if refusal_markers.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "invariants[{idx}]: refusal.refusal_markers cannot be empty"
                )));
            }
        }
    }
    Ok(())
}
