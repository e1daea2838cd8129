//! promptstorm: adversarial reliability testing for conversational AI agents.
//!
//! Given a handful of golden prompts, promptstorm asks an attacker model to
//! synthesize adversarial variants (paraphrases, typos, hostile tone,
//! injection attempts), drives the agent under test with each one, checks
//! every response against a configurable invariant battery, and aggregates
//! the outcomes into a weighted robustness score.

// Core modules
pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod invariants;
pub mod llm;
pub mod mutations;
pub mod orchestrator;
pub mod report;
pub mod results;

// Re-export the types most embedders need
pub use agent::{Agent, AgentAdapter, AgentResponse, ChainRunnable, InprocAgent};
pub use config::{InvariantSpec, RunConfig};
pub use error::LlmError;
pub use invariants::{InvariantVerifier, Verdict};
pub use llm::LlmBackend;
pub use mutations::{Mutation, MutationEngine, MutationKind};
pub use orchestrator::{Orchestrator, ProgressReporter, RunError};
pub use results::{MutationResult, RunResults, RunStatistics};
