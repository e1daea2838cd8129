//! Adversarial mutation generation.
//!
//! Value types for mutations, the per-kind prompt template registry, and
//! the LLM-driven engine that produces validated, deduplicated mutations.

pub mod engine;
pub mod templates;
pub mod types;

pub use engine::{MutationEngine, DEFAULT_RETRY_BUDGET};
pub use templates::{TemplateError, TemplateRegistry, PROMPT_PLACEHOLDER};
pub use types::{Mutation, MutationKind};
