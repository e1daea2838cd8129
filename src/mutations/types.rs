//! Mutation value types.
//!
//! Defines the closed set of adversarial mutation kinds, their default
//! scoring weights, and the `Mutation` record produced by the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kinds of adversarial mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Semantically equivalent rewrites that preserve intent.
    Paraphrase,
    /// Typos, spelling errors, and character-level noise.
    Noise,
    /// Changes in tone: aggressive, impatient, casual.
    ToneShift,
    /// Adversarial attacks attempting to manipulate the agent.
    PromptInjection,
}

impl MutationKind {
    /// All kinds, in canonical order.
    pub const ALL: [MutationKind; 4] = [
        MutationKind::Paraphrase,
        MutationKind::Noise,
        MutationKind::ToneShift,
        MutationKind::PromptInjection,
    ];

    /// The snake_case tag used in config and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Paraphrase => "paraphrase",
            MutationKind::Noise => "noise",
            MutationKind::ToneShift => "tone_shift",
            MutationKind::PromptInjection => "prompt_injection",
        }
    }

    /// Human-readable name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            MutationKind::Paraphrase => "Paraphrase",
            MutationKind::Noise => "Noise",
            MutationKind::ToneShift => "Tone Shift",
            MutationKind::PromptInjection => "Prompt Injection",
        }
    }

    /// Default scoring weight. Injection attacks count for more because a
    /// failure there is a worse outcome than a missed paraphrase.
    pub fn default_weight(&self) -> f64 {
        match self {
            MutationKind::Paraphrase => 1.0,
            MutationKind::Noise => 0.8,
            MutationKind::ToneShift => 0.9,
            MutationKind::PromptInjection => 1.5,
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single adversarial mutation of a golden prompt.
///
/// Identity is content-addressed: two mutations with the same
/// `(original, mutated, kind)` triple share an [`id`](Mutation::id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// The original golden prompt.
    pub original: String,
    /// The mutated adversarial version.
    pub mutated: String,
    /// Kind of mutation applied.
    pub kind: MutationKind,
    /// Scoring weight for this mutation.
    pub weight: f64,
    /// Creation timestamp, truncated to whole seconds.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata recorded by the engine.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Mutation {
    /// Creates a mutation stamped with the current time and the kind's
    /// default weight.
    pub fn new(
        original: impl Into<String>,
        mutated: impl Into<String>,
        kind: MutationKind,
    ) -> Self {
        Self {
            original: original.into(),
            mutated: mutated.into(),
            kind,
            weight: kind.default_weight(),
            created_at: Utc::now().trunc_subsecs(0),
            metadata: BTreeMap::new(),
        }
    }

    /// Overrides the scoring weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Content-addressed fingerprint: the first 12 hex characters of the
    /// SHA-256 digest over `original:mutated:kind`.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.original.as_bytes());
        hasher.update(b":");
        hasher.update(self.mutated.as_bytes());
        hasher.update(b":");
        hasher.update(self.kind.as_str().as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..12].to_string()
    }

    /// Character-level length difference from the original.
    pub fn character_diff(&self) -> usize {
        self.mutated
            .chars()
            .count()
            .abs_diff(self.original.chars().count())
    }

    /// Word count difference from the original.
    pub fn word_count_diff(&self) -> usize {
        let original_words = self.original.split_whitespace().count();
        let mutated_words = self.mutated.split_whitespace().count();
        mutated_words.abs_diff(original_words)
    }

    /// Whether this mutation satisfies the acceptance rules.
    ///
    /// A valid mutation is non-empty after trimming, differs from the
    /// original after trimming, and is at most three times the original's
    /// length.
    pub fn is_valid(&self) -> bool {
        let trimmed = self.mutated.trim();
        if trimmed.is_empty() {
            return false;
        }
        if trimmed == self.original.trim() {
            return false;
        }
        if self.mutated.chars().count() > self.original.chars().count() * 3 {
            return false;
        }
        true
    }
}
