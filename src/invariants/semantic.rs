//! Semantic similarity checking through an embedder port.
//!
//! Embedding vectors come from an [`Embedder`] implementation; cosine
//! similarity is a pure function over them. The reference embedding is
//! computed lazily, once, on first use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};

use super::verifier::{CheckError, CheckOutcome};
use super::Checker;

/// A service that embeds text into fixed-dimension vectors.
///
/// The dimension must stay constant for the process lifetime.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CheckError>;
}

/// Cosine similarity between two vectors. Zero when either has zero
/// magnitude or the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Embedder speaking the OpenAI-compatible `/embeddings` protocol, with a
/// content-hash cache so repeated texts embed once.
pub struct HttpEmbedder {
    api_base: String,
    model: String,
    client: Client,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            model: model.into(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CheckError> {
        let key = Self::cache_key(text);
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return Ok(cached.clone());
        }

        let url = format!("{}/embeddings", self.api_base.trim_end_matches('/'));
        let payload = serde_json::json!({ "model": self.model, "input": text });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CheckError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckError::Embedding(format!("HTTP {status}: {body}")));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CheckError::Embedding(format!("malformed embedding response: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .ok_or_else(|| CheckError::Embedding("empty embedding response".to_string()))?;

        self.cache.lock().await.insert(key, vector.clone());
        Ok(vector)
    }
}

/// Passes when the response embeds close enough to a reference text.
pub struct SimilarityChecker {
    reference: String,
    min_similarity: f64,
    embedder: Arc<dyn Embedder>,
    reference_embedding: OnceCell<Vec<f32>>,
}

impl SimilarityChecker {
    pub fn new(reference: String, min_similarity: f64, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            reference,
            min_similarity,
            embedder,
            reference_embedding: OnceCell::new(),
        }
    }
}

#[async_trait]
impl Checker for SimilarityChecker {
    fn kind(&self) -> &'static str {
        "semantic_similarity"
    }

    async fn check(&self, output: &str, _latency_ms: f64) -> Result<CheckOutcome, CheckError> {
        let reference = self
            .reference_embedding
            .get_or_try_init(|| self.embedder.embed(&self.reference))
            .await?;
        let candidate = self.embedder.embed(output).await?;

        let similarity = cosine_similarity(reference, &candidate);

        Ok(if similarity >= self.min_similarity {
            CheckOutcome::passed(
                self.kind(),
                format!("similarity {similarity:.3} >= {:.3}", self.min_similarity),
            )
        } else {
            CheckOutcome::failed(
                self.kind(),
                format!("similarity {similarity:.3} < {:.3}", self.min_similarity),
            )
        })
    }
}
