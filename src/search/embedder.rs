//! Embedding provider trait for the semantic tier.
//!
//! The engine only needs text → fixed-length vector. Implementations wrap a
//! hosted API or a local model and must be `Send + Sync`, since one provider
//! serves every concurrent search.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by an [`EmbeddingProvider`].
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The provider cannot serve requests (missing credentials, model not loaded).
    #[error("embedder {model} unavailable: {reason}")]
    Unavailable { model: String, reason: String },

    #[error("embedding with {model} failed: {source}")]
    Failed {
        model: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Converts query text into a vector comparable with the stored embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier, e.g. `"text-embedding-3-small"`.
    fn id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Metadata about an embedder for display and logging.
#[derive(Debug, Clone)]
pub struct EmbedderInfo {
    pub id: String,
    pub dimensions: usize,
}

impl EmbedderInfo {
    pub fn from_provider(provider: &dyn EmbeddingProvider) -> Self {
        Self {
            id: provider.id().to_string(),
            dimensions: provider.dimensions(),
        }
    }
}

impl fmt::Display for EmbedderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} dims)", self.id, self.dimensions)
    }
}

/// Render an embedding as a pgvector literal (`[0.1,0.2,...]`).
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}
