//! Text embedding collaborator
//!
//! The repository asks an [`Embedder`] for a query vector when a search
//! carries free text. Any failure here selects the structured-only search;
//! it is never surfaced to the caller.

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Result type for embedding calls
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Embedding failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    /// The embedding service could not be reached or failed
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    /// Nothing to embed
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// The service answered with a zero-length vector
    #[error("Embedding service returned an empty vector")]
    EmptyVector,
}

impl EmbeddingError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Turns text into a query vector
pub trait Embedder: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, EmbeddingResult<Vec<f64>>>;
}
