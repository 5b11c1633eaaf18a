// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Conditions the caller needs to tell apart. Everything else
// travels as a plain anyhow::Error with context attached; these
// are wrapped in anyhow too and recovered with
// `err.downcast_ref::<RagError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    #[error("nothing to index: the document contains no extractable text")]
    EmptyDocument,

    #[error("no document loaded; load a document before asking questions")]
    NoDocument,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}
