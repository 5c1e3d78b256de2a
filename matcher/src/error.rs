//! Error types for the ranking engine.

use paperfeed_anchors::AnchorError;
use paperfeed_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for ranking operations.
pub type Result<T> = std::result::Result<T, MatcherError>;

/// Errors that can occur while ranking papers.
#[derive(Error, Debug)]
pub enum MatcherError {
    /// Ranking needs at least one anchor.
    #[error("no anchors configured: add at least one topic or saved paper")]
    NoAnchors,

    /// Threshold outside [0.0, 1.0].
    #[error("invalid threshold {0}: must be within [0.0, 1.0]")]
    InvalidThreshold(f32),

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Embedding error, including provider failures and timeouts.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Anchor store error.
    #[error("anchor error: {0}")]
    Anchors(#[from] AnchorError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatcherError {
    /// Whether the failure came from the embedding provider, so retrying the
    /// same call may succeed. Precondition failures never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Embedding(e) if e.is_transient())
    }
}
