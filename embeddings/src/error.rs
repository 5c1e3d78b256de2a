//! Error types for the embeddings system.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A provider batch failed. Carries the ids of every item in that batch.
    #[error("embedding provider failed for {} item(s) [{}]: {source}", .item_ids.len(), .item_ids.join(", "))]
    ProviderFailed {
        item_ids: Vec<String>,
        #[source]
        source: Box<EmbeddingError>,
    },

    /// A provider batch did not answer within the configured timeout.
    #[error("embedding provider timed out after {timeout:?} for {} item(s) [{}]", .item_ids.len(), .item_ids.join(", "))]
    Timeout {
        item_ids: Vec<String>,
        timeout: Duration,
    },

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Ids of the items affected by a failed or timed-out provider batch.
    pub fn failed_item_ids(&self) -> &[String] {
        match self {
            Self::ProviderFailed { item_ids, .. } | Self::Timeout { item_ids, .. } => item_ids,
            _ => &[],
        }
    }

    /// Whether this error comes from the provider and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderFailed { .. } | Self::Timeout { .. })
    }
}
