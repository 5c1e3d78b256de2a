//! Error types for the anchor store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for anchor operations.
pub type Result<T> = std::result::Result<T, AnchorError>;

/// Errors that can occur while managing anchors.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// The text an anchor would be embedded from is blank.
    #[error("anchor text is empty")]
    EmptyText,

    /// No anchor with this id.
    #[error("anchor not found: {0}")]
    NotFound(String),

    /// A persisted anchor file exists but cannot be parsed.
    #[error("failed to load anchors from {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
