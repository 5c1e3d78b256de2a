//! # Embeddings
//!
//! Turns anchor and paper texts into vectors for relevance ranking.
//!
//! ## Features
//!
//! - **Providers**: any model behind the [`EmbeddingProvider`] trait
//!   (OpenAI-compatible HTTP, deterministic mock)
//! - **Vector cache**: persistent, content-addressed by text hash and model
//! - **Adapter**: cache-first lookups, batched and time-bounded provider calls
//! - **Similarity**: cosine similarity and best-of-candidates matching
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbedItem ──► EmbeddingAdapter ──► EmbeddingMap (id -> vector) │
//! │                   │        │                                    │
//! │                   ▼        ▼                                    │
//! │           VectorCache   EmbeddingProvider (batched, timeout)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod cache;
pub mod error;
pub mod provider;
pub mod similarity;

pub use adapter::{EmbedItem, EmbeddingAdapter, EmbeddingMap};
pub use cache::{CacheKey, CacheStats, SourceKind, VectorCache, text_hash};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, MockProvider, OpenAIProvider};
pub use similarity::{SimilarityResult, best_match, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Model requested from OpenAI-compatible endpoints unless overridden.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
