//! # Anchor Matching Engine
//!
//! Ranks a batch of newly published papers against the user's interest
//! anchors and keeps only the relevant ones.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Ranking Pipeline                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐     │
//! │  │ AnchorStore  │   │ EmbeddingAdapter │   │ PaperRecords │     │
//! │  │  (anchors)   │   │ (+ VectorCache)  │   │ (feed layer) │     │
//! │  └──────────────┘   └──────────────────┘   └──────────────┘     │
//! │         │                    │                    │             │
//! │         └────────────────────┼────────────────────┘             │
//! │                              ▼                                  │
//! │                      ┌──────────────┐                           │
//! │                      │    Scorer    │  max cosine per paper     │
//! │                      └──────────────┘                           │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                 threshold ─► order ─► RankedResult              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paperfeed_matcher::{MatcherConfig, RankingPipeline};
//!
//! let config = MatcherConfig::load("paperfeed.toml").await?;
//! let provider = config.openai_provider();
//! let pipeline = RankingPipeline::open(config, provider).await?;
//!
//! let ranked = pipeline.rank(papers_from_feed).await?;
//! for result in ranked {
//!     println!("{:.2} {}", result.score, result.paper.title);
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scorer;

pub use config::MatcherConfig;
pub use error::{MatcherError, Result};
pub use pipeline::{RankedResult, RankingPipeline};
pub use scorer::AnchorMatch;

// Re-export from dependencies for convenience
pub use paperfeed_anchors::{Anchor, AnchorKind, AnchorStore, ImportMode, PaperRecord};
pub use paperfeed_embeddings::{
    EmbeddingProvider, MockProvider, OpenAIProvider, VectorCache,
};
