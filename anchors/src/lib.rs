//! # Anchors
//!
//! Declared research interests and the paper records they are compared with.
//!
//! - [`PaperRecord`]: a normalized paper from the feed layer
//! - [`Anchor`]: a topic or saved paper, reduced to one embedding text
//! - [`AnchorStore`]: ordered, persisted anchor collection with merge,
//!   replace, import and export
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paperfeed_anchors::{AnchorStore, ImportMode};
//!
//! let mut store = AnchorStore::open("~/.paperfeed/anchors.json").await?;
//! store.add_topic("reinforcement learning from human feedback", Some("RLHF")).await?;
//! store.import("shared-anchors.json", ImportMode::Merge).await?;
//! ```

pub mod anchor;
pub mod error;
pub mod paper;
pub mod store;
mod timestamp;

pub use anchor::{Anchor, AnchorKind, AnchorSource};
pub use error::{AnchorError, Result};
pub use paper::PaperRecord;
pub use store::{AnchorStore, ImportMode};
