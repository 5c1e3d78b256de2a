//! Interest anchors.
//!
//! An anchor is one unit of declared interest: a free-text topic or a paper
//! the user saved. Both reduce to a single embedding text. That text is fixed
//! for the anchor's lifetime; editing it means creating a new anchor with a
//! new id, so a cached vector is never silently reused for different text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnchorError, Result};
use crate::paper::PaperRecord;

/// Display titles derived from topic text are cut to this many characters.
const TITLE_CHARS: usize = 50;

/// The two kinds of anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Topic,
    #[serde(alias = "paper")]
    SavedPaper,
}

/// What an anchor is created from. Each variant defines its own embedding
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorSource {
    Topic {
        description: String,
        title: Option<String>,
    },
    SavedPaper(PaperRecord),
}

impl AnchorSource {
    pub fn topic(description: impl Into<String>) -> Self {
        Self::Topic {
            description: description.into(),
            title: None,
        }
    }

    pub fn kind(&self) -> AnchorKind {
        match self {
            Self::Topic { .. } => AnchorKind::Topic,
            Self::SavedPaper(_) => AnchorKind::SavedPaper,
        }
    }

    /// The text this anchor is embedded from, trimmed.
    pub fn embedding_text(&self) -> String {
        match self {
            Self::Topic { description, .. } => description.trim().to_string(),
            Self::SavedPaper(paper) => paper.embedding_text(),
        }
    }
}

/// A unit of user interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    id: String,

    #[serde(rename = "type", alias = "kind")]
    kind: AnchorKind,

    text: String,

    title: String,

    #[serde(alias = "added_at", deserialize_with = "crate::timestamp::deserialize")]
    created_at: DateTime<Utc>,
}

impl Anchor {
    /// Create an anchor of `kind` from raw text.
    pub fn new(kind: AnchorKind, text: impl AsRef<str>) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(AnchorError::EmptyText);
        }
        Ok(Self {
            id: new_id(),
            kind,
            text: text.to_string(),
            title: default_title(text),
            created_at: Utc::now(),
        })
    }

    /// Create an anchor from a topic or saved paper.
    ///
    /// Saved papers keep the paper id, so saving the same paper twice yields
    /// the same anchor id.
    pub fn from_source(source: AnchorSource) -> Result<Self> {
        let text = source.embedding_text();
        if text.is_empty() {
            return Err(AnchorError::EmptyText);
        }

        let kind = source.kind();
        let (id, title) = match source {
            AnchorSource::Topic { title, .. } => (
                new_id(),
                title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| default_title(&text)),
            ),
            AnchorSource::SavedPaper(paper) => {
                let title = match paper.title.trim() {
                    "" => default_title(&text),
                    title => title.to_string(),
                };
                (paper.id, title)
            }
        };

        Ok(Self {
            id,
            kind,
            text,
            title,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    /// The embedding text. Never blank.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Titles are display metadata and may change; the text may not.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Check the invariants of an anchor that did not come from a
    /// constructor (e.g. deserialized from an import file).
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(AnchorError::EmptyText);
        }
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn default_title(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(TITLE_CHARS)
        .collect()
}
