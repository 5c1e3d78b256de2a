//! Paper records handed over by the feed layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator placed between title and abstract in embedding text.
pub const TEXT_SEPARATOR: &str = "\n\n";

/// One candidate paper, already normalized by the feed layer.
///
/// `id` is the arXiv-style identifier and doubles as the dedup and cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: String,

    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Publication time. Only used to break score ties.
    pub published_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl PaperRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            published_at,
            authors: Vec::new(),
            categories: Vec::new(),
            link: None,
        }
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Title and abstract joined by [`TEXT_SEPARATOR`]. Blank parts are
    /// dropped, so a paper with neither yields an empty string.
    pub fn embedding_text(&self) -> String {
        [self.title.trim(), self.abstract_text.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(TEXT_SEPARATOR)
    }
}
