//! Anchor storage and persistence.
//!
//! The `AnchorStore` keeps anchors in insertion order and, when opened on a
//! path, writes the whole collection back after every change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::anchor::{Anchor, AnchorKind, AnchorSource};
use crate::error::{AnchorError, Result};
use crate::paper::PaperRecord;

/// How [`AnchorStore::import`] combines imported anchors with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Append anchors whose text is not already present.
    Merge,
    /// Discard existing anchors and keep exactly the imported ones.
    Replace,
}

/// On-disk layout shared by the store file and export files.
#[derive(Debug, Serialize, Deserialize)]
struct AnchorFile {
    anchors: Vec<Anchor>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::timestamp::deserialize_option"
    )]
    updated_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::timestamp::deserialize_option"
    )]
    exported_at: Option<DateTime<Utc>>,
}

/// Ordered collection of anchors.
pub struct AnchorStore {
    /// Backing file, if persisted.
    path: Option<PathBuf>,

    anchors: Vec<Anchor>,
}

impl AnchorStore {
    /// Create a store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            anchors: Vec::new(),
        }
    }

    /// Open the store backed by `path`, loading existing anchors.
    ///
    /// A missing file is an empty store. A file that exists but cannot be
    /// parsed is an error, since it holds user data.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let anchors = if fs::try_exists(&path).await? {
            let file = read_anchor_file(&path).await?;
            let anchors = dedup_by_id(file.anchors);
            for anchor in &anchors {
                anchor.validate()?;
            }
            anchors
        } else {
            Vec::new()
        };

        info!("Loaded {} anchors from {}", anchors.len(), path.display());
        Ok(Self {
            path: Some(path),
            anchors,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All anchors in insertion order.
    pub fn list(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn get(&self, id: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id() == id)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors
            .iter()
            .filter(|a| a.kind() == AnchorKind::Topic)
    }

    pub fn saved_papers(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors
            .iter()
            .filter(|a| a.kind() == AnchorKind::SavedPaper)
    }

    /// Create and append an anchor of `kind` from raw text.
    pub async fn add(&mut self, kind: AnchorKind, text: &str) -> Result<Anchor> {
        let anchor = Anchor::new(kind, text)?;
        self.push(anchor).await
    }

    /// Append a topic anchor with an optional display title.
    pub async fn add_topic(&mut self, description: &str, title: Option<&str>) -> Result<Anchor> {
        let anchor = Anchor::from_source(AnchorSource::Topic {
            description: description.to_string(),
            title: title.map(str::to_string),
        })?;
        self.push(anchor).await
    }

    /// Save a paper as an anchor. Saving a paper that is already saved returns
    /// the existing anchor unchanged.
    pub async fn save_paper(&mut self, paper: &PaperRecord) -> Result<Anchor> {
        if let Some(existing) = self.get(&paper.id) {
            debug!("Paper {} is already saved", paper.id);
            return Ok(existing.clone());
        }
        let anchor = Anchor::from_source(AnchorSource::SavedPaper(paper.clone()))?;
        self.push(anchor).await
    }

    async fn push(&mut self, anchor: Anchor) -> Result<Anchor> {
        let mut anchors = self.anchors.clone();
        anchors.push(anchor.clone());
        self.commit(anchors).await?;
        debug!("Added anchor {} ({:?})", anchor.id(), anchor.kind());
        Ok(anchor)
    }

    /// Remove an anchor by id, returning it if it existed.
    pub async fn remove(&mut self, id: &str) -> Result<Option<Anchor>> {
        let Some(position) = self.anchors.iter().position(|a| a.id() == id) else {
            return Ok(None);
        };
        let mut anchors = self.anchors.clone();
        let removed = anchors.remove(position);
        self.commit(anchors).await?;
        info!("Removed anchor {id}");
        Ok(Some(removed))
    }

    /// Change an anchor's display title.
    pub async fn set_title(&mut self, id: &str, title: &str) -> Result<()> {
        let mut anchors = self.anchors.clone();
        let anchor = anchors
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or_else(|| AnchorError::NotFound(id.to_string()))?;
        anchor.set_title(title);
        self.commit(anchors).await
    }

    /// Replace every anchor. Nothing changes if any replacement is invalid
    /// or the store cannot be written. Repeated ids keep their first
    /// occurrence.
    pub async fn replace_all(&mut self, anchors: Vec<Anchor>) -> Result<()> {
        for anchor in &anchors {
            anchor.validate()?;
        }
        self.commit(dedup_by_id(anchors)).await?;
        info!("Replaced anchors, now {}", self.anchors.len());
        Ok(())
    }

    /// Append anchors whose text does not exactly match an existing anchor's
    /// text. Duplicates (including an id already in use) are skipped. Nothing
    /// changes if any incoming anchor is invalid or the store cannot be
    /// written. Returns how many were added.
    pub async fn merge(&mut self, anchors: Vec<Anchor>) -> Result<usize> {
        for anchor in &anchors {
            anchor.validate()?;
        }

        let mut texts: HashSet<String> = self.anchors.iter().map(|a| a.text().to_string()).collect();
        let mut ids: HashSet<String> = self.anchors.iter().map(|a| a.id().to_string()).collect();

        let mut merged = self.anchors.clone();
        for anchor in anchors {
            if texts.contains(anchor.text()) || ids.contains(anchor.id()) {
                debug!("Skipping duplicate anchor {}", anchor.id());
                continue;
            }
            texts.insert(anchor.text().to_string());
            ids.insert(anchor.id().to_string());
            merged.push(anchor);
        }

        let added = merged.len() - self.anchors.len();
        if added > 0 {
            self.commit(merged).await?;
        }
        info!("Merged {added} new anchors");
        Ok(added)
    }

    /// Remove all anchors.
    pub async fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new()).await?;
        info!("Cleared all anchors");
        Ok(())
    }

    /// Write all anchors to an export file.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = AnchorFile {
            anchors: self.anchors.clone(),
            updated_at: None,
            exported_at: Some(Utc::now()),
        };
        write_atomic(path.as_ref(), &serde_json::to_string_pretty(&file)?).await?;
        info!(
            "Exported {} anchors to {}",
            self.anchors.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read anchors from an export file. Returns the number of anchors added
    /// (for [`ImportMode::Replace`], the number now in the store).
    pub async fn import(&mut self, path: impl AsRef<Path>, mode: ImportMode) -> Result<usize> {
        let file = read_anchor_file(path.as_ref()).await?;
        match mode {
            ImportMode::Merge => self.merge(file.anchors).await,
            ImportMode::Replace => {
                self.replace_all(file.anchors).await?;
                Ok(self.anchors.len())
            }
        }
    }

    /// Persist `anchors`, then make them the current collection. On a write
    /// error the in-memory collection is left untouched.
    async fn commit(&mut self, anchors: Vec<Anchor>) -> Result<()> {
        if let Some(ref path) = self.path {
            let file = AnchorFile {
                anchors,
                updated_at: Some(Utc::now()),
                exported_at: None,
            };
            write_atomic(path, &serde_json::to_string_pretty(&file)?).await?;
            debug!("Saved {} anchors to {}", file.anchors.len(), path.display());
            self.anchors = file.anchors;
        } else {
            self.anchors = anchors;
        }
        Ok(())
    }
}

fn dedup_by_id(anchors: Vec<Anchor>) -> Vec<Anchor> {
    let mut seen = HashSet::new();
    anchors
        .into_iter()
        .filter(|a| seen.insert(a.id().to_string()))
        .collect()
}

async fn read_anchor_file(path: &Path) -> Result<AnchorFile> {
    let content = fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|source| AnchorError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Write using a temp file and rename so readers never see a partial file.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}
