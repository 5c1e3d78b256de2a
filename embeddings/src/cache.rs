//! Content-addressed vector cache.
//!
//! Entries are keyed by a fingerprint of `(source kind, source id, text hash,
//! model)`, and every lookup re-checks the stored text hash and model against
//! the caller's current values. Edited text or a different model therefore
//! always misses instead of returning a stale vector.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::Result;

/// What an embedded text belongs to. Anchors and papers share an id space,
/// so the kind is part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Anchor,
    Paper,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anchor => "anchor",
            Self::Paper => "paper",
        }
    }
}

/// Hex-encoded SHA-256 of the exact text that is sent to the provider.
pub fn text_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Lookup key for a cached vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub source_kind: SourceKind,
    pub source_id: String,
    fingerprint: String,
}

impl CacheKey {
    /// Build the key for `source_id` whose current text hashes to `text_hash`
    /// under `model`.
    pub fn new(
        source_kind: SourceKind,
        source_id: impl Into<String>,
        text_hash: &str,
        model: &str,
    ) -> Self {
        let source_id = source_id.into();
        let fingerprint = fingerprint(source_kind, &source_id, text_hash, model);
        Self {
            source_kind,
            source_id,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(source_kind: SourceKind, source_id: &str, text_hash: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [source_kind.as_str(), source_id, text_hash, model] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache entry for an embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint this entry is stored under.
    pub key: String,

    pub source_kind: SourceKind,

    pub source_id: String,

    /// Hash of the text that was embedded.
    pub text_hash: String,

    /// Model used to generate the embedding.
    pub model: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, embedding: Embedding, model: &str, text_hash: &str) -> Self {
        Self {
            key: key.fingerprint.clone(),
            source_kind: key.source_kind,
            source_id: key.source_id.clone(),
            text_hash: text_hash.to_string(),
            model: model.to_string(),
            embedding,
            created_at: Utc::now(),
        }
    }

    fn matches(&self, text_hash: &str, model: &str) -> bool {
        self.text_hash == text_hash && self.model == model
    }

    fn same_content(&self, other: &CacheEntry) -> bool {
        self.matches(&other.text_hash, &other.model) && self.embedding == other.embedding
    }

    /// Whether the stored key is the one its metadata would produce.
    fn is_consistent(&self) -> bool {
        self.key == fingerprint(self.source_kind, &self.source_id, &self.text_hash, &self.model)
    }
}

/// Persistent key -> vector store.
///
/// Reads take a shared lock; writes are serialized, and so are writes of the
/// backing file.
pub struct VectorCache {
    /// In-memory entries keyed by fingerprint.
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Serializes writes of the backing file.
    persist_lock: Mutex<()>,

    /// Set when the persisted state could not be used at open time.
    load_warning: Option<String>,
}

impl VectorCache {
    /// Create a cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            cache_path: None,
            persist_lock: Mutex::new(()),
            load_warning: None,
        }
    }

    /// Open a cache backed by `path`.
    ///
    /// Never fails: a missing file is an empty cache, and an unreadable or
    /// corrupt file is also treated as empty, with the reason available from
    /// [`VectorCache::load_warning`].
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut cache = Self {
            cache_path: Some(path.clone()),
            ..Self::in_memory()
        };

        match load_entries(&path).await {
            Ok(loaded) => {
                let mut skipped = 0usize;
                let mut entries = HashMap::with_capacity(loaded.len());
                for entry in loaded {
                    if entry.is_consistent() {
                        entries.insert(entry.key.clone(), entry);
                    } else {
                        skipped += 1;
                    }
                }
                if skipped > 0 {
                    let message = format!(
                        "dropped {skipped} inconsistent entries from {}",
                        path.display()
                    );
                    warn!("{message}");
                    cache.load_warning = Some(message);
                }
                info!("Loaded {} cache entries from disk", entries.len());
                cache.entries = Arc::new(RwLock::new(entries));
            }
            Err(e) => {
                let message = format!(
                    "ignoring unreadable embedding cache {}: {e}",
                    path.display()
                );
                warn!("{message}");
                cache.load_warning = Some(message);
            }
        }

        cache
    }

    /// Why the persisted state was discarded (fully or partly) at open time.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Get a vector, provided the stored entry was produced from text with
    /// `text_hash` by `model`.
    pub async fn get(&self, key: &CacheKey, text_hash: &str, model: &str) -> Option<Embedding> {
        let entries = self.entries.read().await;
        match entries.get(key.fingerprint()) {
            Some(entry) if entry.matches(text_hash, model) => Some(entry.embedding.clone()),
            Some(_) => {
                debug!(
                    "Stale cache entry for {} {}",
                    key.source_kind.as_str(),
                    key.source_id
                );
                None
            }
            None => None,
        }
    }

    /// Store a vector. Re-putting identical content is a no-op.
    pub async fn put(
        &self,
        key: &CacheKey,
        embedding: Embedding,
        model: &str,
        text_hash: &str,
    ) -> Result<()> {
        self.put_batch(vec![CacheEntry::new(key, embedding, model, text_hash)])
            .await
    }

    /// Store several vectors with at most one write of the backing file.
    pub async fn put_batch(&self, batch: Vec<CacheEntry>) -> Result<()> {
        let mut changed = 0usize;
        {
            let mut entries = self.entries.write().await;
            for entry in batch {
                if entries
                    .get(&entry.key)
                    .is_some_and(|existing| existing.same_content(&entry))
                {
                    continue;
                }
                entries.insert(entry.key.clone(), entry);
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(());
        }

        debug!("Cached {changed} embeddings");
        self.save().await
    }

    /// Check if a fingerprint is present, regardless of staleness.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().await.contains_key(key.fingerprint())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Keep only the entries for which `keep` returns true. Intended for
    /// external maintenance that prunes vectors of deleted anchors or old
    /// papers. Returns the number of entries removed.
    pub async fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| keep(entry));
            before - entries.len()
        };

        if removed > 0 {
            info!("Pruned {removed} cache entries");
            self.save().await?;
        }
        Ok(removed)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        info!("Cleared embedding cache");
        self.save().await
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut models: Vec<String> = entries
            .values()
            .map(|e| e.model.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        models.sort();
        CacheStats {
            entries: entries.len(),
            anchor_entries: entries
                .values()
                .filter(|e| e.source_kind == SourceKind::Anchor)
                .count(),
            models,
        }
    }

    /// Save cache to disk.
    async fn save(&self) -> Result<()> {
        let Some(ref path) = self.cache_path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;
        let content = {
            let entries = self.entries.read().await;
            let mut snapshot: Vec<&CacheEntry> = entries.values().collect();
            snapshot.sort_by(|a, b| a.key.cmp(&b.key));
            serde_json::to_string(&snapshot)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }
}

async fn load_entries(path: &Path) -> Result<Vec<CacheEntry>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Statistics about the vector cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Entries that belong to anchors; the rest are papers.
    pub anchor_entries: usize,

    /// Models with cached embeddings, sorted.
    pub models: Vec<String>,
}
