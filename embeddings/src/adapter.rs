//! Cache-backed, batched access to an [`EmbeddingProvider`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, SourceKind, VectorCache, text_hash};
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;
use crate::Embedding;

/// Default number of texts per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default time allowed for one provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Vectors keyed by item id, in the order the items were given.
pub type EmbeddingMap = IndexMap<String, Embedding>;

/// One text to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedItem {
    pub id: String,
    pub kind: SourceKind,
    pub text: String,
}

impl EmbedItem {
    pub fn new(id: impl Into<String>, kind: SourceKind, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
        }
    }

    pub fn anchor(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, SourceKind::Anchor, text)
    }

    pub fn paper(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, SourceKind::Paper, text)
    }
}

/// A cache miss waiting for the provider.
struct Pending<'a> {
    item: &'a EmbedItem,
    key: CacheKey,
    text_hash: String,
}

/// Wraps a provider with the vector cache.
///
/// Every lookup goes through the cache first; misses are sent to the provider
/// in batches of at most `batch_size`, dispatched concurrently, and written
/// back to the cache before the call returns. A failed or timed-out batch
/// fails the whole call; no placeholder vectors are ever substituted.
pub struct EmbeddingAdapter<P> {
    provider: P,
    cache: Arc<VectorCache>,
    batch_size: usize,
    timeout: Duration,
}

impl<P: EmbeddingProvider> EmbeddingAdapter<P> {
    pub fn new(provider: P, cache: Arc<VectorCache>) -> Self {
        Self {
            provider,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Maximum number of texts per provider call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Time allowed for each provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<VectorCache> {
        &self.cache
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Embed `items`, returning one vector per item with non-blank text.
    ///
    /// Items with blank text are skipped. When an id repeats, only its first
    /// occurrence is embedded.
    pub async fn embed(&self, items: &[EmbedItem]) -> Result<EmbeddingMap> {
        let model = self.provider.model_id().to_string();

        let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
        let mut order: Vec<&str> = Vec::with_capacity(items.len());
        let mut resolved: HashMap<String, Embedding> = HashMap::with_capacity(items.len());
        let mut misses: Vec<Pending<'_>> = Vec::new();

        for item in items {
            if item.text.trim().is_empty() {
                debug!("Skipping {} {} with empty text", item.kind.as_str(), item.id);
                continue;
            }
            if !seen.insert(item.id.as_str()) {
                continue;
            }
            order.push(item.id.as_str());

            let hash = text_hash(&item.text);
            let key = CacheKey::new(item.kind, item.id.as_str(), &hash, &model);
            match self.cache.get(&key, &hash, &model).await {
                Some(embedding) => {
                    resolved.insert(item.id.clone(), embedding);
                }
                None => misses.push(Pending {
                    item,
                    key,
                    text_hash: hash,
                }),
            }
        }

        let hits = resolved.len();
        if !misses.is_empty() {
            let computed = self.embed_misses(&misses).await?;

            let mut entries = Vec::with_capacity(computed.len());
            for (pending, embedding) in misses.iter().zip(computed) {
                entries.push(CacheEntry::new(
                    &pending.key,
                    embedding.clone(),
                    &model,
                    &pending.text_hash,
                ));
                resolved.insert(pending.item.id.clone(), embedding);
            }

            if let Err(e) = self.cache.put_batch(entries).await {
                warn!("Failed to persist embedding cache: {e}");
            }
        }

        info!(
            "Embedded {} items ({hits} cached, {} computed) with model {model}",
            order.len(),
            misses.len()
        );

        let mut out = EmbeddingMap::with_capacity(order.len());
        for id in order {
            if let Some(embedding) = resolved.remove(id) {
                out.insert(id.to_string(), embedding);
            }
        }
        Ok(out)
    }

    /// Send the misses to the provider and return their vectors in order.
    async fn embed_misses(&self, misses: &[Pending<'_>]) -> Result<Vec<Embedding>> {
        let batches = misses.chunks(self.batch_size).map(|chunk| async move {
            let texts: Vec<String> = chunk.iter().map(|p| p.item.text.clone()).collect();
            let item_ids = || chunk.iter().map(|p| p.item.id.clone()).collect::<Vec<_>>();

            debug!("Dispatching embedding batch of {} texts", texts.len());
            let embeddings =
                match tokio::time::timeout(self.timeout, self.provider.embed_batch(&texts)).await {
                    Err(_) => {
                        return Err(EmbeddingError::Timeout {
                            item_ids: item_ids(),
                            timeout: self.timeout,
                        });
                    }
                    Ok(Err(e)) => {
                        return Err(EmbeddingError::ProviderFailed {
                            item_ids: item_ids(),
                            source: Box::new(e),
                        });
                    }
                    Ok(Ok(embeddings)) => embeddings,
                };

            if embeddings.len() != texts.len() {
                return Err(EmbeddingError::ProviderFailed {
                    item_ids: item_ids(),
                    source: Box::new(EmbeddingError::InvalidResponse(format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        embeddings.len()
                    ))),
                });
            }
            Ok(embeddings)
        });

        let results = try_join_all(batches).await?;
        Ok(results.into_iter().flatten().collect())
    }
}
