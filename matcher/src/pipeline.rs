//! The ranking pipeline.
//!
//! One call runs these stages in order and either returns a complete ranking
//! or fails as a whole:
//!
//! 1. validate the threshold and require at least one anchor
//! 2. dedup papers by id, first occurrence wins
//! 3. embed anchors, then papers (cache first, batched provider calls)
//! 4. score every paper against all anchors
//! 5. keep scores `>= threshold`
//! 6. order by score desc, published desc, id asc; apply `max_results`

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use paperfeed_anchors::{AnchorError, AnchorStore, PaperRecord};
use paperfeed_embeddings::{
    EmbedItem, EmbeddingAdapter, EmbeddingMap, EmbeddingProvider, VectorCache, cosine_similarity,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{MatcherConfig, is_valid_threshold};
use crate::error::{MatcherError, Result};
use crate::scorer::{self, clamp_score};

/// A paper that passed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub paper: PaperRecord,

    /// Best similarity to any anchor, in [0.0, 1.0].
    pub score: f32,

    /// Id of the anchor that produced `score`.
    pub matched_anchor_id: String,
}

/// Ranks paper batches against the anchors in an [`AnchorStore`].
pub struct RankingPipeline<P> {
    config: MatcherConfig,

    /// Shared with whatever manages anchors; read once per ranking call.
    anchors: Arc<RwLock<AnchorStore>>,

    adapter: EmbeddingAdapter<P>,
}

impl<P: EmbeddingProvider> RankingPipeline<P> {
    /// Assemble a pipeline from existing components.
    pub fn new(
        config: MatcherConfig,
        anchors: Arc<RwLock<AnchorStore>>,
        provider: P,
        cache: Arc<VectorCache>,
    ) -> Result<Self> {
        config.validate()?;
        let adapter = EmbeddingAdapter::new(provider, cache)
            .with_batch_size(config.embedding_batch_size)
            .with_timeout(config.embedding_timeout());
        Ok(Self {
            config,
            anchors,
            adapter,
        })
    }

    /// Open the anchor store and the model's vector cache under
    /// `config.data_dir`.
    pub async fn open(config: MatcherConfig, provider: P) -> Result<Self> {
        config.validate()?;
        info!("Opening ranking pipeline in {}", config.data_dir.display());

        let store = AnchorStore::open(config.anchors_path()).await?;
        let cache = VectorCache::open(config.cache_path(provider.model_id())).await;
        if let Some(reason) = cache.load_warning() {
            warn!("Starting with a degraded embedding cache: {reason}");
        }

        Self::new(
            config,
            Arc::new(RwLock::new(store)),
            provider,
            Arc::new(cache),
        )
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn anchors(&self) -> &Arc<RwLock<AnchorStore>> {
        &self.anchors
    }

    pub fn adapter(&self) -> &EmbeddingAdapter<P> {
        &self.adapter
    }

    /// Rank `papers` with the configured threshold.
    pub async fn rank(&self, papers: Vec<PaperRecord>) -> Result<Vec<RankedResult>> {
        self.rank_with_threshold(papers, self.config.threshold).await
    }

    /// Rank `papers`, keeping those scoring at least `threshold`.
    pub async fn rank_with_threshold(
        &self,
        papers: Vec<PaperRecord>,
        threshold: f32,
    ) -> Result<Vec<RankedResult>> {
        check_threshold(threshold)?;

        let anchor_items: Vec<EmbedItem> = {
            let store = self.anchors.read().await;
            store
                .list()
                .iter()
                .map(|a| EmbedItem::anchor(a.id(), a.text()))
                .collect()
        };
        if anchor_items.is_empty() {
            return Err(MatcherError::NoAnchors);
        }

        let papers = dedup_papers(papers);
        info!(
            "Ranking {} papers against {} anchors (threshold {threshold})",
            papers.len(),
            anchor_items.len()
        );

        let anchor_vectors = self.adapter.embed(&anchor_items).await?;
        let paper_vectors = self.embed_papers(&papers).await?;

        let mut results = Vec::new();
        for paper in papers {
            let Some(vector) = paper_vectors.get(&paper.id) else {
                continue;
            };
            let best = scorer::score(vector, &anchor_vectors)?;
            debug!(
                "Paper {} scored {:.4} via anchor {}",
                paper.id, best.score, best.anchor_id
            );
            if best.score >= threshold {
                results.push(RankedResult {
                    paper,
                    score: best.score,
                    matched_anchor_id: best.anchor_id,
                });
            }
        }

        Ok(self.finish(results))
    }

    /// Rank `papers` by similarity to a single reference paper instead of the
    /// anchor set. The reference itself is never part of the result.
    pub async fn find_similar(
        &self,
        reference: &PaperRecord,
        papers: Vec<PaperRecord>,
        threshold: f32,
    ) -> Result<Vec<RankedResult>> {
        check_threshold(threshold)?;

        let reference_text = reference.embedding_text();
        if reference_text.is_empty() {
            return Err(AnchorError::EmptyText.into());
        }

        let papers: Vec<PaperRecord> = dedup_papers(papers)
            .into_iter()
            .filter(|p| p.id != reference.id)
            .collect();

        let reference_vectors = self
            .adapter
            .embed(&[EmbedItem::paper(reference.id.as_str(), reference_text)])
            .await?;
        let Some(reference_vector) = reference_vectors.get(&reference.id) else {
            return Err(AnchorError::EmptyText.into());
        };
        let paper_vectors = self.embed_papers(&papers).await?;

        let mut results = Vec::new();
        for paper in papers {
            let Some(vector) = paper_vectors.get(&paper.id) else {
                continue;
            };
            let score = clamp_score(cosine_similarity(reference_vector, vector)?);
            if score >= threshold {
                results.push(RankedResult {
                    paper,
                    score,
                    matched_anchor_id: reference.id.clone(),
                });
            }
        }

        Ok(self.finish(results))
    }

    async fn embed_papers(&self, papers: &[PaperRecord]) -> Result<EmbeddingMap> {
        let items: Vec<EmbedItem> = papers
            .iter()
            .map(|p| EmbedItem::paper(p.id.as_str(), p.embedding_text()))
            .collect();
        let vectors = self.adapter.embed(&items).await?;

        let skipped = papers.len() - vectors.len();
        if skipped > 0 {
            warn!("Skipped {skipped} papers with no title or abstract");
        }
        Ok(vectors)
    }

    /// Order, then truncate.
    fn finish(&self, mut results: Vec<RankedResult>) -> Vec<RankedResult> {
        results.sort_by(compare_results);
        if let Some(max) = self.config.max_results {
            results.truncate(max);
        }
        info!("Ranking produced {} results", results.len());
        results
    }
}

fn check_threshold(threshold: f32) -> Result<()> {
    if is_valid_threshold(threshold) {
        Ok(())
    } else {
        Err(MatcherError::InvalidThreshold(threshold))
    }
}

/// Collapse papers sharing an id, keeping the first and its position.
fn dedup_papers(papers: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let total = papers.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<PaperRecord> = papers
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect();
    if unique.len() < total {
        debug!("Dropped {} duplicate papers", total - unique.len());
    }
    unique
}

/// Score desc, then newer first, then id asc.
fn compare_results(a: &RankedResult, b: &RankedResult) -> Ordering {
    OrderedFloat(b.score)
        .cmp(&OrderedFloat(a.score))
        .then_with(|| b.paper.published_at.cmp(&a.paper.published_at))
        .then_with(|| a.paper.id.cmp(&b.paper.id))
}
