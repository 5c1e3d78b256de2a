//! End-to-end ranking scenarios against a deterministic provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use paperfeed_anchors::{AnchorKind, AnchorStore, PaperRecord};
use paperfeed_embeddings::{EmbeddingError, MockProvider, VectorCache};
use paperfeed_matcher::{MatcherConfig, MatcherError, RankingPipeline};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::RwLock;

const RLHF: &str = "reinforcement learning from human feedback";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// A paper whose embedding text is exactly its title.
fn paper(id: &str, title: &str, day: u32) -> PaperRecord {
    PaperRecord::new(id, title, "", at(day))
}

fn provider() -> MockProvider {
    MockProvider::new("mock-v1")
        .with_vector(RLHF, vec![1.0, 0.0, 0.0])
        .with_vector("graph neural networks", vec![0.0, 0.0, 1.0])
        .with_vector("RLHF for code generation", vec![4.0, 3.0, 0.0])
        .with_vector("String theory in 11 dimensions", vec![0.05, 0.998_749, 0.0])
        .with_vector("Reward hacking in practice", vec![3.0, 4.0, 0.0])
        .with_vector("Preference optimization", vec![3.0, 4.0, 0.0])
        .with_vector("Message passing on molecules", vec![0.0, 0.6, 0.8])
}

async fn pipeline_with(
    provider: MockProvider,
    topics: &[&str],
    config: MatcherConfig,
) -> RankingPipeline<MockProvider> {
    init_tracing();
    let mut store = AnchorStore::in_memory();
    for topic in topics {
        store.add(AnchorKind::Topic, topic).await.unwrap();
    }
    RankingPipeline::new(
        config,
        Arc::new(RwLock::new(store)),
        provider,
        Arc::new(VectorCache::in_memory()),
    )
    .unwrap()
}

async fn pipeline(provider: MockProvider, topics: &[&str]) -> RankingPipeline<MockProvider> {
    pipeline_with(provider, topics, MatcherConfig::new("/unused")).await
}

fn ids(results: &[paperfeed_matcher::RankedResult]) -> Vec<&str> {
    results.iter().map(|r| r.paper.id.as_str()).collect()
}

#[tokio::test]
async fn test_relevant_paper_is_kept_and_unrelated_dropped() {
    let pipeline = pipeline(provider(), &[RLHF]).await;
    let papers = vec![
        paper("2403.00001", "RLHF for code generation", 1),
        paper("2403.00002", "String theory in 11 dimensions", 1),
    ];

    let results = pipeline.rank_with_threshold(papers, 0.35).await.unwrap();

    assert_eq!(ids(&results), vec!["2403.00001"]);
    assert!((results[0].score - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn test_configured_threshold_is_used_by_rank() {
    let config = MatcherConfig::new("/unused").with_threshold(0.9);
    let pipeline = pipeline_with(provider(), &[RLHF], config).await;

    let results = pipeline
        .rank(vec![paper("p1", "RLHF for code generation", 1)])
        .await
        .unwrap();

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_equal_scores_order_newer_first() {
    let pipeline = pipeline(provider(), &[RLHF]).await;
    let papers = vec![
        paper("older", "Reward hacking in practice", 1),
        paper("newer", "Preference optimization", 2),
    ];

    let results = pipeline.rank_with_threshold(papers, 0.35).await.unwrap();

    assert_eq!(ids(&results), vec!["newer", "older"]);
    assert_eq!(results[0].score, results[1].score);
}

#[tokio::test]
async fn test_full_ties_order_by_id() {
    let pipeline = pipeline(provider(), &[RLHF]).await;
    let papers = vec![
        paper("b", "Reward hacking in practice", 1),
        paper("a", "Preference optimization", 1),
    ];

    let results = pipeline.rank_with_threshold(papers, 0.0).await.unwrap();

    assert_eq!(ids(&results), vec!["a", "b"]);
}

#[tokio::test]
async fn test_threshold_is_inclusive() {
    let papers = || vec![paper("p", "Reward hacking in practice", 1)];
    let pipeline = pipeline(provider(), &[RLHF]).await;

    // cos([3, 4, 0], [1, 0, 0]) is exactly 0.6.
    let at_threshold = pipeline.rank_with_threshold(papers(), 0.6).await.unwrap();
    assert_eq!(ids(&at_threshold), vec!["p"]);
    assert_eq!(at_threshold[0].score, 0.6);

    let just_above = f32::from_bits(0.6f32.to_bits() + 1);
    let excluded = pipeline
        .rank_with_threshold(papers(), just_above)
        .await
        .unwrap();
    assert!(excluded.is_empty());
}

#[tokio::test]
async fn test_duplicate_ids_keep_first_occurrence() {
    let pipeline = pipeline(provider(), &[RLHF]).await;
    let papers = vec![
        paper("dup", "RLHF for code generation", 1),
        paper("dup", "Reward hacking in practice", 2),
    ];

    let results = pipeline.rank_with_threshold(papers, 0.0).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].paper.title, "RLHF for code generation");
}

#[tokio::test]
async fn test_best_anchor_wins_over_average() {
    let pipeline = pipeline(provider(), &[RLHF, "graph neural networks"]).await;
    let gnn_id = pipeline.anchors().read().await.list()[1].id().to_string();

    // 0.8 against the second anchor, 0.0 against the first; a mean would be 0.4.
    let results = pipeline
        .rank_with_threshold(vec![paper("m", "Message passing on molecules", 1)], 0.5)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!((results[0].score - 0.8).abs() < 1e-6);
    assert_eq!(results[0].matched_anchor_id, gnn_id);
}

#[tokio::test]
async fn test_no_anchors_fails_without_provider_calls() {
    let provider = provider();
    let pipeline = pipeline(provider.clone(), &[]).await;

    let err = pipeline
        .rank(vec![paper("p", "RLHF for code generation", 1)])
        .await
        .unwrap_err();

    assert!(matches!(err, MatcherError::NoAnchors));
    assert!(err.to_string().contains("add at least one topic or saved paper"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_empty_paper_batch_is_not_an_error() {
    let pipeline = pipeline(provider(), &[RLHF]).await;
    let results = pipeline.rank(Vec::new()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_warm_cache_reruns_are_identical_and_free() {
    let provider = provider();
    let pipeline = pipeline(provider.clone(), &[RLHF, "graph neural networks"]).await;
    let papers = vec![
        paper("1", "RLHF for code generation", 3),
        paper("2", "Reward hacking in practice", 1),
        paper("3", "Preference optimization", 2),
        paper("4", "Message passing on molecules", 1),
        paper("5", "String theory in 11 dimensions", 4),
    ];

    let first = pipeline.rank_with_threshold(papers.clone(), 0.1).await.unwrap();
    let calls_after_first = provider.call_count();
    let second = pipeline.rank_with_threshold(papers, 0.1).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(provider.call_count(), calls_after_first);
}

#[tokio::test]
async fn test_new_anchor_text_triggers_one_fresh_call() {
    let provider = provider();
    let pipeline = pipeline(provider.clone(), &[RLHF]).await;
    let papers = vec![paper("1", "RLHF for code generation", 1)];

    pipeline.rank(papers.clone()).await.unwrap();
    pipeline.rank(papers.clone()).await.unwrap();
    // One call for the anchor, one for the paper; the rerun is fully cached.
    assert_eq!(provider.call_count(), 2);

    // Editing an anchor means replacing it with a new one.
    {
        let mut store = pipeline.anchors().write().await;
        let old_id = store.list()[0].id().to_string();
        store.remove(&old_id).await.unwrap();
        store.add(AnchorKind::Topic, "graph neural networks").await.unwrap();
    }
    pipeline.rank(papers).await.unwrap();

    assert_eq!(provider.call_count(), 3);
    let batches = provider.batches().await;
    assert_eq!(batches[2], vec!["graph neural networks".to_string()]);
}

#[tokio::test]
async fn test_provider_failure_fails_the_whole_ranking() {
    let provider = provider().failing_on("String theory in 11 dimensions");
    let config = MatcherConfig::new("/unused").with_batch_size(1);
    let pipeline = pipeline_with(provider, &[RLHF], config).await;

    let err = pipeline
        .rank(vec![
            paper("good", "RLHF for code generation", 1),
            paper("bad", "String theory in 11 dimensions", 1),
        ])
        .await
        .unwrap_err();

    assert!(err.is_transient());
    match err {
        MatcherError::Embedding(ref e @ EmbeddingError::ProviderFailed { .. }) => {
            assert_eq!(e.failed_item_ids().to_vec(), vec!["bad".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_provider_timeout_fails_the_whole_ranking() {
    let provider = provider().with_delay(Duration::from_millis(500));
    let config = MatcherConfig::new("/unused").with_timeout(Duration::from_millis(20));
    let pipeline = pipeline_with(provider, &[RLHF], config).await;

    let err = pipeline
        .rank(vec![paper("p", "RLHF for code generation", 1)])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MatcherError::Embedding(EmbeddingError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_persisted_state_survives_restart() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = MatcherConfig::new(temp_dir.path());
    let papers = vec![paper("1", "RLHF for code generation", 1)];

    let first_provider = provider();
    let first = {
        let pipeline = RankingPipeline::open(config.clone(), first_provider.clone())
            .await
            .unwrap();
        pipeline
            .anchors()
            .write()
            .await
            .add_topic(RLHF, Some("RLHF"))
            .await
            .unwrap();
        pipeline.rank(papers.clone()).await.unwrap()
    };
    assert_eq!(first_provider.call_count(), 2);

    let second_provider = provider();
    let pipeline = RankingPipeline::open(config, second_provider.clone())
        .await
        .unwrap();
    let second = pipeline.rank(papers).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second_provider.call_count(), 0);
}

#[tokio::test]
async fn test_corrupt_cache_file_only_costs_recomputation() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = MatcherConfig::new(temp_dir.path());
    let provider = provider();
    std::fs::write(config.cache_path("mock-v1"), b"\x00\x01 garbage").unwrap();

    let pipeline = RankingPipeline::open(config, provider.clone()).await.unwrap();
    assert!(pipeline.adapter().cache().load_warning().is_some());
    pipeline
        .anchors()
        .write()
        .await
        .add(AnchorKind::Topic, RLHF)
        .await
        .unwrap();

    let results = pipeline
        .rank(vec![paper("1", "RLHF for code generation", 1)])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_saved_paper_anchor_matches_related_work() {
    let saved = PaperRecord::new("2402.11111", "Reward hacking in practice", "", at(1));
    let provider = provider();
    let pipeline = pipeline(provider, &[]).await;
    let anchor = pipeline
        .anchors()
        .write()
        .await
        .save_paper(&saved)
        .await
        .unwrap();

    let results = pipeline
        .rank_with_threshold(vec![paper("n", "Preference optimization", 2)], 0.9)
        .await
        .unwrap();

    assert_eq!(ids(&results), vec!["n"]);
    assert_eq!(results[0].matched_anchor_id, anchor.id());
}
