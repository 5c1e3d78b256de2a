//! Configuration for the ranking engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use paperfeed_embeddings::OpenAIProvider;
use serde::{Deserialize, Serialize};

use crate::error::{MatcherError, Result};

/// Relevance threshold used when none is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.35;

/// Texts per provider call used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Provider call timeout used when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the ranking engine.
///
/// Unknown keys are rejected when parsing, and every value is checked by
/// [`MatcherConfig::validate`] before any I/O happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherConfig {
    /// Directory holding the anchor store and the vector cache.
    pub data_dir: PathBuf,

    /// Minimum relevance score (0.0 to 1.0), inclusive.
    pub threshold: f32,

    /// Maximum number of texts per embedding provider call.
    pub embedding_batch_size: usize,

    /// Time allowed for each embedding provider call, in milliseconds.
    pub embedding_timeout_ms: u64,

    /// Keep at most this many ranked results.
    pub max_results: Option<usize>,

    /// Embedding model to request from the provider.
    pub model: Option<String>,
}

impl MatcherConfig {
    /// Create a new configuration with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            threshold: DEFAULT_THRESHOLD,
            embedding_batch_size: DEFAULT_BATCH_SIZE,
            embedding_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_results: None,
            model: None,
        }
    }

    /// Set the relevance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the provider batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size;
        self
    }

    /// Set the provider call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Limit the number of results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    /// Location of the persisted anchor store.
    pub fn anchors_path(&self) -> PathBuf {
        self.data_dir.join("anchors.json")
    }

    /// Location of the vector cache for `model_id`. Each model gets its own
    /// file.
    pub fn cache_path(&self, model_id: &str) -> PathBuf {
        let model: String = model_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.data_dir.join(format!("embeddings_cache_{model}.json"))
    }

    /// An OpenAI-compatible provider using the configured model, if any.
    pub fn openai_provider(&self) -> OpenAIProvider {
        match &self.model {
            Some(model) => OpenAIProvider::new().with_model(model.trim()),
            None => OpenAIProvider::new(),
        }
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_threshold(self.threshold) {
            return Err(MatcherError::InvalidConfig(format!(
                "threshold must be within [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(MatcherError::InvalidConfig(
                "embedding_batch_size must be positive".to_string(),
            ));
        }
        if self.embedding_timeout_ms == 0 {
            return Err(MatcherError::InvalidConfig(
                "embedding_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_results == Some(0) {
            return Err(MatcherError::InvalidConfig(
                "max_results must be positive when set".to_string(),
            ));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(MatcherError::InvalidConfig(
                "model must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| MatcherError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("paperfeed"))
    }
}

pub(crate) fn is_valid_threshold(threshold: f32) -> bool {
    (0.0..=1.0).contains(&threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatcherConfig::new("/tmp/paperfeed");
        config.validate().unwrap();
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.embedding_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_results, None);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let base = MatcherConfig::new("/tmp/paperfeed");
        for config in [
            base.clone().with_threshold(1.5),
            base.clone().with_threshold(-0.1),
            base.clone().with_threshold(f32::NAN),
            base.clone().with_batch_size(0),
            base.clone().with_timeout(Duration::ZERO),
            base.clone().with_max_results(0),
            base.clone().with_model("  "),
        ] {
            assert!(matches!(
                config.validate(),
                Err(MatcherError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_from_toml() {
        let config = MatcherConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/paperfeed"
            threshold = 0.5
            embedding_batch_size = 16
            max_results = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/paperfeed"));
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.embedding_batch_size, 16);
        assert_eq!(config.embedding_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_results, Some(20));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = MatcherConfig::from_toml_str("treshold = 0.5").unwrap_err();
        assert!(matches!(err, MatcherError::InvalidConfig(_)));
    }

    #[test]
    fn test_out_of_range_toml_is_rejected() {
        let err = MatcherConfig::from_toml_str("threshold = 2.0").unwrap_err();
        assert!(matches!(err, MatcherError::InvalidConfig(_)));
    }

    #[test]
    fn test_model_override_reaches_provider() {
        use paperfeed_embeddings::{DEFAULT_MODEL, EmbeddingProvider};

        let config = MatcherConfig::new("/data");
        assert_eq!(config.openai_provider().model_id(), DEFAULT_MODEL);

        let config = config.with_model("text-embedding-3-large");
        assert_eq!(config.openai_provider().model_id(), "text-embedding-3-large");
    }

    #[test]
    fn test_cache_path_is_per_model() {
        let config = MatcherConfig::new("/data");
        assert_eq!(
            config.cache_path("sentence-transformers/all-MiniLM-L6-v2"),
            PathBuf::from("/data/embeddings_cache_sentence-transformers_all-MiniLM-L6-v2.json")
        );
        assert_ne!(config.cache_path("a"), config.cache_path("b"));
    }
}
