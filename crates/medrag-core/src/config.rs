use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MedragError;

/// Top-level configuration loaded from `.medrag.toml`.
///
/// Resolution: the `--config` path, else `.medrag.toml` in the working
/// directory, else defaults. API keys left unset fall back to environment
/// variables.
///
/// # Examples
///
/// ```
/// use medrag_core::MedragConfig;
///
/// let config = MedragConfig::default();
/// assert_eq!(config.retrieval.max_evidence, 5);
/// assert_eq!(config.corpus.expected_count, 60);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedragConfig {
    /// Local knowledge corpus.
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Embedding provider settings for semantic search.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Web search provider settings.
    #[serde(default)]
    pub web_search: WebSearchConfig,
    /// Stream sizes, timeouts, and fusion weights.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Keyword table overrides for triage.
    #[serde(default)]
    pub triage: TriageConfig,
}

impl MedragConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Io`] if the file cannot be read,
    /// [`MedragError::Toml`] if the content is not valid TOML, or
    /// [`MedragError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use medrag_core::MedragConfig;
    /// use std::path::Path;
    ///
    /// let config = MedragConfig::from_file(Path::new(".medrag.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, MedragError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Toml`] if parsing fails, or
    /// [`MedragError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use medrag_core::MedragConfig;
    ///
    /// let toml = r#"
    /// [retrieval.weights]
    /// web = 0.6
    /// "#;
    /// let config = MedragConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.weights.web, 0.6);
    /// assert_eq!(config.retrieval.weights.local, 0.5);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, MedragError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), MedragError> {
        self.retrieval.weights.validate()?;
        if self.retrieval.local_top_k == 0 {
            return Err(MedragError::Config(
                "retrieval.local_top_k must be at least 1".into(),
            ));
        }
        if !(1..=MAX_KEYWORD_HITS).contains(&self.retrieval.keyword_top_k) {
            return Err(MedragError::Config(format!(
                "retrieval.keyword_top_k must be between 1 and {MAX_KEYWORD_HITS}"
            )));
        }
        if !(1..=MAX_EVIDENCE).contains(&self.retrieval.max_evidence) {
            return Err(MedragError::Config(format!(
                "retrieval.max_evidence must be between 1 and {MAX_EVIDENCE}"
            )));
        }
        if self.retrieval.stream_timeout_secs == 0 {
            return Err(MedragError::Config(
                "retrieval.stream_timeout_secs must be at least 1".into(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(MedragError::Config(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where the local corpus lives and how many entries it must have.
///
/// # Examples
///
/// ```
/// use medrag_core::CorpusConfig;
///
/// let config = CorpusConfig::default();
/// assert_eq!(config.path.to_str(), Some("data/corpus.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSON file holding `[{ "id": 1, "content": "..." }, ...]`.
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
    /// Exact number of entries the deployment expects (default: 60).
    /// Zero accepts any non-empty corpus.
    #[serde(default = "default_expected_count")]
    pub expected_count: usize,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.json")
}

fn default_expected_count() -> usize {
    60
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
            expected_count: default_expected_count(),
        }
    }
}

/// Configuration for the embedding provider used by local semantic search.
///
/// Any OpenAI-compatible `/embeddings` endpoint works.
///
/// # Examples
///
/// ```
/// use medrag_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.api_key_env_var(), Some("OPENAI_API_KEY"));
/// assert_eq!(config.resolved_base_url(), "https://api.openai.com/v1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: `"openai"`, `"voyage"`, or `"ollama"` (default: `"openai"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Model name (default: `"text-embedding-3-small"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Texts per request when embedding the corpus (default: 64).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "openai".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            model: default_embedding_model(),
            base_url: None,
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    /// Environment variable consulted when `api_key` is unset.
    /// Local providers need no key.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "voyage" => Some("VOYAGE_API_KEY"),
            "ollama" => None,
            _ => Some("OPENAI_API_KEY"),
        }
    }

    /// Base URL, falling back to the provider's public endpoint.
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "voyage" => "https://api.voyageai.com/v1".into(),
            "ollama" => "http://localhost:11434/v1".into(),
            _ => "https://api.openai.com/v1".into(),
        }
    }
}

/// Web search provider configuration.
///
/// # Examples
///
/// ```
/// use medrag_core::WebSearchConfig;
///
/// let config = WebSearchConfig::default();
/// assert_eq!(config.num_results, 3);
/// assert_eq!(config.base_url, "https://google.serper.dev");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Provider name (default: `"serper"`).
    #[serde(default = "default_web_provider")]
    pub provider: String,
    /// API key. Falls back to `SERPER_API_KEY`.
    pub api_key: Option<String>,
    /// API base URL (default: `"https://google.serper.dev"`).
    #[serde(default = "default_web_base_url")]
    pub base_url: String,
    /// Results requested per query (default: 3).
    #[serde(default = "default_num_results")]
    pub num_results: usize,
    /// Country code sent as `gl` (default: `"us"`).
    #[serde(default = "default_country")]
    pub country: String,
    /// Language code sent as `hl` (default: `"en"`).
    #[serde(default = "default_language")]
    pub language: String,
    /// HTTP request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_web_provider() -> String {
    "serper".into()
}

fn default_web_base_url() -> String {
    "https://google.serper.dev".into()
}

fn default_num_results() -> usize {
    3
}

fn default_country() -> String {
    "us".into()
}

fn default_language() -> String {
    "en".into()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_web_provider(),
            api_key: None,
            base_url: default_web_base_url(),
            num_results: default_num_results(),
            country: default_country(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WebSearchConfig {
    /// Environment variable consulted when `api_key` is unset.
    pub const API_KEY_ENV: &'static str = "SERPER_API_KEY";
}

/// Largest fused evidence list a query may return.
pub const MAX_EVIDENCE: usize = 5;

/// Largest number of keyword-search hits fed into fusion.
pub const MAX_KEYWORD_HITS: usize = 3;

/// Sizes and timeouts of the evidence streams.
///
/// # Examples
///
/// ```
/// use medrag_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.local_top_k, 3);
/// assert_eq!(config.keyword_top_k, 3);
/// assert_eq!(config.stream_timeout_secs, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Corpus entries returned by semantic search (default: 3).
    #[serde(default = "default_top_k")]
    pub local_top_k: usize,
    /// Corpus entries returned by keyword search, 1 to 3 (default: 3).
    #[serde(default = "default_top_k")]
    pub keyword_top_k: usize,
    /// Length cap of the fused evidence list, 1 to 5 (default: 5).
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,
    /// Upper bound on each stream, in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub stream_timeout_secs: u64,
    /// Per-stream blend coefficients.
    #[serde(default)]
    pub weights: FusionWeights,
}

fn default_top_k() -> usize {
    3
}

fn default_max_evidence() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            local_top_k: default_top_k(),
            keyword_top_k: default_top_k(),
            max_evidence: default_max_evidence(),
            stream_timeout_secs: default_timeout_secs(),
            weights: FusionWeights::default(),
        }
    }
}

/// Per-stream weights applied to raw scores during fusion.
///
/// They need not sum to 1.
///
/// # Examples
///
/// ```
/// use medrag_core::FusionWeights;
///
/// let w = FusionWeights::default();
/// assert_eq!((w.local, w.web, w.keyword), (0.5, 0.3, 0.2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "default_local_weight")]
    pub local: f64,
    #[serde(default = "default_web_weight")]
    pub web: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword: f64,
}

fn default_local_weight() -> f64 {
    0.5
}

fn default_web_weight() -> f64 {
    0.3
}

fn default_keyword_weight() -> f64 {
    0.2
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            local: default_local_weight(),
            web: default_web_weight(),
            keyword: default_keyword_weight(),
        }
    }
}

impl FusionWeights {
    /// Reject weights that are zero, negative, or not finite.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Config`] naming the offending weight.
    pub fn validate(&self) -> Result<(), MedragError> {
        for (name, value) in [
            ("local", self.local),
            ("web", self.web),
            ("keyword", self.keyword),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MedragError::Config(format!(
                    "retrieval.weights.{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Optional replacements for the built-in triage vocabularies.
///
/// A list that is absent keeps the built-in table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    pub diabetes: Option<Vec<String>>,
    pub cardiac: Option<Vec<String>>,
    pub renal: Option<Vec<String>>,
    pub urgency: Option<Vec<String>>,
}
