//! Web evidence search through the Serper Google Search API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medrag_core::{Condition, MedragError, RetrievalHit, WebItem, WebItemKind, WebSearchConfig};
use serde::{Deserialize, Serialize};

/// Suffix appended to every web query.
pub const QUERY_SUFFIX: &str = "first aid emergency medical treatment";

/// Runs a live web search.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Up to roughly `num_results` results, in the engine's rank order.
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebItem>, MedragError>;
}

/// Client for `POST {base_url}/search` on serper.dev.
///
/// # Examples
///
/// ```
/// use medrag_retrieval::web::SerperClient;
///
/// let client = SerperClient::new("test-key");
/// assert_eq!(client.base_url(), "https://google.serper.dev");
/// ```
pub struct SerperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    country: String,
    language: String,
}

impl std::fmt::Debug for SerperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperClient")
            .field("base_url", &self.base_url)
            .field("country", &self.country)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
    gl: &'a str,
    hl: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
    knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[derive(Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    website: String,
}

impl SerperResponse {
    /// Knowledge panel first, then organic results in rank order.
    fn into_items(self) -> Vec<WebItem> {
        let mut items = Vec::with_capacity(self.organic.len() + 1);
        if let Some(kg) = self.knowledge_graph {
            items.push(WebItem {
                title: kg.title,
                snippet: kg.description,
                link: kg.website,
                kind: WebItemKind::KnowledgeGraph,
            });
        }
        items.extend(self.organic.into_iter().map(|r| WebItem {
            title: r.title,
            snippet: r.snippet,
            link: r.link,
            kind: WebItemKind::Organic,
        }));
        items
    }
}

impl SerperClient {
    /// Create a client with default endpoint and locale.
    pub fn new(api_key: &str) -> Self {
        let config = WebSearchConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: config.base_url,
            country: config.country,
            language: config.language,
        }
    }

    /// Create a client from a [`WebSearchConfig`].
    ///
    /// Falls back to `SERPER_API_KEY` env var if no key in config.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Config`] if no API key is available, the
    /// provider is not `serper`, or the HTTP client cannot be built.
    pub fn with_config(config: &WebSearchConfig) -> Result<Self, MedragError> {
        if config.provider != "serper" {
            return Err(MedragError::Config(format!(
                "unsupported web search provider: {}",
                config.provider
            )));
        }

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(WebSearchConfig::API_KEY_ENV).ok())
            .ok_or_else(|| {
                MedragError::Config(format!(
                    "web search API key not found: set web_search.api_key in .medrag.toml or {} env var",
                    WebSearchConfig::API_KEY_ENV
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MedragError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country: config.country.clone(),
            language: config.language.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl WebSearchProvider for SerperClient {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebItem>, MedragError> {
        let request = SerperRequest {
            q: query,
            num: num_results,
            gl: &self.country,
            hl: &self.language,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MedragError::WebSearch(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(MedragError::WebSearch(format!(
                "Serper API returned {status}: {body}"
            )));
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| MedragError::WebSearch(format!("failed to parse response: {e}")))?;

        Ok(parsed.into_items())
    }
}

/// Extra search terms for a detected condition.
pub fn condition_vocabulary(condition: Condition) -> &'static str {
    match condition {
        Condition::Diabetes => {
            "diabetes glucose insulin hypoglycemia ketoacidosis blood sugar emergency"
        }
        Condition::Cardiac => {
            "heart cardiac chest pain angina myocardial infarction CPR defibrillation emergency"
        }
        Condition::Renal => "kidney renal creatinine dialysis AKI CKD hyperkalemia emergency",
    }
}

/// The text actually sent to the search engine.
///
/// # Examples
///
/// ```
/// use medrag_core::Condition;
/// use medrag_retrieval::web::build_query;
///
/// assert_eq!(
///     build_query("my leg hurts", None),
///     "my leg hurts first aid emergency medical treatment"
/// );
/// assert!(build_query("high sugar", Some(Condition::Diabetes)).contains("insulin"));
/// ```
pub fn build_query(query: &str, condition: Option<Condition>) -> String {
    let mut out = query.trim().to_string();
    if let Some(condition) = condition {
        out.push(' ');
        out.push_str(condition_vocabulary(condition));
    }
    out.push(' ');
    out.push_str(QUERY_SUFFIX);
    out
}

/// Score of the result at 0-based `rank`: 1.0, 0.9, 0.8, ... never below 0.
pub fn rank_score(rank: usize) -> f64 {
    (1.0 - 0.1 * rank as f64).max(0.0)
}

/// Web stream of the hybrid search.
pub struct WebEvidenceSearch {
    provider: Arc<dyn WebSearchProvider>,
    num_results: usize,
}

impl std::fmt::Debug for WebEvidenceSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebEvidenceSearch")
            .field("num_results", &self.num_results)
            .finish_non_exhaustive()
    }
}

impl WebEvidenceSearch {
    pub fn new(provider: Arc<dyn WebSearchProvider>, num_results: usize) -> Self {
        Self {
            provider,
            num_results,
        }
    }

    /// Search the web for `query`, boosted by `condition`, and score each
    /// result by its rank.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; the caller decides whether a
    /// failed stream is fatal.
    pub async fn search(
        &self,
        query: &str,
        condition: Option<Condition>,
    ) -> Result<Vec<RetrievalHit>, MedragError> {
        let text = build_query(query, condition);
        tracing::debug!(query = %text, "web search");
        let items = self.provider.search(&text, self.num_results).await?;
        Ok(items
            .into_iter()
            .enumerate()
            .map(|(rank, item)| RetrievalHit::web(item, rank_score(rank)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<(String, usize)>>,
        items: Vec<WebItem>,
    }

    #[async_trait]
    impl WebSearchProvider for Recording {
        async fn search(&self, query: &str, n: usize) -> Result<Vec<WebItem>, MedragError> {
            self.seen.lock().unwrap().push((query.to_string(), n));
            Ok(self.items.clone())
        }
    }

    fn item(title: &str) -> WebItem {
        WebItem {
            title: title.into(),
            snippet: format!("{title} snippet"),
            link: format!("https://example.org/{title}"),
            kind: WebItemKind::Organic,
        }
    }

    #[test]
    fn rank_scores_decay_and_clamp() {
        assert_eq!(rank_score(0), 1.0);
        assert!((rank_score(1) - 0.9).abs() < 1e-12);
        assert!((rank_score(9) - 0.1).abs() < 1e-12);
        assert_eq!(rank_score(10), 0.0);
        assert_eq!(rank_score(25), 0.0);
    }

    #[test]
    fn query_with_condition_has_vocabulary_then_suffix() {
        let q = build_query("creatinine rose", Some(Condition::Renal));
        assert_eq!(
            q,
            "creatinine rose kidney renal creatinine dialysis AKI CKD hyperkalemia emergency \
             first aid emergency medical treatment"
        );
    }

    #[test]
    fn request_body_matches_serper_format() {
        let body = SerperRequest {
            q: "chest pain",
            num: 3,
            gl: "us",
            hl: "en",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"q": "chest pain", "num": 3, "gl": "us", "hl": "en"})
        );
    }

    #[test]
    fn response_puts_knowledge_graph_first() {
        let json = r#"{
            "searchParameters": {"q": "angina", "type": "search"},
            "knowledgeGraph": {
                "title": "Angina",
                "type": "Medical condition",
                "description": "Chest pain caused by reduced blood flow.",
                "website": "https://example.org/angina"
            },
            "organic": [
                {"title": "Angina first aid", "link": "https://a.example", "snippet": "Rest.", "position": 1},
                {"title": "When to call", "link": "https://b.example", "position": 2}
            ]
        }"#;
        let response: SerperResponse = serde_json::from_str(json).unwrap();
        let items = response.into_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, WebItemKind::KnowledgeGraph);
        assert_eq!(items[0].snippet, "Chest pain caused by reduced blood flow.");
        assert_eq!(items[1].title, "Angina first aid");
        assert_eq!(items[2].snippet, "");
    }

    #[test]
    fn response_without_results_is_empty() {
        let response: SerperResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_items().is_empty());
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = WebSearchConfig {
            provider: "bing".into(),
            api_key: Some("k".into()),
            ..WebSearchConfig::default()
        };
        assert!(matches!(
            SerperClient::with_config(&config),
            Err(MedragError::Config(_))
        ));
    }

    #[tokio::test]
    async fn hits_are_scored_by_rank() {
        let provider = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            items: vec![item("a"), item("b"), item("c")],
        });
        let search = WebEvidenceSearch::new(provider.clone(), 3);

        let hits = search.search("shaky and sweating", None).await.unwrap();
        let scores: Vec<f64> = hits.iter().map(|h| h.raw_score).collect();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0], 1.0);
        assert!((scores[1] - 0.9).abs() < 1e-12);
        assert!((scores[2] - 0.8).abs() < 1e-12);
        assert_eq!(hits[1].web_item().unwrap().title, "b");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                "shaky and sweating first aid emergency medical treatment".to_string(),
                3
            )
        );
    }
}
