//! Embedding providers for local semantic search.
//!
//! [`EmbeddingClient`] talks to any OpenAI-compatible `/embeddings` endpoint
//! (OpenAI, Voyage, Ollama). Voyage additionally receives `input_type` so
//! documents and queries are embedded asymmetrically.

use std::time::Duration;

use async_trait::async_trait;
use medrag_core::{EmbeddingConfig, MedragError};
use serde::{Deserialize, Serialize};

/// Turns text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed corpus texts. Returns one vector per text, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MedragError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MedragError>;
}

/// HTTP client for OpenAI-compatible embedding APIs.
///
/// # Examples
///
/// ```
/// use medrag_retrieval::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    batch_size: usize,
    send_input_type: bool,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

const REQUEST_TIMEOUT_SECS: u64 = 30;
const BATCH_DELAY_MS: u64 = 200;

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbedResponse {
    fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|item| item.index);
        self.data.into_iter().map(|item| item.embedding).collect()
    }
}

impl EmbeddingClient {
    /// Create a client for the OpenAI API with the given key.
    pub fn new(api_key: &str) -> Self {
        let config = EmbeddingConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.to_string()),
            base_url: config.resolved_base_url(),
            model: config.model,
            batch_size: config.batch_size,
            send_input_type: false,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the provider's API key env var if no key is in config.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Config`] if the provider needs a key and none
    /// is available, or if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use medrag_core::EmbeddingConfig;
    /// use medrag_retrieval::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig::default();
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, MedragError> {
        let api_key = match config.api_key_env_var() {
            Some(var) => Some(
                config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var(var).ok())
                    .ok_or_else(|| {
                        MedragError::Config(format!(
                            "embedding API key not found: set embedding.api_key in .medrag.toml or {var} env var"
                        ))
                    })?,
            ),
            None => config.api_key.clone(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MedragError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            send_input_type: config.provider == "voyage",
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, input: Vec<String>, input_type: &str) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input,
            input_type: self.send_input_type.then(|| input_type.to_string()),
        }
    }

    async fn post(&self, request: &EmbedRequest) -> Result<Vec<Vec<f32>>, MedragError> {
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MedragError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(MedragError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| MedragError::Embedding(format!("failed to parse response: {e}")))?;

        let vectors = parsed.into_vectors();
        if vectors.len() != request.input.len() {
            return Err(MedragError::Embedding(format!(
                "expected {} embeddings, got {}",
                request.input.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MedragError> {
        let mut all = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            let request = self.build_request(batch.to_vec(), "document");
            all.extend(self.post(&request).await?);
        }

        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MedragError> {
        let request = self.build_request(vec![text.to_string()], "query");
        self.post(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MedragError::Embedding("empty response from embedding API".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_request_omits_input_type() {
        let client = EmbeddingClient::new("test-key");
        let request = client.build_request(vec!["a".into(), "b".into()], "document");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
        assert!(json.get("input_type").is_none());
    }

    #[test]
    fn voyage_request_carries_input_type() {
        let config = EmbeddingConfig {
            provider: "voyage".into(),
            api_key: Some("vk".into()),
            model: "voyage-3".into(),
            ..EmbeddingConfig::default()
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        let json = serde_json::to_value(client.build_request(vec!["q".into()], "query")).unwrap();
        assert_eq!(json["input_type"], "query");
        assert_eq!(json["model"], "voyage-3");
    }

    #[test]
    fn response_is_reordered_by_index() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.4, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-3-small"
        }"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        let vectors = response.into_vectors();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.4, 0.5]]);
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            model: "nomic-embed-text".into(),
            ..EmbeddingConfig::default()
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert!(client.api_key.is_none());
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let config = EmbeddingConfig {
            api_key: Some("from-config".into()),
            ..EmbeddingConfig::default()
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        assert_eq!(client.api_key.as_deref(), Some("from-config"));
    }

    #[test]
    fn debug_hides_key() {
        let client = EmbeddingClient::new("secret-key");
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("text-embedding-3-small"));
    }
}
