//! In-memory embedding index and local semantic search.

use std::sync::Arc;

use medrag_core::{MedragError, RetrievalHit};
use once_cell::sync::OnceCell;

use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;

/// Cosine similarity of two vectors, computed in `f64`.
///
/// Vectors of different length, empty vectors, zero vectors, and vectors
/// with non-finite components score 0.
///
/// # Examples
///
/// ```
/// use medrag_retrieval::semantic::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    let similarity = dot / denom;
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Corpus vectors keyed by entry id.
///
/// The index is written exactly once by [`initialize`](Self::initialize) and
/// read without locking afterwards.
pub struct SemanticIndex {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: OnceCell<Vec<(u32, Vec<f32>)>>,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("entries", &self.vectors.get().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl SemanticIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            vectors: OnceCell::new(),
        }
    }

    /// Whether the corpus has been embedded.
    pub fn is_initialized(&self) -> bool {
        self.vectors.get().is_some()
    }

    /// Embed every corpus entry. Calling again after success is a no-op.
    ///
    /// Returns the number of indexed entries.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Embedding`] if the provider fails or returns
    /// the wrong number of vectors.
    pub async fn initialize(&self, corpus: &Corpus) -> Result<usize, MedragError> {
        if let Some(vectors) = self.vectors.get() {
            return Ok(vectors.len());
        }

        let texts: Vec<String> = corpus.entries().iter().map(|e| e.content.clone()).collect();
        let embeddings = self.provider.embed_documents(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(MedragError::Embedding(format!(
                "provider returned {} vectors for {} corpus entries",
                embeddings.len(),
                texts.len()
            )));
        }

        let vectors: Vec<(u32, Vec<f32>)> = corpus
            .entries()
            .iter()
            .map(|e| e.id)
            .zip(embeddings)
            .collect();
        let count = vectors.len();
        // A concurrent initializer may have won; its vectors are equivalent.
        let _ = self.vectors.set(vectors);
        tracing::info!(entries = count, "semantic index built");
        Ok(count)
    }

    /// Embed a query with the index's provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MedragError> {
        self.provider.embed_query(text).await
    }

    /// The `k` entries most similar to `query_vector`, best first.
    ///
    /// Equal scores are ordered by ascending id.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::NotInitialized`] before [`initialize`](Self::initialize).
    pub fn top_k_similar(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(u32, f64)>, MedragError> {
        let vectors = self.vectors.get().ok_or(MedragError::NotInitialized)?;

        let mut scored: Vec<(u32, f64)> = vectors
            .iter()
            .map(|(id, v)| (*id, cosine_similarity(query_vector, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Local semantic search: adapts similarity pairs into retrieval hits.
#[derive(Debug)]
pub struct LocalSemanticSearch {
    corpus: Arc<Corpus>,
    index: SemanticIndex,
}

impl LocalSemanticSearch {
    pub fn new(corpus: Arc<Corpus>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            corpus,
            index: SemanticIndex::new(provider),
        }
    }

    /// Embed the corpus. Must complete before the first [`search`](Self::search).
    ///
    /// # Errors
    ///
    /// See [`SemanticIndex::initialize`].
    pub async fn initialize(&self) -> Result<usize, MedragError> {
        self.index.initialize(&self.corpus).await
    }

    pub fn is_initialized(&self) -> bool {
        self.index.is_initialized()
    }

    /// Up to `top_k` corpus entries ranked by cosine similarity to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::NotInitialized`] if the corpus was never
    /// embedded, or the provider's error if the query cannot be embedded.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>, MedragError> {
        if !self.index.is_initialized() {
            return Err(MedragError::NotInitialized);
        }

        let query_vector = self.index.embed(query).await?;
        let hits = self
            .index
            .top_k_similar(&query_vector, top_k)?
            .into_iter()
            .filter_map(|(id, score)| {
                self.corpus
                    .get(id)
                    .map(|entry| RetrievalHit::local(Arc::clone(entry), score))
            })
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrag_core::SearchType;

    /// Embeds text as counts of three marker words.
    struct MarkerEmbedder;

    fn markers(text: &str) -> Vec<f32> {
        let t = text.to_lowercase();
        ["sugar", "heart", "kidney"]
            .iter()
            .map(|m| t.matches(m).count() as f32)
            .collect()
    }

    #[async_trait]
    impl EmbeddingProvider for MarkerEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MedragError> {
            Ok(texts.iter().map(|t| markers(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MedragError> {
            Ok(markers(text))
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed_documents(&self, _: &[String]) -> Result<Vec<Vec<f32>>, MedragError> {
            Err(MedragError::Embedding("503".into()))
        }

        async fn embed_query(&self, _: &str) -> Result<Vec<f32>, MedragError> {
            Err(MedragError::Embedding("503".into()))
        }
    }

    /// Every third document embeds with an infinite component.
    struct OverflowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for OverflowEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MedragError> {
            Ok((0..texts.len())
                .map(|i| if i % 3 == 0 { vec![f32::INFINITY, 1.0] } else { vec![1.0, 0.0] })
                .collect())
        }

        async fn embed_query(&self, _: &str) -> Result<Vec<f32>, MedragError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn corpus() -> Arc<Corpus> {
        Arc::new(
            Corpus::from_entries(
                vec![
                    (1, "Low blood sugar needs fast sugar.".to_string()),
                    (2, "Heart attack: chew aspirin.".to_string()),
                    (3, "Kidney injury: stop NSAIDs.".to_string()),
                    (4, "Heart and kidney both matter.".to_string()),
                ],
                0,
            )
            .unwrap(),
        )
    }

    #[test]
    fn cosine_similarity_correct() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_similarity_non_finite_scores_zero() {
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn non_finite_vectors_rank_without_panicking() {
        let entries: Vec<(u32, String)> = (1..=60)
            .map(|id| (id, format!("Corpus sentence {id}.")))
            .collect();
        let corpus = Arc::new(Corpus::from_entries(entries, 60).unwrap());
        let search = LocalSemanticSearch::new(corpus, Arc::new(OverflowEmbedder));
        search.initialize().await.unwrap();

        let hits = search.search("q", 3).await.unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.sentence().unwrap().id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
        assert!(hits.iter().all(|h| h.raw_score.is_finite()));
    }

    #[tokio::test]
    async fn search_before_initialize_is_precondition_failure() {
        let search = LocalSemanticSearch::new(corpus(), Arc::new(MarkerEmbedder));
        let err = search.search("sugar", 3).await.unwrap_err();
        assert!(matches!(err, MedragError::NotInitialized));
    }

    #[tokio::test]
    async fn top_k_is_ordered_and_truncated() {
        let search = LocalSemanticSearch::new(corpus(), Arc::new(MarkerEmbedder));
        assert_eq!(search.initialize().await.unwrap(), 4);

        let hits = search.search("my heart hurts", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].sentence().unwrap().id, 2);
        assert!((hits[0].raw_score - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].sentence().unwrap().id, 4);
        assert!(hits[0].raw_score >= hits[1].raw_score);
        assert!(hits.iter().all(|h| h.search_type() == SearchType::LocalSemantic));
    }

    #[tokio::test]
    async fn equal_scores_break_by_id() {
        let search = LocalSemanticSearch::new(corpus(), Arc::new(MarkerEmbedder));
        search.initialize().await.unwrap();
        // no marker words: every entry scores 0
        let hits = search.search("twisted ankle", 3).await.unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.sentence().unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let search = LocalSemanticSearch::new(corpus(), Arc::new(MarkerEmbedder));
        search.initialize().await.unwrap();
        assert!(search.is_initialized());
        assert_eq!(search.initialize().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn provider_failure_leaves_index_uninitialized() {
        let search = LocalSemanticSearch::new(corpus(), Arc::new(DownEmbedder));
        let err = search.initialize().await.unwrap_err();
        assert!(matches!(err, MedragError::Embedding(_)));
        assert!(!search.is_initialized());
    }
}
