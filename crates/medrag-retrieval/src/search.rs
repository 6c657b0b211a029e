//! Hybrid search: triage, three concurrent evidence streams, fusion.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use medrag_core::{
    Condition, MedragConfig, MedragError, RetrievalConfig, RetrievalHit, SearchType, TriageResult,
};
use medrag_triage::Triage;
use serde::Serialize;

use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use crate::fusion::fuse;
use crate::keyword::KeywordSearch;
use crate::semantic::LocalSemanticSearch;
use crate::web::{WebEvidenceSearch, WebSearchProvider};

/// Ranked evidence for one query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridResult {
    /// Fused evidence, best first.
    pub evidence: Vec<RetrievalHit>,
    /// Triage of the query.
    pub triage: TriageResult,
    /// Streams that errored or timed out and contributed nothing.
    pub failed_streams: Vec<SearchType>,
}

impl HybridResult {
    /// The detected condition.
    pub fn condition(&self) -> Option<Condition> {
        self.triage.condition
    }

    /// Split into the evidence list and condition label.
    pub fn into_parts(self) -> (Vec<RetrievalHit>, Option<Condition>) {
        let condition = self.triage.condition;
        (self.evidence, condition)
    }
}

/// How one stream finished.
enum StreamOutcome {
    Completed(Vec<RetrievalHit>),
    Failed(MedragError),
}

async fn bounded<F>(stream: SearchType, limit: Duration, fut: F) -> StreamOutcome
where
    F: Future<Output = Result<Vec<RetrievalHit>, MedragError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(hits)) => StreamOutcome::Completed(hits),
        Ok(Err(e)) => StreamOutcome::Failed(e),
        Err(_) => StreamOutcome::Failed(MedragError::Timeout {
            stream,
            secs: limit.as_secs(),
        }),
    }
}

/// Collapse an outcome into hits. Boundary failures become an empty stream
/// and are recorded in `failed`; anything else is returned as an error.
fn settle(
    stream: SearchType,
    outcome: StreamOutcome,
    failed: &mut Vec<SearchType>,
) -> Result<Vec<RetrievalHit>, MedragError> {
    match outcome {
        StreamOutcome::Completed(hits) => {
            tracing::debug!(%stream, hits = hits.len(), "stream completed");
            Ok(hits)
        }
        StreamOutcome::Failed(e) if e.is_recoverable() => {
            tracing::warn!(%stream, error = %e, "stream failed, continuing without it");
            failed.push(stream);
            Ok(Vec::new())
        }
        StreamOutcome::Failed(e) => Err(e),
    }
}

/// The retrieval engine: one shared corpus, three streams, weighted fusion.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use medrag_core::MedragConfig;
/// use medrag_retrieval::embedding::EmbeddingClient;
/// use medrag_retrieval::web::SerperClient;
/// use medrag_retrieval::{Corpus, HybridSearch};
///
/// # async fn example() -> medrag_core::Result<()> {
/// let config = MedragConfig::default();
/// let corpus = Arc::new(Corpus::load(&config.corpus.path, config.corpus.expected_count)?);
/// let search = HybridSearch::from_config(
///     corpus,
///     Arc::new(EmbeddingClient::with_config(&config.embedding)?),
///     Arc::new(SerperClient::with_config(&config.web_search)?),
///     &config,
/// );
/// search.initialize().await?;
/// let (evidence, condition) = search.search("crushing chest pain").await?.into_parts();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HybridSearch {
    triage: Triage,
    local: LocalSemanticSearch,
    web: WebEvidenceSearch,
    keyword: KeywordSearch,
    config: RetrievalConfig,
}

impl HybridSearch {
    /// Assemble an engine from its parts.
    pub fn new(
        triage: Triage,
        local: LocalSemanticSearch,
        web: WebEvidenceSearch,
        keyword: KeywordSearch,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            triage,
            local,
            web,
            keyword,
            config,
        }
    }

    /// Wire up every stream from a [`MedragConfig`].
    pub fn from_config(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        web: Arc<dyn WebSearchProvider>,
        config: &MedragConfig,
    ) -> Self {
        Self::new(
            Triage::from_config(&config.triage),
            LocalSemanticSearch::new(Arc::clone(&corpus), embedder),
            WebEvidenceSearch::new(web, config.web_search.num_results),
            KeywordSearch::new(corpus, config.retrieval.keyword_top_k),
            config.retrieval.clone(),
        )
    }

    /// Embed the corpus for semantic search. Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Embedding`] if the provider fails.
    pub async fn initialize(&self) -> Result<usize, MedragError> {
        self.local.initialize().await
    }

    /// The triage classifier in use.
    pub fn triage(&self) -> &Triage {
        &self.triage
    }

    /// Run the full pipeline for `query`.
    ///
    /// The three streams run concurrently, each bounded by
    /// `stream_timeout_secs`. A stream that fails or times out contributes
    /// nothing, so a query where every stream fails still yields an empty
    /// evidence list.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::NotInitialized`] if [`initialize`](Self::initialize)
    /// has not completed.
    pub async fn search(&self, query: &str) -> Result<HybridResult, MedragError> {
        if !self.local.is_initialized() {
            return Err(MedragError::NotInitialized);
        }

        let triage = self.triage.assess(query);
        let limit = Duration::from_secs(self.config.stream_timeout_secs);

        let (local, web, keyword) = tokio::join!(
            bounded(
                SearchType::LocalSemantic,
                limit,
                self.local.search(query, self.config.local_top_k),
            ),
            bounded(
                SearchType::WebSearch,
                limit,
                self.web.search(query, triage.condition),
            ),
            async { StreamOutcome::Completed(self.keyword.search(&triage.keywords)) },
        );

        let mut failed_streams = Vec::new();
        let local = settle(SearchType::LocalSemantic, local, &mut failed_streams)?;
        let web = settle(SearchType::WebSearch, web, &mut failed_streams)?;
        let keyword = settle(SearchType::KeywordSearch, keyword, &mut failed_streams)?;

        let evidence = fuse(
            local,
            web,
            keyword,
            &self.config.weights,
            self.config.max_evidence,
        );
        tracing::debug!(
            condition = ?triage.condition,
            urgency = %triage.urgency,
            evidence = evidence.len(),
            "hybrid search finished"
        );

        Ok(HybridResult {
            evidence,
            triage,
            failed_streams,
        })
    }
}
