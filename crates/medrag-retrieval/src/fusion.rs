//! Weighted fusion of the three evidence streams.
//!
//! Each hit keeps its stream's native score scale; fusion multiplies it by
//! the stream's weight and ranks everything together. Duplicates across
//! streams are kept, since they carry different provenance.

use medrag_core::{FusionWeights, RetrievalHit, SearchType, MAX_EVIDENCE};

/// Default length cap of the fused list.
pub const DEFAULT_MAX_EVIDENCE: usize = MAX_EVIDENCE;

fn weight_for(weights: &FusionWeights, stream: SearchType) -> f64 {
    match stream {
        SearchType::LocalSemantic => weights.local,
        SearchType::WebSearch => weights.web,
        SearchType::KeywordSearch => weights.keyword,
    }
}

/// Score, merge, and rank the three streams.
///
/// Every hit gets `final_score = raw_score * weight`. The streams are
/// concatenated in the order local, web, keyword, stably sorted by
/// descending `final_score`, and cut to `limit`, which never exceeds
/// [`MAX_EVIDENCE`].
///
/// # Examples
///
/// ```
/// use medrag_core::FusionWeights;
/// use medrag_retrieval::fusion::fuse;
///
/// // Empty inputs produce empty output
/// let fused = fuse(Vec::new(), Vec::new(), Vec::new(), &FusionWeights::default(), 5);
/// assert!(fused.is_empty());
/// ```
pub fn fuse(
    local: Vec<RetrievalHit>,
    web: Vec<RetrievalHit>,
    keyword: Vec<RetrievalHit>,
    weights: &FusionWeights,
    limit: usize,
) -> Vec<RetrievalHit> {
    let mut all: Vec<RetrievalHit> = local
        .into_iter()
        .chain(web)
        .chain(keyword)
        .map(|mut hit| {
            hit.final_score = hit.raw_score * weight_for(weights, hit.search_type());
            hit
        })
        .collect();

    all.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    all.truncate(limit.min(MAX_EVIDENCE));
    all
}
