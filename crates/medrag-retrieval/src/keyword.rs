//! Keyword-overlap search over the corpus, independent of embeddings.

use std::collections::BTreeSet;
use std::sync::Arc;

use medrag_core::{CorpusEntry, RetrievalHit, MAX_KEYWORD_HITS};

use crate::corpus::Corpus;

/// Literal substring matching of triage keywords against corpus sentences.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
/// use medrag_retrieval::{keyword::KeywordSearch, Corpus};
///
/// let corpus = Arc::new(Corpus::from_entries(
///     vec![
///         (1, "Rising creatinine signals kidney injury.".to_string()),
///         (2, "Keep the airway open.".to_string()),
///     ],
///     0,
/// ).unwrap());
/// let search = KeywordSearch::new(corpus, 3);
/// let keywords: BTreeSet<String> = ["kidney", "creatinine"].map(String::from).into();
/// let hits = search.search(&keywords);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].raw_score, 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct KeywordSearch {
    entries: Vec<(Arc<CorpusEntry>, String)>,
    limit: usize,
}

impl KeywordSearch {
    /// Index `corpus` for keyword search returning at most `limit` hits,
    /// capped at [`MAX_KEYWORD_HITS`].
    pub fn new(corpus: Arc<Corpus>, limit: usize) -> Self {
        let entries = corpus
            .entries()
            .iter()
            .map(|e| (Arc::clone(e), e.content.to_lowercase()))
            .collect();
        Self {
            entries,
            limit: limit.min(MAX_KEYWORD_HITS),
        }
    }

    /// Entries containing at least one keyword, scored by the fraction of
    /// keywords they contain.
    ///
    /// Sorted by score descending, then id ascending. An empty keyword set
    /// returns no hits.
    pub fn search(&self, keywords: &BTreeSet<String>) -> Vec<RetrievalHit> {
        if keywords.is_empty() {
            return Vec::new();
        }

        let needles: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let total = keywords.len() as f64;

        let mut scored: Vec<(&Arc<CorpusEntry>, f64)> = self
            .entries
            .iter()
            .filter_map(|(entry, lowered)| {
                let matched = needles
                    .iter()
                    .filter(|k| lowered.contains(k.as_str()))
                    .count();
                (matched > 0).then(|| (entry, matched as f64 / total))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
        scored.truncate(self.limit);

        scored
            .into_iter()
            .map(|(entry, score)| RetrievalHit::keyword(Arc::clone(entry), score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrag_core::SearchType;
    use proptest::prelude::*;

    fn search_over(sentences: &[(u32, &str)]) -> KeywordSearch {
        let corpus = Corpus::from_entries(
            sentences.iter().map(|(i, s)| (*i, s.to_string())),
            0,
        )
        .unwrap();
        KeywordSearch::new(Arc::new(corpus), 3)
    }

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn full_match_scores_one() {
        let search = search_over(&[
            (1, "Monitor Kidney function and Creatinine daily."),
            (2, "Loosen tight clothing."),
        ]);
        let hits = search.search(&set(&["kidney", "creatinine"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw_score, 1.0);
        assert_eq!(hits[0].sentence().unwrap().id, 1);
        assert_eq!(hits[0].search_type(), SearchType::KeywordSearch);
    }

    #[test]
    fn empty_keywords_give_nothing() {
        let search = search_over(&[(1, "kidney")]);
        assert!(search.search(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn truncates_to_limit_with_id_tie_break() {
        let search = search_over(&[
            (5, "insulin"),
            (2, "insulin"),
            (9, "insulin and glucose"),
            (1, "insulin"),
            (7, "nothing relevant"),
        ]);
        let hits = search.search(&set(&["insulin", "glucose"]));
        let ids: Vec<u32> = hits.iter().map(|h| h.sentence().unwrap().id).collect();
        assert_eq!(ids, vec![9, 1, 2]);
        assert_eq!(hits[0].raw_score, 1.0);
        assert_eq!(hits[1].raw_score, 0.5);
    }

    #[test]
    fn limit_is_capped_at_three() {
        let corpus = Corpus::from_entries((1..=6).map(|i| (i, "insulin".to_string())), 0).unwrap();
        let search = KeywordSearch::new(Arc::new(corpus), 10);
        assert_eq!(search.search(&set(&["insulin"])).len(), MAX_KEYWORD_HITS);
    }

    #[test]
    fn numbers_match_literally() {
        let search = search_over(&[(1, "Treat if glucose is below 70 mg/dL."), (2, "Sit upright.")]);
        let hits = search.search(&set(&["70", "mg/dl", "aspirin"]));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].raw_score - 2.0 / 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn never_emits_zero_scores(
            words in proptest::sample::subsequence(
                vec!["kidney", "heart", "glucose", "aspirin", "55", "zzz"],
                0..=6,
            )
        ) {
            let search = search_over(&[
                (1, "kidney and heart"),
                (2, "glucose 55"),
                (3, "aspirin"),
                (4, "plain text"),
            ]);
            let keywords = set(&words);
            let hits = search.search(&keywords);
            prop_assert!(hits.len() <= 3);
            for hit in &hits {
                prop_assert!(hit.raw_score > 0.0);
                prop_assert!(hit.raw_score <= 1.0);
                let content = hit.sentence().unwrap().content.to_lowercase();
                prop_assert!(keywords.iter().any(|k| content.contains(k.as_str())));
            }
        }
    }
}
