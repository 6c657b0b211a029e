//! Loading and validation of the local knowledge corpus.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use medrag_core::{Category, CorpusEntry, MedragError};
use serde::Deserialize;

const DIABETES: &[&str] = &[
    "diabetes",
    "glucose",
    "insulin",
    "hypoglycaemia",
    "hyperglycaemic",
    "ketoacidosis",
    "hba1c",
    "metformin",
];

const CARDIAC: &[&str] = &[
    "chest pain",
    "heart",
    "cardiac",
    "angina",
    "myocardial",
    "infarction",
    "defibrillation",
    "cpr",
];

const RENAL: &[&str] = &[
    "kidney",
    "renal",
    "creatinine",
    "dialysis",
    "aki",
    "ckd",
    "potassium",
    "nephro",
];

/// Topic of a corpus sentence. The first vocabulary with any hit wins, in
/// the order diabetes, cardiac, renal.
///
/// # Examples
///
/// ```
/// use medrag_core::Category;
/// use medrag_retrieval::corpus::categorize;
///
/// assert_eq!(categorize("Give glucose gel if conscious."), Category::Diabetes);
/// assert_eq!(categorize("Start CPR at 100 compressions a minute."), Category::Cardiac);
/// assert_eq!(categorize("Keep the person warm."), Category::General);
/// ```
pub fn categorize(content: &str) -> Category {
    let lowered = content.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
    if hit(DIABETES) {
        Category::Diabetes
    } else if hit(CARDIAC) {
        Category::Cardiac
    } else if hit(RENAL) {
        Category::Renal
    } else {
        Category::General
    }
}

/// Row of the corpus file. Spreadsheet exports with `#` and `Sentence`
/// headers are accepted as well.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(alias = "#")]
    id: u32,
    #[serde(alias = "Sentence")]
    content: String,
}

/// The immutable set of pre-vetted sentences, sorted by id.
///
/// Built once at startup and shared read-only behind an `Arc`.
///
/// # Examples
///
/// ```
/// use medrag_retrieval::Corpus;
///
/// let corpus = Corpus::from_entries(
///     vec![(2, "Check the pulse.".to_string()), (1, "Call for help.".to_string())],
///     2,
/// )
/// .unwrap();
/// assert_eq!(corpus.entries()[0].id, 1);
/// assert_eq!(corpus.get(2).unwrap().content, "Check the pulse.");
/// ```
#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<Arc<CorpusEntry>>,
}

impl Corpus {
    /// Build a corpus from `(id, content)` pairs.
    ///
    /// `expected_count` of zero skips the count check.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Corpus`] if the corpus is empty, an id is zero
    /// or repeated, a sentence is blank, or the count differs from
    /// `expected_count`.
    pub fn from_entries(
        pairs: impl IntoIterator<Item = (u32, String)>,
        expected_count: usize,
    ) -> Result<Self, MedragError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (id, content) in pairs {
            if id == 0 {
                return Err(MedragError::Corpus("entry ids must be positive".into()));
            }
            if !seen.insert(id) {
                return Err(MedragError::Corpus(format!("duplicate entry id {id}")));
            }
            if content.trim().is_empty() {
                return Err(MedragError::Corpus(format!("entry {id} has no content")));
            }
            let category = categorize(&content);
            entries.push(Arc::new(CorpusEntry {
                id,
                content,
                category,
            }));
        }

        if entries.is_empty() {
            return Err(MedragError::Corpus("corpus is empty".into()));
        }
        if expected_count > 0 && entries.len() != expected_count {
            return Err(MedragError::Corpus(format!(
                "expected {expected_count} entries, found {}",
                entries.len()
            )));
        }

        entries.sort_by_key(|e| e.id);
        Ok(Self { entries })
    }

    /// Parse a JSON array of `{ "id": .., "content": .. }` objects.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::Serialization`] for malformed JSON, or any
    /// error from [`Corpus::from_entries`].
    pub fn from_json(json: &str, expected_count: usize) -> Result<Self, MedragError> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        Self::from_entries(raw.into_iter().map(|r| (r.id, r.content)), expected_count)
    }

    /// Load the corpus file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MedragError::FileNotFound`] if `path` does not exist, or
    /// any error from [`Corpus::from_json`].
    pub fn load(path: &Path, expected_count: usize) -> Result<Self, MedragError> {
        if !path.exists() {
            return Err(MedragError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let corpus = Self::from_json(&content, expected_count)?;
        tracing::info!(
            path = %path.display(),
            entries = corpus.len(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    /// All entries, ascending by id.
    pub fn entries(&self) -> &[Arc<CorpusEntry>] {
        &self.entries
    }

    /// Look up an entry by id.
    pub fn get(&self, id: u32) -> Option<&Arc<CorpusEntry>> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Entries of one category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Arc<CorpusEntry>> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(u32, &str)]) -> Vec<(u32, String)> {
        items.iter().map(|(i, s)| (*i, s.to_string())).collect()
    }

    #[test]
    fn categories_follow_priority() {
        assert_eq!(
            categorize("Insulin users with heart disease"),
            Category::Diabetes
        );
        assert_eq!(categorize("Heart failure and dialysis"), Category::Cardiac);
        assert_eq!(categorize("Avoid NEPHROtoxic drugs"), Category::Renal);
        assert_eq!(categorize("Recovery position"), Category::General);
    }

    #[test]
    fn entries_are_sorted_and_categorized() {
        let corpus = Corpus::from_entries(
            pairs(&[(3, "Check creatinine"), (1, "Low glucose"), (2, "Angina at rest")]),
            3,
        )
        .unwrap();
        let ids: Vec<u32> = corpus.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(corpus.get(3).unwrap().category, Category::Renal);
        assert_eq!(corpus.by_category(Category::Cardiac).count(), 1);
        assert!(corpus.get(4).is_none());
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let err = Corpus::from_entries(pairs(&[(1, "a"), (2, "b")]), 60).unwrap_err();
        assert!(matches!(err, MedragError::Corpus(_)));
        assert!(err.to_string().contains("expected 60 entries, found 2"));
    }

    #[test]
    fn zero_expected_count_accepts_any_size() {
        let corpus = Corpus::from_entries(pairs(&[(1, "a")]), 0).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(Corpus::from_entries(pairs(&[(0, "a")]), 0).is_err());
        assert!(Corpus::from_entries(pairs(&[(1, "a"), (1, "b")]), 0).is_err());
        assert!(Corpus::from_entries(pairs(&[(1, "   ")]), 0).is_err());
        assert!(Corpus::from_entries(Vec::new(), 0).is_err());
    }

    #[test]
    fn parses_json_and_spreadsheet_headers() {
        let json = r##"[
            {"id": 1, "content": "Give sugar if conscious."},
            {"#": 2, "Sentence": "Do not give food to an unconscious person."}
        ]"##;
        let corpus = Corpus::from_json(json, 2).unwrap();
        assert_eq!(corpus.get(2).unwrap().content, "Do not give food to an unconscious person.");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = Corpus::load(&missing, 0).unwrap_err();
        assert!(matches!(err, MedragError::FileNotFound(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(&path, r#"[{"id": 9, "content": "Dialysis patients"}]"#).unwrap();
        let corpus = Corpus::load(&path, 1).unwrap();
        assert_eq!(corpus.entries()[0].category, Category::Renal);
    }
}
