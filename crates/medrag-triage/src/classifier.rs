use std::collections::BTreeSet;

use medrag_core::{Condition, TriageConfig, TriageResult, Urgency};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::keywords::KeywordTables;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number pattern"));

/// Keyword-driven classifier for condition, urgency, and search keywords.
///
/// All operations are pure functions of the tables and the query. Empty input
/// yields no condition, [`Urgency::Low`], and an empty keyword set.
///
/// # Examples
///
/// ```
/// use medrag_core::{Condition, Urgency};
/// use medrag_triage::Triage;
///
/// let triage = Triage::new();
/// let result = triage.assess("crushing chest pain down my left arm");
/// assert_eq!(result.condition, Some(Condition::Cardiac));
/// assert_eq!(result.urgency, Urgency::VeryHigh);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Triage {
    tables: KeywordTables,
}

impl Triage {
    /// Triage over the built-in vocabularies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triage over custom tables.
    pub fn with_tables(tables: KeywordTables) -> Self {
        Self { tables }
    }

    /// Triage over the built-in vocabularies patched by `[triage]` config.
    pub fn from_config(config: &TriageConfig) -> Self {
        Self::with_tables(KeywordTables::with_overrides(config))
    }

    /// The tables this classifier matches against.
    pub fn tables(&self) -> &KeywordTables {
        &self.tables
    }

    /// Number of distinct keywords of each condition present in `query`,
    /// in priority order.
    pub fn condition_scores(&self, query: &str) -> [(Condition, usize); 3] {
        let lowered = query.to_lowercase();
        Condition::ALL.map(|c| (c, count_present(&lowered, self.tables.condition(c))))
    }

    /// The condition with the most keyword matches.
    ///
    /// Equal nonzero counts resolve by priority: diabetes, then cardiac,
    /// then renal. Returns `None` when nothing matched.
    pub fn detect_condition(&self, query: &str) -> Option<Condition> {
        let mut best: Option<(Condition, usize)> = None;
        for (condition, count) in self.condition_scores(query) {
            if count == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((condition, count));
            }
        }
        best.map(|(condition, _)| condition)
    }

    /// Urgency tier from the number of danger signals in `query`.
    pub fn assess_urgency(&self, query: &str) -> Urgency {
        let lowered = query.to_lowercase();
        Urgency::from_match_count(count_present(&lowered, self.tables.urgency()))
    }

    /// Every condition keyword found in `query`, across all conditions, plus
    /// every integer or decimal literal.
    pub fn extract_keywords(&self, query: &str) -> BTreeSet<String> {
        let lowered = query.to_lowercase();
        let mut keywords: BTreeSet<String> = Condition::ALL
            .iter()
            .flat_map(|c| self.tables.condition(*c))
            .filter(|k| lowered.contains(k.as_str()))
            .cloned()
            .collect();
        keywords.extend(NUMBER.find_iter(query).map(|m| m.as_str().to_string()));
        keywords
    }

    /// Run all three classifications on `query`.
    pub fn assess(&self, query: &str) -> TriageResult {
        TriageResult {
            condition: self.detect_condition(query),
            urgency: self.assess_urgency(query),
            keywords: self.extract_keywords(query),
        }
    }
}

fn count_present(lowered: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|k| lowered.contains(k.as_str()))
        .count()
}
