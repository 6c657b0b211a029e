use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A medical emergency category the triage can detect.
///
/// [`Condition::ALL`] lists the variants in tie-break priority order.
///
/// # Examples
///
/// ```
/// use medrag_core::Condition;
///
/// let c: Condition = "cardiac".parse().unwrap();
/// assert_eq!(c, Condition::Cardiac);
/// assert_eq!(c.to_string(), "cardiac");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Blood-sugar emergencies.
    Diabetes,
    /// Heart emergencies.
    Cardiac,
    /// Kidney emergencies.
    Renal,
}

impl Condition {
    /// Every condition, highest priority first.
    pub const ALL: [Condition; 3] = [Condition::Diabetes, Condition::Cardiac, Condition::Renal];
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Diabetes => write!(f, "diabetes"),
            Condition::Cardiac => write!(f, "cardiac"),
            Condition::Renal => write!(f, "renal"),
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "diabetes" => Ok(Condition::Diabetes),
            "cardiac" => Ok(Condition::Cardiac),
            "renal" => Ok(Condition::Renal),
            other => Err(format!("unknown condition: {other}")),
        }
    }
}

/// How urgently a query needs professional help.
///
/// Variants are ordered, so `Urgency::VeryHigh > Urgency::High`.
///
/// # Examples
///
/// ```
/// use medrag_core::Urgency;
///
/// assert_eq!(Urgency::from_match_count(0), Urgency::Low);
/// assert_eq!(Urgency::from_match_count(1), Urgency::High);
/// assert_eq!(Urgency::from_match_count(4), Urgency::VeryHigh);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// No danger signal present.
    Low,
    /// One danger signal present.
    High,
    /// Two or more danger signals present.
    VeryHigh,
}

impl Urgency {
    /// Map a number of matched urgency keywords onto a tier.
    pub fn from_match_count(count: usize) -> Self {
        match count {
            0 => Urgency::Low,
            1 => Urgency::High,
            _ => Urgency::VeryHigh,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::High => write!(f, "high"),
            Urgency::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Topic of a corpus sentence, derived once when the corpus is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Diabetes,
    Cardiac,
    Renal,
    General,
}

impl From<Condition> for Category {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Diabetes => Category::Diabetes,
            Condition::Cardiac => Category::Cardiac,
            Condition::Renal => Category::Renal,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Diabetes => write!(f, "diabetes"),
            Category::Cardiac => write!(f, "cardiac"),
            Category::Renal => write!(f, "renal"),
            Category::General => write!(f, "general"),
        }
    }
}

/// One pre-vetted sentence of the local knowledge corpus.
///
/// Entries are immutable once loaded; `content` is kept verbatim.
///
/// # Examples
///
/// ```
/// use medrag_core::{Category, CorpusEntry};
///
/// let entry = CorpusEntry {
///     id: 7,
///     content: "Check blood glucose before giving insulin.".into(),
///     category: Category::Diabetes,
/// };
/// assert_eq!(entry.id, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusEntry {
    /// Positive id, unique within the corpus.
    pub id: u32,
    /// Sentence text, never altered.
    pub content: String,
    /// Derived topic.
    pub category: Category,
}

/// Where a web result came from on the search engine results page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebItemKind {
    /// A regular ranked result.
    #[default]
    Organic,
    /// The knowledge panel summary.
    KnowledgeGraph,
}

/// A single result returned by the web search provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebItem {
    /// Page title.
    pub title: String,
    /// Short text excerpt.
    pub snippet: String,
    /// URL of the page. May be empty for knowledge graph panels.
    pub link: String,
    /// Result kind.
    #[serde(default)]
    pub kind: WebItemKind,
}

/// The evidence stream a hit came from.
///
/// # Examples
///
/// ```
/// use medrag_core::SearchType;
///
/// assert_eq!(SearchType::KeywordSearch.to_string(), "keyword_search");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Embedding similarity over the local corpus.
    LocalSemantic,
    /// Live web search.
    WebSearch,
    /// Literal keyword overlap over the local corpus.
    KeywordSearch,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchType::LocalSemantic => write!(f, "local_semantic"),
            SearchType::WebSearch => write!(f, "web_search"),
            SearchType::KeywordSearch => write!(f, "keyword_search"),
        }
    }
}

/// The evidence a hit points at. Local and keyword hits reference a corpus
/// entry, web hits carry the web item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "searchType", rename_all = "snake_case")]
pub enum HitSource {
    LocalSemantic { sentence: Arc<CorpusEntry> },
    WebSearch { item: WebItem },
    KeywordSearch { sentence: Arc<CorpusEntry> },
}

/// A scored piece of evidence from one of the three streams.
///
/// `raw_score` is on the stream's own scale. `final_score` is assigned by
/// fusion and is zero until then.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use medrag_core::{Category, CorpusEntry, RetrievalHit, SearchType};
///
/// let entry = Arc::new(CorpusEntry {
///     id: 1,
///     content: "Call emergency services.".into(),
///     category: Category::General,
/// });
/// let hit = RetrievalHit::keyword(entry, 0.5);
/// assert_eq!(hit.search_type(), SearchType::KeywordSearch);
/// assert_eq!(hit.final_score, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalHit {
    #[serde(flatten)]
    pub source: HitSource,
    pub raw_score: f64,
    pub final_score: f64,
}

impl RetrievalHit {
    /// A hit from embedding similarity.
    pub fn local(sentence: Arc<CorpusEntry>, raw_score: f64) -> Self {
        Self::new(HitSource::LocalSemantic { sentence }, raw_score)
    }

    /// A hit from the web.
    pub fn web(item: WebItem, raw_score: f64) -> Self {
        Self::new(HitSource::WebSearch { item }, raw_score)
    }

    /// A hit from keyword overlap.
    pub fn keyword(sentence: Arc<CorpusEntry>, raw_score: f64) -> Self {
        Self::new(HitSource::KeywordSearch { sentence }, raw_score)
    }

    fn new(source: HitSource, raw_score: f64) -> Self {
        Self {
            source,
            raw_score,
            final_score: 0.0,
        }
    }

    /// The stream this hit came from.
    pub fn search_type(&self) -> SearchType {
        match self.source {
            HitSource::LocalSemantic { .. } => SearchType::LocalSemantic,
            HitSource::WebSearch { .. } => SearchType::WebSearch,
            HitSource::KeywordSearch { .. } => SearchType::KeywordSearch,
        }
    }

    /// The corpus entry behind a local or keyword hit.
    pub fn sentence(&self) -> Option<&CorpusEntry> {
        match &self.source {
            HitSource::LocalSemantic { sentence } | HitSource::KeywordSearch { sentence } => {
                Some(sentence)
            }
            HitSource::WebSearch { .. } => None,
        }
    }

    /// The web item behind a web hit.
    pub fn web_item(&self) -> Option<&WebItem> {
        match &self.source {
            HitSource::WebSearch { item } => Some(item),
            _ => None,
        }
    }
}

/// Outcome of triaging one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    /// Detected condition, `None` when no condition keyword matched.
    pub condition: Option<Condition>,
    /// Urgency tier.
    pub urgency: Urgency,
    /// Matched condition keywords plus numeric tokens.
    pub keywords: BTreeSet<String>,
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use medrag_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
