use std::path::PathBuf;

use crate::types::SearchType;

/// Errors that can occur across medrag.
///
/// Library crates return this type directly. External-boundary variants
/// ([`Embedding`](Self::Embedding), [`WebSearch`](Self::WebSearch),
/// [`Timeout`](Self::Timeout)) are absorbed by the hybrid search and never
/// reach its caller; [`NotInitialized`](Self::NotInitialized) always does.
///
/// # Examples
///
/// ```
/// use medrag_core::MedragError;
///
/// let err = MedragError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum MedragError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The corpus file is malformed or does not match the expected shape.
    #[error("corpus error: {0}")]
    #[diagnostic(help("check the [corpus] section of .medrag.toml"))]
    Corpus(String),

    /// A search ran before the corpus was embedded.
    #[error("semantic index is not initialized; embed the corpus before searching")]
    NotInitialized,

    /// Embedding provider request or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Web search provider request or response error.
    #[error("web search error: {0}")]
    WebSearch(String),

    /// An evidence stream did not finish in time.
    #[error("{stream} search timed out after {secs}s")]
    Timeout {
        /// The stream that was cut off.
        stream: SearchType,
        /// The bound that was exceeded, in seconds.
        secs: u64,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl MedragError {
    /// Whether the error comes from an external collaborator and should be
    /// absorbed into an empty stream instead of failing the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MedragError::Embedding(_) | MedragError::WebSearch(_) | MedragError::Timeout { .. }
        )
    }
}
