//! Core types, configuration, and error handling for medrag.
//!
//! This crate provides the shared foundation used by the other medrag crates:
//! - [`MedragError`]: unified error type using `thiserror`
//! - [`MedragConfig`]: configuration loaded from `.medrag.toml`
//! - Shared types: [`Condition`], [`Urgency`], [`Category`], [`CorpusEntry`],
//!   [`WebItem`], [`SearchType`], [`RetrievalHit`], [`TriageResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CorpusConfig, EmbeddingConfig, FusionWeights, MedragConfig, RetrievalConfig, TriageConfig,
    WebSearchConfig, MAX_EVIDENCE, MAX_KEYWORD_HITS,
};
pub use error::MedragError;
pub use types::{
    Category, Condition, CorpusEntry, HitSource, OutputFormat, RetrievalHit, SearchType,
    TriageResult, Urgency, WebItem, WebItemKind,
};

/// A convenience `Result` type for medrag operations.
pub type Result<T> = std::result::Result<T, MedragError>;
