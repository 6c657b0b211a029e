//! Hybrid evidence retrieval over a fixed medical corpus and the live web.
//!
//! Three independent streams feed one ranked evidence list:
//! - [`semantic`]: embedding similarity over the corpus
//! - [`keyword`]: literal keyword overlap over the corpus
//! - [`web`]: a web search boosted by the triaged condition
//!
//! [`fusion`] weights and merges them, and [`search::HybridSearch`] runs the
//! whole pipeline for a query.

pub mod context;
pub mod corpus;
pub mod embedding;
pub mod fusion;
pub mod keyword;
pub mod search;
pub mod semantic;
pub mod web;

pub use corpus::Corpus;
pub use search::{HybridResult, HybridSearch};
