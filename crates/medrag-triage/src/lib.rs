//! Rule-based triage of free-text emergency queries.
//!
//! [`Triage`] maps a query onto a [`Condition`](medrag_core::Condition), an
//! [`Urgency`](medrag_core::Urgency) tier, and the keyword set that drives
//! keyword search. Matching is case-insensitive substring search over the
//! fixed vocabularies held in [`KeywordTables`].

mod classifier;
mod keywords;

pub use classifier::Triage;
pub use keywords::KeywordTables;
