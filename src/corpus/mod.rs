//! # Embedded Corpus Module
//!
//! ## Purpose
//! Full-text indexing and querying of text corpora with the embedded
//! engine: boolean and phrase queries, free-text parsed queries, term
//! frequency statistics, and more-like-this similarity ranking.
//!
//! ## Architecture
//! - `index.rs`: schema, analyzers, writer/reader lifecycle, rebuilds
//! - `search.rs`: term, conjunctive, phrase, and parsed queries
//! - `stats.rs`: top terms by total term frequency
//! - `similar.rs`: more-like-this ranking seeded from an indexed document

pub mod index;
pub mod search;
pub mod similar;
pub mod stats;

pub use index::{CorpusDocument, CorpusIndex, StopwordPolicy};
pub use search::CorpusHit;
pub use similar::SimilarityOptions;
pub use stats::TermCount;
