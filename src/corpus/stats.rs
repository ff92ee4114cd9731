//! # Term Frequency Statistics
//!
//! Walks the content field's term dictionary across all segments and ranks
//! terms by total term frequency (occurrences summed over documents, not
//! the number of documents they appear in). Deleted documents are skipped
//! so counts reflect only what a search can still see.

use crate::corpus::CorpusIndex;
use crate::errors::Result;
use std::collections::HashMap;
use tantivy::postings::Postings;
use tantivy::schema::IndexRecordOption;
use tantivy::{DocSet, TERMINATED};

/// Frequency statistics for one term of the content field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCount {
    pub term: String,
    /// Documents the term appears in
    pub doc_freq: u64,
    /// Total occurrences across all documents
    pub total_term_freq: u64,
}

/// The `limit` most frequent content terms, ordered by total term
/// frequency descending, ties broken alphabetically
pub fn top_terms(index: &CorpusIndex, limit: usize) -> Result<Vec<TermCount>> {
    let searcher = index.searcher();
    let field = index.content_field();
    let mut counts: HashMap<String, (u64, u64)> = HashMap::new();

    for segment_reader in searcher.segment_readers() {
        let inverted_index = segment_reader.inverted_index(field)?;
        let alive = segment_reader.alive_bitset();

        let mut terms = inverted_index.terms().stream()?;
        while terms.advance() {
            let text = match std::str::from_utf8(terms.key()) {
                Ok(text) => text.to_string(),
                Err(_) => continue,
            };
            let term_info = terms.value();

            let mut postings = inverted_index
                .read_postings_from_terminfo(term_info, IndexRecordOption::WithFreqs)?;
            let mut doc_freq = 0u64;
            let mut total_term_freq = 0u64;
            let mut doc = postings.doc();
            while doc != TERMINATED {
                if alive.map_or(true, |bitset| bitset.is_alive(doc)) {
                    doc_freq += 1;
                    total_term_freq += u64::from(postings.term_freq());
                }
                doc = postings.advance();
            }

            if total_term_freq > 0 {
                let entry = counts.entry(text).or_insert((0, 0));
                entry.0 += doc_freq;
                entry.1 += total_term_freq;
            }
        }
    }

    let mut ranked: Vec<TermCount> = counts
        .into_iter()
        .map(|(term, (doc_freq, total_term_freq))| TermCount {
            term,
            doc_freq,
            total_term_freq,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.total_term_freq
            .cmp(&a.total_term_freq)
            .then_with(|| a.term.cmp(&b.term))
    });
    ranked.truncate(limit);
    Ok(ranked)
}
