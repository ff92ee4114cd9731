//! # Similarity Queries
//!
//! More-like-this ranking: seed a query from the indexed terms of one
//! document (looked up by title) and rank the rest of the corpus against
//! it. The seed document is excluded from the results.

use crate::corpus::search::CorpusHit;
use crate::corpus::CorpusIndex;
use crate::errors::{Result, SearchError};
use tantivy::collector::TopDocs;
use tantivy::query::{MoreLikeThisQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, Searcher, Term};

/// Term selection thresholds for the similarity query
#[derive(Debug, Clone)]
pub struct SimilarityOptions {
    /// Terms occurring fewer times than this in the seed are ignored
    pub min_term_frequency: usize,
    /// Terms appearing in fewer documents than this are ignored
    pub min_doc_frequency: u64,
    /// Upper bound on the number of seed terms used
    pub max_query_terms: usize,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self {
            min_term_frequency: 5,
            min_doc_frequency: 2,
            max_query_terms: 50,
        }
    }
}

/// Documents most similar to the one with the given title
pub fn similar_to(
    index: &CorpusIndex,
    title: &str,
    limit: usize,
    options: &SimilarityOptions,
) -> Result<Vec<CorpusHit>> {
    let searcher = index.searcher();
    let seed = find_by_title(index, &searcher, title)?;

    let query = MoreLikeThisQuery::builder()
        .with_min_term_frequency(options.min_term_frequency)
        .with_min_doc_frequency(options.min_doc_frequency)
        .with_max_query_terms(options.max_query_terms)
        .with_document(seed);

    // one extra slot because the seed document matches itself
    let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1) + 1))?;

    let mut hits = Vec::new();
    for (score, address) in top_docs {
        if address == seed {
            continue;
        }
        let document = index.stored_document(&searcher, address)?;
        hits.push(CorpusHit {
            title: document.title,
            author: document.author,
            score,
        });
        if hits.len() == limit {
            break;
        }
    }
    Ok(hits)
}

fn find_by_title(index: &CorpusIndex, searcher: &Searcher, title: &str) -> Result<DocAddress> {
    let query = TermQuery::new(
        Term::from_field_text(index.title_field(), title),
        IndexRecordOption::Basic,
    );
    let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
    top_docs
        .into_iter()
        .map(|(_, address)| address)
        .next()
        .ok_or_else(|| SearchError::DocumentNotFound {
            title: title.to_string(),
        })
}
