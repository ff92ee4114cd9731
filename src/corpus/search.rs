//! # Corpus Query Runners
//!
//! Term, conjunctive boolean, phrase, and free-text parsed queries over a
//! [`CorpusIndex`]. Query text always goes through the content field's
//! analyzer first, so stemming, lowercasing, and stop-word removal apply to
//! queries exactly as they applied at indexing time.

use crate::corpus::CorpusIndex;
use crate::errors::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, PhraseQuery, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tracing::debug;

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusHit {
    pub title: String,
    pub author: String,
    pub score: f32,
}

/// Documents containing the given word
pub fn term(index: &CorpusIndex, word: &str, limit: usize) -> Result<Vec<CorpusHit>> {
    all_of(index, &[word], limit)
}

/// Documents containing every one of the given words (conjunctive)
pub fn all_of(index: &CorpusIndex, words: &[&str], limit: usize) -> Result<Vec<CorpusHit>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
    for word in words {
        for term in index.analyze_content(word)? {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }
    }
    if clauses.is_empty() {
        debug!("query reduced to nothing after analysis: {:?}", words);
        return Ok(Vec::new());
    }
    collect(index, &BooleanQuery::new(clauses), limit)
}

/// Documents where the phrase's terms appear within `slop` positions of
/// each other, in order
pub fn phrase(index: &CorpusIndex, text: &str, slop: u32, limit: usize) -> Result<Vec<CorpusHit>> {
    let mut terms = index.analyze_content(text)?;
    if terms.is_empty() {
        debug!("phrase reduced to nothing after analysis: {:?}", text);
        Ok(Vec::new())
    } else if terms.len() == 1 {
        let query = TermQuery::new(terms.remove(0), IndexRecordOption::Basic);
        collect(index, &query, limit)
    } else {
        let mut query = PhraseQuery::new(terms);
        query.set_slop(slop);
        collect(index, &query, limit)
    }
}

/// Free-text query over title and content through the engine's query
/// parser; supports quoted phrases and boolean operators
pub fn parse(index: &CorpusIndex, query_text: &str, limit: usize) -> Result<Vec<CorpusHit>> {
    let parser = QueryParser::for_index(
        index.inner(),
        vec![index.title_field(), index.content_field()],
    );
    let query = parser.parse_query(query_text)?;
    collect(index, &query, limit)
}

fn collect(index: &CorpusIndex, query: &dyn Query, limit: usize) -> Result<Vec<CorpusHit>> {
    let searcher = index.searcher();
    let top_docs = searcher.search(query, &TopDocs::with_limit(limit.max(1)))?;

    let mut hits = Vec::with_capacity(top_docs.len());
    for (score, address) in top_docs {
        let document = index.stored_document(&searcher, address)?;
        hits.push(CorpusHit {
            title: document.title,
            author: document.author,
            score,
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusDocument, StopwordPolicy};

    fn sample_index() -> CorpusIndex {
        let index = CorpusIndex::create_in_ram(StopwordPolicy::Remove).unwrap();
        let documents = [
            (
                "Nachtwanderung",
                "faust wandert durch die stille nacht und mephisto folgt ihm leise",
            ),
            ("Gartenlied", "der garten ist gruen und die sonne scheint"),
            ("Nachtlied", "die nacht ist dunkel und still"),
        ];
        for (title, content) in documents {
            index
                .add_document(&CorpusDocument {
                    title: title.to_string(),
                    author: "Anon".to_string(),
                    content: content.to_string(),
                })
                .unwrap();
        }
        index.commit().unwrap();
        index
    }

    fn titles(hits: &[CorpusHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.title.as_str()).collect()
    }

    #[test]
    fn test_term_query_matches_analyzed_form() {
        let index = sample_index();
        // "Faust" must match the lowercased indexed token
        let hits = term(&index, "Faust", 10).unwrap();
        assert_eq!(titles(&hits), vec!["Nachtwanderung"]);
    }

    #[test]
    fn test_all_of_is_conjunctive() {
        let index = sample_index();

        let both = all_of(&index, &["faust", "mephisto"], 10).unwrap();
        assert_eq!(titles(&both), vec!["Nachtwanderung"]);

        // "nacht" alone matches two documents; adding "mephisto" narrows it
        let nacht = term(&index, "nacht", 10).unwrap();
        assert_eq!(nacht.len(), 2);
        let narrowed = all_of(&index, &["nacht", "mephisto"], 10).unwrap();
        assert_eq!(titles(&narrowed), vec!["Nachtwanderung"]);
    }

    #[test]
    fn test_stopword_only_query_matches_nothing() {
        let index = sample_index();
        let hits = all_of(&index, &["und", "der"], 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_phrase_needs_enough_slop() {
        let index = sample_index();

        // "faust" and "mephisto" are several positions apart in the source
        let tight = phrase(&index, "faust mephisto", 0, 10).unwrap();
        assert!(tight.is_empty());

        let loose = phrase(&index, "faust mephisto", 10, 10).unwrap();
        assert_eq!(titles(&loose), vec!["Nachtwanderung"]);
    }

    #[test]
    fn test_adjacent_phrase_matches_without_slop() {
        let index = sample_index();
        let hits = phrase(&index, "stille nacht", 0, 10).unwrap();
        assert_eq!(titles(&hits), vec!["Nachtwanderung"]);
    }

    #[test]
    fn test_parsed_query_with_boolean_operator() {
        let index = sample_index();
        let hits = parse(&index, "faust OR garten", 10).unwrap();
        let mut found = titles(&hits);
        found.sort();
        assert_eq!(found, vec!["Gartenlied", "Nachtwanderung"]);
    }
}
