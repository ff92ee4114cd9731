//! # Corpus Index Demo
//!
//! Indexes a small built-in corpus and walks through the embedded-engine
//! exercises: boolean and phrase queries, a parsed free-text query,
//! frequent-term statistics with and without stop words, and a
//! more-like-this similarity ranking.

use anyhow::Result;
use tracing::{info, Level};

use skysearch::corpus::{
    search, similar, stats, CorpusDocument, CorpusIndex, SimilarityOptions, StopwordPolicy,
};

const BOOKS: &[(&str, &str, &str)] = &[
    (
        "Nachtfahrt",
        "E. Brandt",
        "Der Wanderer zieht durch die dunkle Nacht und der Nebel liegt schwer \
         auf den Feldern. Ein Geist begleitet ihn, und der Wanderer spricht \
         leise mit dem Geist von Traum und Zauber, von Nacht und Nebel.",
    ),
    (
        "Zaubergarten",
        "E. Brandt",
        "Im Garten wohnt ein alter Zauber. Der Geist des Gartens traeumt von \
         Nacht und Nebel, und wer den Garten betritt, spuert den Zauber und \
         den Traum in jedem Baum.",
    ),
    (
        "Das Kochfeuer",
        "H. Unger",
        "Am Feuer steht der Topf mit Suppe und Brot. Salz und Pfeffer liegen \
         bereit, das Wasser kocht, und der Koch rührt die Suppe bis zum Abend.",
    ),
    (
        "Seefahrt",
        "H. Unger",
        "Das Schiff segelt über das weite Meer. Die Wellen schlagen an den \
         Bug, der Wind treibt die Segel, und die Mannschaft singt vom Meer \
         und vom Wind.",
    ),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let dir = tempfile::tempdir()?;
    info!("building corpus index in {:?}", dir.path());

    let index = CorpusIndex::create_in_dir(dir.path(), StopwordPolicy::Remove, 15_000_000)?;
    for (title, author, content) in BOOKS {
        index.add_document(&CorpusDocument {
            title: title.to_string(),
            author: author.to_string(),
            content: content.to_string(),
        })?;
    }
    index.commit()?;
    info!("indexed {} documents", index.num_docs());

    info!("--- documents containing 'wanderer' ---");
    for hit in search::term(&index, "wanderer", 10)? {
        info!(" - {}", hit.title);
    }

    info!("--- documents containing 'geist' AND 'zauber' ---");
    for hit in search::all_of(&index, &["geist", "zauber"], 10)? {
        info!(" - {}", hit.title);
    }

    info!("--- phrase 'nacht nebel' with slop 3 ---");
    for hit in search::phrase(&index, "nacht nebel", 3, 10)? {
        info!(" - {}", hit.title);
    }

    info!("--- parsed query: wanderer OR meer ---");
    for hit in search::parse(&index, "wanderer OR meer", 10)? {
        info!(" - {} (score: {:.4})", hit.title, hit.score);
    }

    info!("--- top 10 terms (stop words removed) ---");
    for count in stats::top_terms(&index, 10)? {
        info!("{} ({})", count.term, count.total_term_freq);
    }

    let rebuilt_dir = tempfile::tempdir()?;
    let rebuilt = CorpusIndex::create_in_dir(
        rebuilt_dir.path(),
        StopwordPolicy::Keep,
        15_000_000,
    )?;
    let copied = index.rebuild_into(&rebuilt)?;
    info!("--- top 10 terms after rebuilding {} documents with stop words ---", copied);
    for count in stats::top_terms(&rebuilt, 10)? {
        info!("{} ({})", count.term, count.total_term_freq);
    }

    let options = SimilarityOptions {
        min_term_frequency: 1,
        min_doc_frequency: 1,
        max_query_terms: 50,
    };
    info!("--- documents similar to 'Nachtfahrt' ---");
    for hit in similar::similar_to(&index, "Nachtfahrt", 10, &options)? {
        info!(" - {} (score: {:.4})", hit.title, hit.score);
    }

    info!("--- all tasks completed ---");
    Ok(())
}
