//! # Corpus Index
//!
//! ## Purpose
//! Owns the embedded full-text index: schema, analyzer registration,
//! writer/reader lifecycle, document upserts, and whole-corpus rebuilds
//! under a different analyzer.
//!
//! ## Schema
//! - `title`, `author`: raw (untokenized) stored fields
//! - `content`: stored, indexed with frequencies and positions under one of
//!   two registered analyzers: the language pipeline with stop-word
//!   removal, or the same pipeline keeping stop words
//! - `doc_id`: raw UUID used for delete/re-add upserts
//!
//! The analyzer variant is chosen at index creation and recorded in the
//! schema, so reopening an index recovers the right [`StopwordPolicy`].

use crate::errors::{Result, SearchError};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tantivy::schema::{
    Field, FieldType, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED,
    STRING,
};
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;
use uuid::Uuid;

/// Tokenizer registered for the stop-word-removing pipeline
const STEMMED_TOKENIZER: &str = "german_stemmed";
/// Tokenizer registered for the pipeline that keeps stop words
const KEEP_STOPWORDS_TOKENIZER: &str = "german_keep_stopwords";

/// Tokens longer than this are dropped before further filtering
const MAX_TOKEN_LEN: usize = 40;

/// Whether the content analyzer removes stop words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopwordPolicy {
    Remove,
    Keep,
}

impl StopwordPolicy {
    fn tokenizer_name(self) -> &'static str {
        match self {
            StopwordPolicy::Remove => STEMMED_TOKENIZER,
            StopwordPolicy::Keep => KEEP_STOPWORDS_TOKENIZER,
        }
    }
}

/// One document of a corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub title: String,
    pub author: String,
    pub content: String,
}

impl CorpusDocument {
    /// Load a document from a UTF-8 text file, trimming publisher
    /// boilerplate delimited by `*** ... ***` marker lines
    pub fn from_text_file(
        title: impl Into<String>,
        author: impl Into<String>,
        path: &Path,
    ) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SearchError::InputResource {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            title: title.into(),
            author: author.into(),
            content: strip_boilerplate(&raw).to_string(),
        })
    }
}

fn boilerplate_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\*\*\*[^\n]*\*\*\*\s*$").expect("valid pattern"))
}

/// Return the text between the first and last `*** ... ***` marker lines,
/// or the whole text when no such pair exists
fn strip_boilerplate(text: &str) -> &str {
    let markers: Vec<_> = boilerplate_marker().find_iter(text).collect();
    match (markers.first(), markers.last()) {
        (Some(first), Some(last)) if first.end() < last.start() => {
            text[first.end()..last.start()].trim()
        }
        _ => text.trim(),
    }
}

/// The embedded full-text index over corpus documents
pub struct CorpusIndex {
    index: Index,
    reader: IndexReader,
    writer: RwLock<IndexWriter>,
    policy: StopwordPolicy,
    title: Field,
    author: Field,
    content: Field,
    doc_id: Field,
}

impl CorpusIndex {
    /// Create an index in a directory, reusing one already present there
    pub fn create_in_dir(
        path: &Path,
        policy: StopwordPolicy,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let directory = tantivy::directory::MmapDirectory::open(path)?;
        let index = Index::open_or_create(directory, Self::build_schema(policy))?;
        Self::from_index(index, policy, writer_heap_bytes)
    }

    /// Open an existing index, recovering its stop-word policy from the
    /// schema
    pub fn open_in_dir(path: &Path, writer_heap_bytes: usize) -> Result<Self> {
        let index = Index::open_in_dir(path)?;
        let policy = Self::detect_policy(&index)?;
        Self::from_index(index, policy, writer_heap_bytes)
    }

    /// Create an in-memory index
    pub fn create_in_ram(policy: StopwordPolicy) -> Result<Self> {
        let index = Index::create_in_ram(Self::build_schema(policy));
        Self::from_index(index, policy, 15_000_000)
    }

    fn from_index(index: Index, policy: StopwordPolicy, writer_heap_bytes: usize) -> Result<Self> {
        Self::register_analyzers(&index);

        let schema = index.schema();
        let title = schema.get_field("title")?;
        let author = schema.get_field("author")?;
        let content = schema.get_field("content")?;
        let doc_id = schema.get_field("doc_id")?;

        let writer = index.writer(writer_heap_bytes)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: RwLock::new(writer),
            policy,
            title,
            author,
            content,
            doc_id,
        })
    }

    fn build_schema(policy: StopwordPolicy) -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("title", STRING | STORED);
        builder.add_text_field("author", STRING | STORED);

        let content_indexing = TextFieldIndexing::default()
            .set_tokenizer(policy.tokenizer_name())
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let content_options = TextOptions::default()
            .set_indexing_options(content_indexing)
            .set_stored();
        builder.add_text_field("content", content_options);

        builder.add_text_field("doc_id", STRING | STORED);
        builder.build()
    }

    fn register_analyzers(index: &Index) {
        let stemmed = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(StopWordFilter::new(Language::German).expect("bundled stop word list"))
            .filter(Stemmer::new(Language::German))
            .build();
        index.tokenizers().register(STEMMED_TOKENIZER, stemmed);

        let keep_stopwords = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::German))
            .build();
        index
            .tokenizers()
            .register(KEEP_STOPWORDS_TOKENIZER, keep_stopwords);
    }

    fn detect_policy(index: &Index) -> Result<StopwordPolicy> {
        let schema = index.schema();
        let content = schema.get_field("content")?;
        let tokenizer = match schema.get_field_entry(content).field_type() {
            FieldType::Str(options) => options
                .get_indexing_options()
                .map(|indexing| indexing.tokenizer().to_string()),
            _ => None,
        };
        match tokenizer.as_deref() {
            Some(STEMMED_TOKENIZER) => Ok(StopwordPolicy::Remove),
            Some(KEEP_STOPWORDS_TOKENIZER) => Ok(StopwordPolicy::Keep),
            other => Err(SearchError::Config {
                message: format!("index has an unknown content tokenizer: {:?}", other),
            }),
        }
    }

    /// Add a document, replacing any existing document with the same title
    pub fn add_document(&self, document: &CorpusDocument) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let writer = self.writer.read();

        writer.delete_term(Term::from_field_text(self.title, &document.title));

        let mut doc = TantivyDocument::default();
        doc.add_text(self.title, &document.title);
        doc.add_text(self.author, &document.author);
        doc.add_text(self.content, &document.content);
        doc.add_text(self.doc_id, id.to_string());
        writer.add_document(doc)?;

        debug!("indexed corpus document {:?} as {}", document.title, id);
        Ok(id)
    }

    /// Commit pending writes and reload the reader so they become visible
    pub fn commit(&self) -> Result<()> {
        self.writer.write().commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Documents currently visible to searches
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Acquire a searcher over the last committed state
    pub fn searcher(&self) -> tantivy::Searcher {
        self.reader.searcher()
    }

    /// Stop-word policy this index was created with
    pub fn policy(&self) -> StopwordPolicy {
        self.policy
    }

    pub(crate) fn inner(&self) -> &Index {
        &self.index
    }

    pub(crate) fn title_field(&self) -> Field {
        self.title
    }

    pub(crate) fn author_field(&self) -> Field {
        self.author
    }

    pub(crate) fn content_field(&self) -> Field {
        self.content
    }

    /// Run text through the content field's analyzer and return the
    /// resulting terms, so queries see exactly what indexing saw
    pub fn analyze_content(&self, text: &str) -> Result<Vec<Term>> {
        let mut analyzer = self.index.tokenizer_for_field(self.content)?;
        let mut stream = analyzer.token_stream(text);
        let mut terms = Vec::new();
        while let Some(token) = stream.next() {
            terms.push(Term::from_field_text(self.content, &token.text));
        }
        Ok(terms)
    }

    /// Read back a stored document by address
    pub(crate) fn stored_document(
        &self,
        searcher: &tantivy::Searcher,
        address: tantivy::DocAddress,
    ) -> Result<CorpusDocument> {
        let doc: TantivyDocument = searcher.doc(address)?;
        let text = |field: Field| -> String {
            doc.get_first(field)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Ok(CorpusDocument {
            title: text(self.title),
            author: text(self.author),
            content: text(self.content),
        })
    }

    /// Re-index every stored document into `target`, which may use a
    /// different stop-word policy. Returns the number of documents copied.
    pub fn rebuild_into(&self, target: &CorpusIndex) -> Result<usize> {
        let searcher = self.searcher();
        let mut copied = 0usize;
        for segment_reader in searcher.segment_readers() {
            let store_reader = segment_reader.get_store_reader(1)?;
            for doc_id in segment_reader.doc_ids_alive() {
                let doc: TantivyDocument = store_reader.get(doc_id)?;
                let text = |field: Field| -> String {
                    doc.get_first(field)
                        .and_then(|value| value.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                target.add_document(&CorpusDocument {
                    title: text(self.title),
                    author: text(self.author),
                    content: text(self.content),
                })?;
                copied += 1;
            }
        }
        target.commit()?;
        debug!(
            "rebuilt {} documents into an index with policy {:?}",
            copied,
            target.policy()
        );
        Ok(copied)
    }
}
