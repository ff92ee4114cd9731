//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the delay analytics toolkit, covering the
//! cluster-facing ingestion/query path and the embedded corpus index.
//!
//! ## Error Categories
//! - **Startup**: configuration problems and missing credentials, raised
//!   before any network call is attempted
//! - **Ingest**: unreadable input resources and malformed records
//! - **Cluster**: transport failures and non-success responses from the
//!   remote store
//! - **Corpus**: embedded index failures and unknown documents
//!
//! Per-item bulk failures are NOT errors in this taxonomy: they are data
//! carried inside a successful bulk response (see `cluster::BulkOutcome`)
//! and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error types for the delay analytics toolkit
#[derive(Debug, Error)]
pub enum SearchError {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The cluster credential is mandatory and was supplied nowhere
    #[error("missing cluster credential: set environment variable {env_var} or config key {config_key}")]
    MissingCredential {
        env_var: &'static str,
        config_key: &'static str,
    },

    /// The ingestion input file is missing or unreadable
    #[error("input resource unavailable: {path:?}: {source}")]
    InputResource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the input stream is not a well-formed JSON document
    #[error("malformed record on line {line}: {details}")]
    MalformedRecord { line: usize, details: String },

    /// Transport-level HTTP errors; never retried
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The cluster answered with a non-success status
    #[error("cluster rejected request ({status}): {body}")]
    ClusterRejected { status: u16, body: String },

    /// Every grouping-field candidate was rejected by the cluster
    #[error("no usable grouping field, candidates tried: {candidates:?}")]
    FieldCandidatesExhausted { candidates: Vec<String> },

    /// The cluster answered 2xx but the payload did not have the
    /// expected shape
    #[error("unexpected cluster response: {details}")]
    UnexpectedResponse { details: String },

    /// Embedded index errors
    #[error("corpus index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// Embedded index directory errors
    #[error("corpus index directory error: {0}")]
    IndexDirectory(#[from] tantivy::directory::error::OpenDirectoryError),

    /// Free-text query could not be parsed
    #[error("query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    /// A corpus lookup by title found nothing
    #[error("corpus document not found: {title}")]
    DocumentNotFound { title: String },

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SearchError::Config { .. } | SearchError::MissingCredential { .. } => "startup",
            SearchError::InputResource { .. } | SearchError::MalformedRecord { .. } => "ingest",
            SearchError::Transport(_)
            | SearchError::ClusterRejected { .. }
            | SearchError::FieldCandidatesExhausted { .. }
            | SearchError::UnexpectedResponse { .. } => "cluster",
            SearchError::Index(_)
            | SearchError::IndexDirectory(_)
            | SearchError::QueryParse(_)
            | SearchError::DocumentNotFound { .. } => "corpus",
            SearchError::Json(_) | SearchError::Toml(_) | SearchError::Io(_) => "generic",
        }
    }
}
