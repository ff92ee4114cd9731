//! # Search-Driven Delay Analytics
//!
//! ## Overview
//! This library drives two search engines over airline on-time-performance
//! data and text corpora: a remote search cluster reached over its REST API
//! (bulk ingestion, filtered queries, terms aggregations) and an embedded
//! full-text index (boolean, phrase, term-frequency, and similarity
//! queries).
//!
//! ## Architecture
//! The system is composed of a few focused modules:
//! - `cluster`: REST client, batched bulk ingestion driver, filtered query
//!   runner, terms aggregation runner
//! - `corpus`: embedded index lifecycle plus its query, statistics, and
//!   similarity runners
//! - `config`: explicit configuration built once at startup
//! - `errors`: centralized error types
//!
//! ## Usage
//! ```rust,no_run
//! use skysearch::cluster::{BulkIngestor, ClusterClient};
//! use skysearch::Config;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> skysearch::Result<()> {
//!     let config = Config::load()?;
//!     let client = ClusterClient::new(&config.cluster)?;
//!     let ingestor = BulkIngestor::new(&client, "airlines", &config.ingest);
//!     let report = ingestor.run_file(Path::new("airlines.ndjson")).await?;
//!     println!("documents processed: {}", report.documents);
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod config;
pub mod corpus;
pub mod errors;

// Re-exports for convenience
pub use cluster::{BulkIngestor, ClusterClient, IngestReport};
pub use config::Config;
pub use corpus::CorpusIndex;
pub use errors::{Result, SearchError};
