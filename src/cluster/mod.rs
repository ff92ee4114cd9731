//! # Remote Cluster Module
//!
//! ## Purpose
//! Everything that talks to the remote search cluster: the REST client, the
//! bulk ingestion driver, the filtered query runner, and the terms
//! aggregation runner.
//!
//! ## Architecture
//! - `client.rs`: thin typed wrapper over the cluster's REST operations
//! - `ingest.rs`: batched bulk ingestion with partial-failure reporting
//! - `query.rs`: conjunctive range/term filtered searches
//! - `aggregate.rs`: terms aggregation with a nested numeric sum
//!
//! The ingestion driver depends on the [`BulkTarget`] trait rather than the
//! concrete client, so its batching and failure-reporting behavior is
//! testable without a network.

pub mod aggregate;
pub mod client;
pub mod ingest;
pub mod query;

pub use aggregate::{Bucket, TermsAggregation};
pub use client::ClusterClient;
pub use ingest::{BatchAccumulator, BulkIngestor, IngestReport};
pub use query::{FilterPredicate, FilteredQuery};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One document write inside a bulk request. The target collection is
/// carried per-run, not per-operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperation {
    /// Item id; the store assigns one when absent
    pub id: Option<String>,
    /// Opaque document payload
    pub document: serde_json::Value,
}

/// A single failed item inside an otherwise delivered bulk response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Item id as reported by the store, if any
    pub id: Option<String>,
    /// Failure reason string from the store
    pub reason: String,
}

/// Per-batch outcome of a bulk submission. Item failures live here as data;
/// they never abort the run.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// Items acknowledged by the store in this batch
    pub item_count: usize,
    /// Items the store rejected, in response order
    pub failures: Vec<ItemFailure>,
}

impl BulkOutcome {
    /// Whether the store flagged at least one failed item
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Sink for the bulk ingestion driver
#[async_trait]
pub trait BulkTarget: Send + Sync {
    /// Drop and recreate the collection so a rerun replaces prior contents
    async fn reset_collection(&self, collection: &str) -> Result<()>;

    /// Submit one batch atomically; per-item failures are reported in the
    /// returned outcome, not as an error
    async fn bulk(&self, collection: &str, operations: &[BulkOperation]) -> Result<BulkOutcome>;

    /// Make the written documents visible to subsequent queries
    async fn finalize(&self, collection: &str) -> Result<()>;
}
