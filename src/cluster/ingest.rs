//! # Bulk Ingestion Driver
//!
//! ## Purpose
//! Stream newline-delimited JSON records from a file and submit them to the
//! cluster in bounded-size batches, surfacing per-item failures without
//! stopping ingestion of subsequent batches.
//!
//! ## Contract
//! - Batching: an explicit [`BatchAccumulator`] flushes when it reaches its
//!   capacity and once more at end-of-stream for the non-empty remainder
//! - Failure handling: a batch response naming failed items logs a bounded
//!   preview (first `failure_preview` items) and the run continues
//! - Replace-on-rerun: by default the target collection is reset before the
//!   first batch so repeated runs produce identical end state
//! - Completion: the collection is refreshed after the final flush so the
//!   documents are immediately queryable
//! - No retries: transport failures are terminal for the run
//!
//! The driver runs once, start to finish; there is no resumable state.

use crate::cluster::{BulkOperation, BulkTarget};
use crate::config::IngestConfig;
use crate::errors::{Result, SearchError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info};
use uuid::Uuid;

/// Accumulates operations up to a fixed capacity. Reaching capacity hands
/// the full batch back to the caller; [`BatchAccumulator::finish`] hands
/// back whatever remains at end-of-stream.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    buffer: Vec<BulkOperation>,
}

impl BatchAccumulator {
    /// Create an accumulator; a zero capacity is clamped to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Add one operation; returns the full batch when capacity is reached
    pub fn push(&mut self, operation: BulkOperation) -> Option<Vec<BulkOperation>> {
        self.buffer.push(operation);
        if self.buffer.len() >= self.capacity {
            let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
            Some(batch)
        } else {
            None
        }
    }

    /// End-of-stream flush; returns the non-empty remainder
    pub fn finish(self) -> Option<Vec<BulkOperation>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }

    /// Operations currently buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Identifier of this run, stamped into the logs
    pub run_id: Uuid,
    /// Target collection
    pub collection: String,
    /// Documents read from the input and submitted
    pub documents: usize,
    /// Bulk requests issued
    pub batches: usize,
    /// Items the store rejected across all batches
    pub failed_items: usize,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run finish time
    pub finished_at: DateTime<Utc>,
}

/// Batched bulk ingestion against a [`BulkTarget`]
pub struct BulkIngestor<'a, T: BulkTarget> {
    target: &'a T,
    collection: String,
    settings: &'a IngestConfig,
}

impl<'a, T: BulkTarget> BulkIngestor<'a, T> {
    pub fn new(target: &'a T, collection: impl Into<String>, settings: &'a IngestConfig) -> Self {
        Self {
            target,
            collection: collection.into(),
            settings,
        }
    }

    /// Ingest an NDJSON file. A missing or unreadable file is fatal before
    /// any collection reset or network submission happens.
    pub async fn run_file(&self, path: &Path) -> Result<IngestReport> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SearchError::InputResource {
                path: path.to_path_buf(),
                source: e,
            })?;
        self.run(BufReader::new(file)).await
    }

    /// Ingest from a line-oriented reader. Blank lines are skipped; a
    /// malformed JSON line is fatal with its line number.
    pub async fn run<R>(&self, reader: R) -> Result<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "starting ingestion run {} into collection {}",
            run_id, self.collection
        );

        if self.settings.recreate_collection {
            self.target.reset_collection(&self.collection).await?;
        }

        let mut accumulator = BatchAccumulator::new(self.settings.batch_size);
        let mut documents = 0usize;
        let mut batches = 0usize;
        let mut failed_items = 0usize;
        let mut line_number = 0usize;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let document: serde_json::Value =
                serde_json::from_str(trimmed).map_err(|e| SearchError::MalformedRecord {
                    line: line_number,
                    details: e.to_string(),
                })?;
            let id = self
                .settings
                .id_field
                .as_deref()
                .and_then(|field| item_id(&document, field));

            documents += 1;
            if let Some(batch) = accumulator.push(BulkOperation { id, document }) {
                failed_items += self.submit(&batch, documents, &mut batches).await?;
            }
        }

        if let Some(batch) = accumulator.finish() {
            failed_items += self.submit(&batch, documents, &mut batches).await?;
        }

        self.target.finalize(&self.collection).await?;

        let report = IngestReport {
            run_id,
            collection: self.collection.clone(),
            documents,
            batches,
            failed_items,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "finished writing data, documents processed: {} ({} batches, {} failed items)",
            report.documents, report.batches, report.failed_items
        );
        Ok(report)
    }

    async fn submit(
        &self,
        batch: &[BulkOperation],
        documents_so_far: usize,
        batches: &mut usize,
    ) -> Result<usize> {
        *batches += 1;
        let outcome = self.target.bulk(&self.collection, batch).await?;

        if outcome.has_errors() {
            error!(
                "bulk indexing reported {} failed items (after {} docs), showing first {}:",
                outcome.failures.len(),
                documents_so_far,
                outcome.failures.len().min(self.settings.failure_preview)
            );
            for failure in outcome.failures.iter().take(self.settings.failure_preview) {
                error!(
                    " - id={} error={}",
                    failure.id.as_deref().unwrap_or("<unassigned>"),
                    failure.reason
                );
            }
        } else {
            info!("bulk indexed up to {} docs...", documents_so_far);
        }
        Ok(outcome.failures.len())
    }
}

/// Resolve the item id from a document using a dotted field path. Strings
/// are used verbatim, numbers are rendered; anything else yields no id.
fn item_id(document: &serde_json::Value, field: &str) -> Option<String> {
    let mut value = document;
    for part in field.split('.') {
        value = value.get(part)?;
    }
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
