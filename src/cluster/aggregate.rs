//! # Terms Aggregation Runner
//!
//! ## Purpose
//! Group documents by a field's distinct values, annotate each group with a
//! nested numeric sum, order groups by that sum descending, and cap the
//! bucket count.
//!
//! ## Grouping-Field Candidates
//! Dynamically mapped text fields may or may not expose an aggregatable
//! `.keyword` subfield, so the grouping field is an ordered candidate list
//! tried in sequence: a 4xx rejection moves to the next candidate, the
//! first success wins, and exhaustion is an error naming every candidate.

use crate::cluster::query::DELAYED_FLIGHTS_FIELD;
use crate::cluster::ClusterClient;
use crate::errors::{Result, SearchError};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const GROUPS_AGG: &str = "top_groups";
const SUM_AGG: &str = "group_sum";

/// Default grouping-field candidates for the carrier name
pub const CARRIER_FIELD_CANDIDATES: &[&str] = &["carrier.name.keyword", "carrier.name"];

/// A terms aggregation with a nested numeric-sum sub-aggregation
#[derive(Debug, Clone)]
pub struct TermsAggregation {
    pub collection: String,
    /// Grouping field candidates, tried in order
    pub group_field_candidates: Vec<String>,
    /// Field summed inside each bucket
    pub sum_field: String,
    /// Maximum buckets returned
    pub top: usize,
}

/// One ranked group
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
    pub total: f64,
}

impl TermsAggregation {
    /// Top carriers ranked by their total number of delayed flights
    pub fn carrier_delay_totals(collection: impl Into<String>, top: usize) -> Self {
        Self {
            collection: collection.into(),
            group_field_candidates: CARRIER_FIELD_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sum_field: DELAYED_FLIGHTS_FIELD.to_string(),
            top,
        }
    }

    /// Request body for one grouping-field candidate
    pub fn to_body(&self, group_field: &str) -> serde_json::Value {
        json!({
            "size": 0,
            "aggs": {
                GROUPS_AGG: {
                    "terms": {
                        "field": group_field,
                        "size": self.top,
                        "order": { SUM_AGG: "desc" }
                    },
                    "aggs": {
                        SUM_AGG: { "sum": { "field": self.sum_field } }
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct AggregationEnvelope {
    aggregations: Aggregations,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    #[serde(rename = "top_groups")]
    top_groups: GroupsBody,
}

#[derive(Debug, Deserialize)]
struct GroupsBody {
    #[serde(default)]
    buckets: Vec<RawBucket>,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    key: serde_json::Value,
    doc_count: u64,
    #[serde(rename = "group_sum")]
    group_sum: SumBody,
}

#[derive(Debug, Deserialize)]
struct SumBody {
    value: Option<f64>,
}

/// Run the aggregation, trying each grouping-field candidate in order.
/// Returns the field that succeeded along with the ranked buckets.
pub async fn run(
    client: &ClusterClient,
    aggregation: &TermsAggregation,
) -> Result<(String, Vec<Bucket>)> {
    for candidate in &aggregation.group_field_candidates {
        let body = aggregation.to_body(candidate);
        match client.search(&aggregation.collection, &body).await {
            Ok(raw) => {
                let buckets = parse_buckets(raw)?;
                return Ok((candidate.clone(), buckets));
            }
            Err(SearchError::ClusterRejected { status, body })
                if (400..500).contains(&status) =>
            {
                warn!(
                    "grouping field {:?} rejected by the cluster ({}), trying next candidate",
                    candidate, status
                );
                tracing::debug!("rejection body: {}", body);
            }
            Err(other) => return Err(other),
        }
    }

    Err(SearchError::FieldCandidatesExhausted {
        candidates: aggregation.group_field_candidates.clone(),
    })
}

fn parse_buckets(raw: serde_json::Value) -> Result<Vec<Bucket>> {
    let envelope: AggregationEnvelope =
        serde_json::from_value(raw).map_err(|e| SearchError::UnexpectedResponse {
            details: format!("aggregation response: {}", e),
        })?;

    Ok(envelope
        .aggregations
        .top_groups
        .buckets
        .into_iter()
        .map(|bucket| Bucket {
            key: match bucket.key {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            doc_count: bucket.doc_count,
            total: bucket.group_sum.value.unwrap_or(0.0),
        })
        .collect())
}
