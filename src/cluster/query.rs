//! # Filtered Query Runner
//!
//! ## Purpose
//! Conjunctive filtered searches over the cluster: numeric range predicates
//! and exact-term predicates combined in a bool `filter` clause, so a
//! document must satisfy every predicate at once.

use crate::cluster::ClusterClient;
use crate::errors::{Result, SearchError};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Field holding the number of delayed flights per record
pub const DELAYED_FLIGHTS_FIELD: &str = "statistics.flights.delayed";
/// Field holding the number of security-caused delays per record
pub const SECURITY_DELAYS_FIELD: &str = "statistics.# of delays.security";

/// One structured filter predicate
#[derive(Debug, Clone)]
pub enum FilterPredicate {
    /// `field >= threshold`
    RangeAtLeast { field: String, threshold: f64 },
    /// `field == value`
    TermEquals {
        field: String,
        value: serde_json::Value,
    },
}

impl FilterPredicate {
    fn to_clause(&self) -> serde_json::Value {
        match self {
            FilterPredicate::RangeAtLeast { field, threshold } => {
                json!({ "range": { field: { "gte": threshold } } })
            }
            FilterPredicate::TermEquals { field, value } => {
                json!({ "term": { field: { "value": value } } })
            }
        }
    }
}

/// A conjunctive filtered search against one collection
#[derive(Debug, Clone)]
pub struct FilteredQuery {
    pub collection: String,
    pub filters: Vec<FilterPredicate>,
    pub max_hits: usize,
}

impl FilteredQuery {
    /// Records with at least `min_delayed` delayed flights and zero
    /// security-caused delays
    pub fn delayed_without_security(
        collection: impl Into<String>,
        min_delayed: f64,
        max_hits: usize,
    ) -> Self {
        Self {
            collection: collection.into(),
            filters: vec![
                FilterPredicate::RangeAtLeast {
                    field: DELAYED_FLIGHTS_FIELD.to_string(),
                    threshold: min_delayed,
                },
                FilterPredicate::TermEquals {
                    field: SECURITY_DELAYS_FIELD.to_string(),
                    value: json!(0),
                },
            ],
            max_hits,
        }
    }

    /// Request body submitted to the cluster
    pub fn to_body(&self) -> serde_json::Value {
        let clauses: Vec<serde_json::Value> =
            self.filters.iter().map(FilterPredicate::to_clause).collect();
        json!({
            "size": self.max_hits,
            "query": { "bool": { "filter": clauses } }
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Option<serde_json::Value>,
}

/// Run the query and return the matching documents' sources
pub async fn run(client: &ClusterClient, query: &FilteredQuery) -> Result<Vec<serde_json::Value>> {
    let body = query.to_body();
    debug!("filtered search on {}: {}", query.collection, body);

    let raw = client.search(&query.collection, &body).await?;
    let envelope: SearchEnvelope =
        serde_json::from_value(raw).map_err(|e| SearchError::UnexpectedResponse {
            details: format!("search response: {}", e),
        })?;

    Ok(envelope
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| hit.source)
        .collect())
}
