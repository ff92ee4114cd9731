//! # Cluster REST Client
//!
//! ## Purpose
//! Typed wrapper over the search cluster's REST API: collection lifecycle,
//! bulk submission, search, and refresh. One method per remote operation,
//! no retries, no backoff; transport failures and non-success responses
//! surface as errors immediately.
//!
//! ## Authentication
//! Every request carries `Authorization: ApiKey <credential>` as a default
//! header. The credential is resolved once at construction time, which is
//! where a missing key becomes a fatal startup error.

use crate::cluster::{BulkOperation, BulkOutcome, BulkTarget, ItemFailure};
use crate::config::ClusterConfig;
use crate::errors::{Result, SearchError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Collection names the cluster accepts: lowercase, starting with a letter
fn collection_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_\-]*$").expect("valid pattern"))
}

/// Check a collection name against the cluster's naming rules
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 255 && collection_name_pattern().is_match(name)
}

/// Client for the remote search cluster
#[derive(Debug)]
pub struct ClusterClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct BulkResponseBody {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

/// One entry of the bulk response; the action key mirrors the request
#[derive(Debug, Deserialize)]
struct BulkResponseItem {
    index: Option<BulkItemBody>,
    create: Option<BulkItemBody>,
}

#[derive(Debug, Deserialize)]
struct BulkItemBody {
    #[serde(rename = "_id")]
    id: Option<String>,
    error: Option<BulkItemError>,
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type")]
    kind: String,
    reason: Option<String>,
}

impl BulkResponseItem {
    fn body(&self) -> Option<&BulkItemBody> {
        self.index.as_ref().or(self.create.as_ref())
    }
}

impl ClusterClient {
    /// Build a client from resolved configuration. Fails without touching
    /// the network when the credential is missing.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;

        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("ApiKey {}", api_key))
            .map_err(|e| SearchError::Config {
                message: format!("invalid API key format: {}", e),
            })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .user_agent(concat!("skysearch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
        })
    }

    /// Whether the collection exists
    pub async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let response = self
            .http
            .head(self.collection_url(collection, None))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(rejection(response).await),
        }
    }

    /// Create the collection with inferred mappings
    pub async fn create_collection(&self, collection: &str) -> Result<()> {
        if !is_valid_collection_name(collection) {
            return Err(SearchError::Config {
                message: format!("invalid collection name: {:?}", collection),
            });
        }
        let response = self
            .http
            .put(self.collection_url(collection, None))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Delete the collection and everything in it
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.collection_url(collection, None))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Make recent writes visible to subsequent queries
    pub async fn refresh(&self, collection: &str) -> Result<()> {
        let response = self
            .http
            .post(self.collection_url(collection, Some("_refresh")))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Number of documents currently visible in the collection
    pub async fn count(&self, collection: &str) -> Result<u64> {
        let response = self
            .http
            .get(self.collection_url(collection, Some("_count")))
            .send()
            .await?;
        let body: CountResponse = expect_success(response).await?.json().await?;
        Ok(body.count)
    }

    /// Submit one batch of operations as a single atomic request.
    /// Per-item failures come back in the outcome; only transport failures
    /// and whole-request rejections are errors.
    pub async fn submit_bulk(
        &self,
        collection: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkOutcome> {
        let mut body = String::new();
        for op in operations {
            let action = match &op.id {
                Some(id) => serde_json::json!({ "index": { "_id": id } }),
                None => serde_json::json!({ "index": {} }),
            };
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&op.document)?);
            body.push('\n');
        }

        let response = self
            .http
            .post(self.collection_url(collection, Some("_bulk")))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let parsed: BulkResponseBody = expect_success(response).await?.json().await?;

        let failures: Vec<ItemFailure> = parsed
            .items
            .iter()
            .filter_map(|item| item.body())
            .filter_map(|body| {
                body.error.as_ref().map(|error| ItemFailure {
                    id: body.id.clone(),
                    reason: match &error.reason {
                        Some(reason) => format!("{}: {}", error.kind, reason),
                        None => error.kind.clone(),
                    },
                })
            })
            .collect();

        if parsed.errors && failures.is_empty() {
            debug!("bulk response flagged errors but no item carried one");
        }

        Ok(BulkOutcome {
            item_count: parsed.items.len(),
            failures,
        })
    }

    /// Run a search request body against the collection and return the raw
    /// response document; callers deserialize the slice they care about
    pub async fn search(
        &self,
        collection: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(self.collection_url(collection, Some("_search")))
            .json(body)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    fn collection_url(&self, collection: &str, endpoint: Option<&str>) -> String {
        match endpoint {
            Some(endpoint) => format!("{}/{}/{}", self.base_url, collection, endpoint),
            None => format!("{}/{}", self.base_url, collection),
        }
    }
}

#[async_trait]
impl BulkTarget for ClusterClient {
    async fn reset_collection(&self, collection: &str) -> Result<()> {
        if self.collection_exists(collection).await? {
            debug!("collection {} exists, deleting before rerun", collection);
            self.delete_collection(collection).await?;
        }
        self.create_collection(collection).await
    }

    async fn bulk(&self, collection: &str, operations: &[BulkOperation]) -> Result<BulkOutcome> {
        self.submit_bulk(collection, operations).await
    }

    async fn finalize(&self, collection: &str) -> Result<()> {
        self.refresh(collection).await
    }
}

async fn expect_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejection(response).await)
    }
}

async fn rejection(response: Response) -> SearchError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SearchError::ClusterRejected { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;

    #[test]
    fn test_collection_name_validation() {
        assert!(is_valid_collection_name("airlines"));
        assert!(is_valid_collection_name("airlines_2015-q2"));
        assert!(!is_valid_collection_name("Airlines"));
        assert!(!is_valid_collection_name("_hidden"));
        assert!(!is_valid_collection_name(""));
    }

    #[test]
    fn test_client_requires_credential() {
        let config = ClusterConfig::default();
        let err = ClusterClient::new(&config).unwrap_err();
        assert!(matches!(err, SearchError::MissingCredential { .. }));
    }

    #[test]
    fn test_bulk_response_parsing() {
        let raw = r#"{
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_id": "a1", "status": 201}},
                {"index": {"_id": "a2", "status": 400,
                           "error": {"type": "mapper_parsing_exception",
                                     "reason": "failed to parse field"}}},
                {"create": {"_id": "a3", "status": 409,
                            "error": {"type": "version_conflict_engine_exception"}}}
            ]
        }"#;
        let parsed: BulkResponseBody = serde_json::from_str(raw).unwrap();
        assert!(parsed.errors);
        assert_eq!(parsed.items.len(), 3);

        let failures: Vec<&BulkItemBody> = parsed
            .items
            .iter()
            .filter_map(|item| item.body())
            .filter(|body| body.error.is_some())
            .collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].id.as_deref(), Some("a2"));
    }
}
