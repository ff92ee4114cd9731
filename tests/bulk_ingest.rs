//! End-to-end tests of the bulk ingestion driver against a mocked cluster.

use serde_json::json;
use skysearch::cluster::{BulkIngestor, ClusterClient};
use skysearch::config::{ClusterConfig, IngestConfig};
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn cluster_config(server: &MockServer) -> ClusterConfig {
    ClusterConfig {
        url: server.uri(),
        api_key: Some("test-key".to_string()),
        timeout_seconds: 5,
    }
}

fn ingest_config(batch_size: usize) -> IngestConfig {
    IngestConfig {
        batch_size,
        ..IngestConfig::default()
    }
}

fn ndjson_file(records: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..records {
        writeln!(
            file,
            "{{\"carrier\": {{\"name\": \"Carrier {}\"}}, \"seq\": {}}}",
            i % 7,
            i
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn ok_bulk_body() -> serde_json::Value {
    json!({ "took": 2, "errors": false, "items": [] })
}

async fn mount_collection_lifecycle(server: &MockServer, collection: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("/{}", collection)))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/{}", collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}", collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/_refresh", collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_shards": {} })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_submits_ceil_n_over_b_batches() {
    let server = MockServer::start().await;
    mount_collection_lifecycle(&server, "airlines").await;
    Mock::given(method("POST"))
        .and(path("/airlines/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_bulk_body()))
        .expect(3)
        .mount(&server)
        .await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = ingest_config(1000);
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let input = ndjson_file(2500);
    let report = ingestor.run_file(input.path()).await.unwrap();

    assert_eq!(report.documents, 2500);
    assert_eq!(report.batches, 3);
    assert_eq!(report.failed_items, 0);

    // each bulk request body carries two NDJSON lines per document
    let bulk_bodies: Vec<usize> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/airlines/_bulk")
        .map(|request| {
            String::from_utf8(request.body.clone())
                .unwrap()
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count()
        })
        .collect();
    assert_eq!(bulk_bodies, vec![2000, 2000, 1000]);
}

#[tokio::test]
async fn reset_runs_before_the_first_batch() {
    let server = MockServer::start().await;
    mount_collection_lifecycle(&server, "airlines").await;
    Mock::given(method("POST"))
        .and(path("/airlines/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_bulk_body()))
        .mount(&server)
        .await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = ingest_config(10);
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let input = ndjson_file(5);
    ingestor.run_file(input.path()).await.unwrap();

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| format!("{} {}", request.method, request.url.path()))
        .collect();
    let first_bulk = methods
        .iter()
        .position(|m| m.ends_with("/_bulk"))
        .expect("a bulk call happened");
    let create = methods
        .iter()
        .position(|m| m == "PUT /airlines")
        .expect("the collection was recreated");
    assert!(create < first_bulk);
    assert_eq!(methods.last().unwrap(), "POST /airlines/_refresh");
}

#[tokio::test]
async fn keep_existing_skips_the_reset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/airlines/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_bulk_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/airlines/_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_shards": {} })))
        .mount(&server)
        .await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = IngestConfig {
        batch_size: 10,
        recreate_collection: false,
        ..IngestConfig::default()
    };
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let input = ndjson_file(5);
    ingestor.run_file(input.path()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|request| request.method.to_string() == "POST"));
}

/// Responds with item failures on the first bulk call, success afterwards
struct FailFirstBulk;

impl Respond for FailFirstBulk {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        // the driver sends doc {"seq": 0} only in the first batch
        let first_batch = body.contains("\"seq\": 0") || body.contains("\"seq\":0");
        if first_batch {
            let items: Vec<serde_json::Value> = (0..12)
                .map(|i| {
                    json!({ "index": { "_id": format!("doc-{}", i), "status": 400,
                            "error": { "type": "mapper_parsing_exception",
                                       "reason": "failed to parse" } } })
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({ "errors": true, "items": items }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": [] }))
        }
    }
}

#[tokio::test]
async fn item_failures_are_reported_and_the_run_continues() {
    let server = MockServer::start().await;
    mount_collection_lifecycle(&server, "airlines").await;
    Mock::given(method("POST"))
        .and(path("/airlines/_bulk"))
        .respond_with(FailFirstBulk)
        .expect(3)
        .mount(&server)
        .await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = ingest_config(10);
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let input = ndjson_file(25);
    let report = ingestor.run_file(input.path()).await.unwrap();

    assert_eq!(report.documents, 25);
    assert_eq!(report.batches, 3);
    assert_eq!(report.failed_items, 12);
}

#[tokio::test]
async fn missing_credential_aborts_before_any_network_call() {
    let server = MockServer::start().await;

    let config = ClusterConfig {
        url: server.uri(),
        api_key: None,
        timeout_seconds: 5,
    };
    let err = ClusterClient::new(&config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("SKYSEARCH_API_KEY"));
    assert!(message.contains("cluster.api_key"));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_input_file_aborts_before_any_network_call() {
    let server = MockServer::start().await;
    mount_collection_lifecycle(&server, "airlines").await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = ingest_config(10);
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let err = ingestor
        .run_file(std::path::Path::new("/does/not/exist.ndjson"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        skysearch::SearchError::InputResource { .. }
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn requests_carry_the_api_key_header() {
    let server = MockServer::start().await;
    mount_collection_lifecycle(&server, "airlines").await;
    Mock::given(method("POST"))
        .and(path("/airlines/_bulk"))
        .and(wiremock::matchers::header("authorization", "ApiKey test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_bulk_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = cluster_config(&server);
    let client = ClusterClient::new(&config).unwrap();
    let settings = ingest_config(10);
    let ingestor = BulkIngestor::new(&client, "airlines", &settings);

    let input = ndjson_file(3);
    ingestor.run_file(input.path()).await.unwrap();
}
