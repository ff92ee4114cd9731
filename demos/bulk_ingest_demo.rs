//! # Bulk Ingestion Demo
//!
//! Runs the full ingestion pipeline against a mocked cluster, so it works
//! offline. It shows:
//! - Generating a 2,500-record NDJSON input file
//! - Replace-on-rerun collection handling
//! - Batched submission (three bulk requests for 2,500 records)
//! - The final ingest report

use anyhow::Result;
use serde_json::json;
use std::io::Write;
use tracing::{info, Level};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skysearch::cluster::{BulkIngestor, ClusterClient};
use skysearch::config::{ClusterConfig, IngestConfig};

const COLLECTION: &str = "airlines";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("starting a mock cluster");
    let server = MockServer::start().await;
    mount_cluster_mocks(&server).await;

    info!("writing a sample NDJSON input file");
    let mut input = tempfile::NamedTempFile::new()?;
    for i in 0..2500 {
        let record = json!({
            "carrier": { "code": format!("C{}", i % 7), "name": format!("Carrier {}", i % 7) },
            "airport": { "code": "ATL" },
            "statistics": {
                "flights": { "delayed": (i * 13) % 4000, "total": 9000 },
                "# of delays": { "security": i % 3 }
            },
            "time": { "year": 2015, "month": 1 + (i % 12) }
        });
        writeln!(input, "{}", record)?;
    }
    input.flush()?;

    let cluster = ClusterConfig {
        url: server.uri(),
        api_key: Some("demo-key".to_string()),
        ..ClusterConfig::default()
    };
    let settings = IngestConfig::default();

    let client = ClusterClient::new(&cluster)?;
    let ingestor = BulkIngestor::new(&client, COLLECTION, &settings);
    let report = ingestor.run_file(input.path()).await?;

    info!("=== INGESTION COMPLETED ===");
    info!("run id:        {}", report.run_id);
    info!("documents:     {}", report.documents);
    info!("batches:       {}", report.batches);
    info!("failed items:  {}", report.failed_items);

    let bulk_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().ends_with("/_bulk"))
        .count();
    info!("bulk requests observed by the cluster: {}", bulk_calls);

    Ok(())
}

async fn mount_cluster_mocks(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path(format!("/{}", COLLECTION)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/_bulk", COLLECTION)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "took": 3, "errors": false, "items": [] })),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/_refresh", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_shards": {} })))
        .mount(server)
        .await;
}
