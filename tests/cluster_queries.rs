//! End-to-end tests of the filtered query and aggregation runners against a
//! mocked cluster.

use serde_json::json;
use skysearch::cluster::{aggregate, query, ClusterClient, FilteredQuery, TermsAggregation};
use skysearch::config::ClusterConfig;
use skysearch::SearchError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn client_for(server: &MockServer) -> ClusterClient {
    ClusterClient::new(&ClusterConfig {
        url: server.uri(),
        api_key: Some("test-key".to_string()),
        timeout_seconds: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn filtered_query_sends_conjunctive_filters_and_parses_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/airlines/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {
                "total": { "value": 1 },
                "hits": [
                    { "_id": "1", "_source": { "carrier": { "name": "United Air Lines Inc." } } }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let filtered = FilteredQuery::delayed_without_security("airlines", 2500.0, 25);
    let hits = query::run(&client, &filtered).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["carrier"]["name"], "United Air Lines Inc.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let filters = body["query"]["bool"]["filter"].as_array().unwrap();
    assert_eq!(filters.len(), 2);
    assert!(filters[0]["range"]["statistics.flights.delayed"]["gte"].is_number());
    assert_eq!(
        filters[1]["term"]["statistics.# of delays.security"]["value"],
        json!(0)
    );
}

/// Rejects aggregations on the keyword subfield, accepts the plain field
struct KeywordFieldMissing;

impl Respond for KeywordFieldMissing {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        if body.contains("carrier.name.keyword") {
            ResponseTemplate::new(400).set_body_json(json!({
                "error": { "type": "illegal_argument_exception",
                           "reason": "Fielddata is disabled on text fields" },
                "status": 400
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "aggregations": {
                    "top_groups": {
                        "buckets": [
                            { "key": "Southwest Airlines Co.", "doc_count": 130,
                              "group_sum": { "value": 182937.0 } },
                            { "key": "Delta Air Lines Inc.", "doc_count": 97,
                              "group_sum": { "value": 101734.0 } },
                            { "key": "SkyWest Airlines Inc.", "doc_count": 85,
                              "group_sum": { "value": 96738.0 } }
                        ]
                    }
                }
            }))
        }
    }
}

#[tokio::test]
async fn aggregation_falls_back_to_the_next_grouping_field_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/airlines/_search"))
        .respond_with(KeywordFieldMissing)
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let aggregation = TermsAggregation::carrier_delay_totals("airlines", 5);
    let (field, buckets) = aggregate::run(&client, &aggregation).await.unwrap();

    assert_eq!(field, "carrier.name");
    assert_eq!(buckets.len(), 3);
    assert_eq!(buckets[0].key, "Southwest Airlines Co.");
    assert!(buckets
        .windows(2)
        .all(|pair| pair[0].total >= pair[1].total));
}

#[tokio::test]
async fn aggregation_exhausting_all_candidates_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/airlines/_search"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "type": "illegal_argument_exception", "reason": "no such field" },
            "status": 400
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let aggregation = TermsAggregation::carrier_delay_totals("airlines", 5);
    let err = aggregate::run(&client, &aggregation).await.unwrap_err();

    match err {
        SearchError::FieldCandidatesExhausted { candidates } => {
            assert_eq!(candidates, vec!["carrier.name.keyword", "carrier.name"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn server_side_failures_other_than_rejection_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/airlines/_search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cluster unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let aggregation = TermsAggregation::carrier_delay_totals("airlines", 5);
    let err = aggregate::run(&client, &aggregation).await.unwrap_err();

    assert!(matches!(
        err,
        SearchError::ClusterRejected { status: 503, .. }
    ));
}
