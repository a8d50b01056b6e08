//! Index-store write path integration tests.
//!
//! Exercises `OpenSearchIndexer` against a `wiremock` mock server: document
//! placement, SigV4 headers on the wire, and the error mapping for store
//! rejections.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mskpipe::config::IndexConfig;
use mskpipe::credentials::CredentialChain;
use mskpipe::indexer::{IndexError, Indexer, OpenSearchIndexer};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Construct an indexer pointing at the given wiremock base URL.
fn make_indexer(base_url: &str) -> OpenSearchIndexer {
    let config = IndexConfig {
        endpoint: Url::parse(base_url).expect("valid url"),
        index: "movies".to_string(),
        timeout: Duration::from_secs(5),
    };
    let chain = CredentialChain::from_static("us-east-1", "AKIDEXAMPLE", "test-secret");
    OpenSearchIndexer::new(&config, chain).expect("indexer should build")
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

/// A successful write posts the raw payload to `{index}/_doc` and surfaces
/// the store-assigned document id.
#[tokio::test]
async fn test_index_success_returns_receipt_with_document_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/movies/_doc"))
        .and(body_string(r#"{"title":"X"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"_id": "abc123", "result": "created"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let indexer = make_indexer(&server.uri());
    let receipt = indexer.index(br#"{"title":"X"}"#).await.expect("write succeeds");

    assert_eq!(receipt.id.as_deref(), Some("abc123"));
}

/// A 2xx response without a parseable body is still a success.
#[tokio::test]
async fn test_index_success_without_body_yields_empty_receipt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/movies/_doc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let indexer = make_indexer(&server.uri());
    let receipt = indexer.index(b"payload").await.expect("write succeeds");

    assert!(receipt.id.is_none());
}

/// Every request carries the SigV4 signature headers the store validates.
#[tokio::test]
async fn test_index_requests_are_sigv4_signed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/movies/_doc"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("x-amz-content-sha256"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"_id": "signed"})))
        .expect(1)
        .mount(&server)
        .await;

    let indexer = make_indexer(&server.uri());
    let receipt = indexer.index(b"{}").await.expect("signed write succeeds");

    assert_eq!(receipt.id.as_deref(), Some("signed"));
}

// ---------------------------------------------------------------------------
// Failure mapping
// ---------------------------------------------------------------------------

/// Store rejections surface status and body; the caller (the consume loop)
/// must not commit the record.
#[tokio::test]
async fn test_store_rejection_maps_to_index_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/movies/_doc"))
        .respond_with(ResponseTemplate::new(503).set_body_string("collection unavailable"))
        .mount(&server)
        .await;

    let indexer = make_indexer(&server.uri());
    let err = indexer.index(b"payload").await.expect_err("write must fail");

    match err {
        IndexError::Store { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "collection unavailable");
        }
        other => panic!("expected store error, got {:?}", other),
    }
}

/// Authorization failures (403) are store errors too; classification is the
/// caller's concern.
#[tokio::test]
async fn test_forbidden_write_maps_to_store_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("User is not authorized"))
        .mount(&server)
        .await;

    let indexer = make_indexer(&server.uri());
    let err = indexer.index(b"payload").await.expect_err("write must fail");

    assert!(matches!(err, IndexError::Store { status: 403, .. }));
}
