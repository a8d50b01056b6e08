//! Inbound HTTP boundary for the publish path.
//!
//! `POST /` takes an arbitrary byte body, publishes it synchronously and
//! answers `200 OK` with the produce timestamp in the `kafka-timestamp`
//! header (plus the placement as a JSON body), or `500` with the error text.
//! No hidden retries: one request, one confirmed or failed publish.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, error};

use crate::stream::Publish;

/// Response header carrying the produced record's timestamp.
pub const TIMESTAMP_HEADER: &str = "kafka-timestamp";

/// Shared state for the publish endpoint.
#[derive(Clone)]
pub struct AppState {
    /// The publisher behind the endpoint.
    pub publisher: Arc<dyn Publish>,
}

/// Placement reported back to the HTTP caller.
#[derive(Debug, Serialize)]
struct PublishResponse {
    topic: String,
    partition: i32,
    offset: i64,
}

/// Builds the publish router.
pub fn router(state: AppState) -> Router {
    Router::new().route("/", post(publish_payload)).with_state(state)
}

async fn publish_payload(State(state): State<AppState>, body: Bytes) -> Response {
    debug!(bytes = body.len(), "received publish request");

    match state.publisher.publish(&body).await {
        Ok(placement) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&placement.timestamp.to_rfc3339()) {
                headers.insert(TIMESTAMP_HEADER, value);
            }
            let response = PublishResponse {
                topic: placement.topic,
                partition: placement.partition,
                offset: placement.offset,
            };
            (StatusCode::OK, headers, Json(response)).into_response()
        }
        Err(err) => {
            error!(error = %err, retryable = err.is_retryable(), "publish failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
