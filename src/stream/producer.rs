//! Synchronous publish path.
//!
//! Each inbound payload maps to exactly one record: [`StreamPublisher`] sends
//! it and blocks until the stream acknowledges placement or reports failure.
//! There is no batching, no local queue and no internal retry; the HTTP caller
//! decides what to do with a failure, guided by the retryable classification
//! on [`PublishError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::increment_counter;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use thiserror::Error;
use tracing::info;

use super::base_client_config;
use super::context::{IamAuth, ProducerIamContext};
use crate::config::StreamConfig;

/// Placement reported by the stream for a published record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PublishResult {
    /// Topic the record landed in.
    pub topic: String,
    /// Partition the stream chose.
    pub partition: i32,
    /// Offset assigned by the stream.
    pub offset: i64,
    /// Creation timestamp stamped on the record.
    pub timestamp: DateTime<Utc>,
}

/// Errors surfaced by the publish path.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The stream rejected or failed to place the record.
    #[error("record delivery failed: {source}")]
    Delivery {
        /// Underlying client error.
        source: KafkaError,
        /// Whether the caller may reasonably retry.
        retryable: bool,
    },
}

impl PublishError {
    /// Whether the failure is transient (broker unavailability, timeouts)
    /// rather than fatal (authorization, oversized message).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Delivery { retryable, .. } => *retryable,
        }
    }
}

impl From<KafkaError> for PublishError {
    fn from(source: KafkaError) -> Self {
        let retryable = is_retryable(&source);
        Self::Delivery { source, retryable }
    }
}

fn is_retryable(err: &KafkaError) -> bool {
    match err {
        KafkaError::MessageProduction(code) => matches!(
            code,
            RDKafkaErrorCode::QueueFull
                | RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::LeaderNotAvailable
                | RDKafkaErrorCode::NotLeaderForPartition
                | RDKafkaErrorCode::NotEnoughReplicas
                | RDKafkaErrorCode::NotEnoughReplicasAfterAppend
        ),
        _ => false,
    }
}

/// Seam between the HTTP boundary and the stream client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publish: Send + Sync {
    /// Publishes one payload and waits for the delivery report.
    async fn publish(&self, payload: &[u8]) -> Result<PublishResult, PublishError>;
}

/// Publisher backed by the shared stream client session.
pub struct StreamPublisher {
    producer: FutureProducer<ProducerIamContext>,
    topic: String,
    delivery_timeout: Duration,
}

impl StreamPublisher {
    /// Creates the publisher and its underlying client session.
    ///
    /// # Errors
    ///
    /// Returns the client error if the session cannot be created (bad broker
    /// list, TLS setup failure).
    pub fn new(config: &StreamConfig, auth: IamAuth) -> Result<Self, KafkaError> {
        let producer: FutureProducer<ProducerIamContext> =
            base_client_config(config, "mskpipe-producer")
                .set(
                    "message.timeout.ms",
                    config.delivery_timeout.as_millis().to_string(),
                )
                .create_with_context(ProducerIamContext::new(auth))?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            delivery_timeout: config.delivery_timeout,
        })
    }
}

#[async_trait]
impl Publish for StreamPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<PublishResult, PublishError> {
        let timestamp = Utc::now();
        let record = FutureRecord::<(), [u8]>::to(&self.topic)
            .payload(payload)
            .timestamp(timestamp.timestamp_millis());

        match self
            .producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
        {
            Ok((partition, offset)) => {
                increment_counter!("records_published_total");
                info!(
                    topic = %self.topic,
                    partition,
                    offset,
                    "record published"
                );
                Ok(PublishResult {
                    topic: self.topic.clone(),
                    partition,
                    offset,
                    timestamp,
                })
            }
            Err((err, _unsent)) => {
                increment_counter!("publish_failures_total");
                Err(PublishError::from(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_is_retryable() {
        let err = PublishError::from(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transport_failure_is_retryable() {
        let err = PublishError::from(KafkaError::MessageProduction(
            RDKafkaErrorCode::BrokerTransportFailure,
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_authorization_failure_is_fatal() {
        let err = PublishError::from(KafkaError::MessageProduction(
            RDKafkaErrorCode::TopicAuthorizationFailed,
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_oversized_message_is_fatal() {
        let err = PublishError::from(KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageSizeTooLarge,
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_delivery_error_display_includes_source() {
        let err = PublishError::from(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull));
        assert!(err.to_string().contains("record delivery failed"));
    }
}
