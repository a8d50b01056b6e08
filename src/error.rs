//! Error types for mskpipe
//!
//! Each module defines its own focused error enum; this module aggregates
//! them for callers that want a single error surface, using `thiserror` for
//! ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::CredentialsError;
use crate::indexer::IndexError;
use crate::stream::consumer::ConsumeError;
use crate::stream::producer::PublishError;

/// Main error type for mskpipe operations
///
/// Encompasses configuration loading, credential resolution, the stream
/// client, the publish and consume paths, and index-store writes.
#[derive(Error, Debug)]
pub enum MskpipeError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// AWS credential chain errors
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialsError),

    /// Stream client errors
    #[error("stream client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Publish path errors
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Consume loop errors
    #[error("consume error: {0}")]
    Consume(#[from] ConsumeError),

    /// Index-store write errors
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for mskpipe operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: MskpipeError = ConfigError::MissingVar("MSK_BROKER").into();
        assert!(matches!(err, MskpipeError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: missing required environment variable: MSK_BROKER"
        );
    }

    #[test]
    fn test_credentials_error_conversion() {
        let err: MskpipeError = CredentialsError::NoProvider.into();
        assert!(matches!(err, MskpipeError::Credentials(_)));
    }

    #[test]
    fn test_kafka_error_conversion() {
        let kafka_err =
            rdkafka::error::KafkaError::Global(rdkafka::types::RDKafkaErrorCode::AllBrokersDown);
        let err: MskpipeError = kafka_err.into();
        assert!(matches!(err, MskpipeError::Kafka(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MskpipeError = io_err.into();
        assert!(matches!(err, MskpipeError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: MskpipeError = json_err.into();
        assert!(matches!(err, MskpipeError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MskpipeError>();
    }
}
