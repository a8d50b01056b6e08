//! Configuration management for mskpipe
//!
//! All configuration is environment-driven. The producer and consumer share
//! the stream settings ([`StreamConfig`]); the consumer additionally needs the
//! index-store settings ([`IndexConfig`]) and the producer the HTTP listener
//! settings ([`HttpConfig`]).
//!
//! # Environment Variables
//!
//! * `MSK_BROKER` - Comma-separated seed broker addresses (required)
//! * `MSK_TOPIC` - Topic to publish to / consume from (required)
//! * `AWS_REGION` - AWS region (default: us-east-1)
//! * `MSKPIPE_GROUP_ID` - Consumer group ID (default: mskpipe-consumer-group)
//! * `OPENSEARCH_INDEX_NAME` - Target index name (consumer, required)
//! * `OPENSEARCH_ENDPOINT_URL` - Index-store endpoint URL (consumer, required)
//! * `MSKPIPE_HTTP_ADDR` - Publish endpoint listen address (default: 0.0.0.0:8080)

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use url::Url;

/// Default AWS region when `AWS_REGION` is not set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default consumer group name.
pub const DEFAULT_GROUP_ID: &str = "mskpipe-consumer-group";

/// Default listen address for the publish endpoint.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Errors that can occur while loading configuration.
///
/// Any of these is fatal at startup: the process must not run half-configured.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// An environment variable is present but cannot be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidVar {
        /// The offending environment variable.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Stream (Kafka) connection settings shared by the producer and consumer.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Comma-separated seed broker addresses.
    pub brokers: String,

    /// Topic to publish to / consume from.
    pub topic: String,

    /// AWS region used for IAM authentication.
    pub region: String,

    /// Consumer group ID (unused on the publish path).
    pub group_id: String,

    /// Upper bound on a single poll call.
    pub poll_timeout: Duration,

    /// Upper bound on the per-cycle liveness check.
    pub liveness_timeout: Duration,

    /// How long a synchronous publish waits for the delivery report.
    pub delivery_timeout: Duration,

    /// Consumer group session timeout.
    pub session_timeout: Duration,

    /// Maximum records drained from the client per poll cycle.
    pub max_poll_records: usize,
}

impl StreamConfig {
    /// Loads the stream settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if `MSK_BROKER` or `MSK_TOPIC` is
    /// not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let brokers = require("MSK_BROKER")?;
        let topic = require("MSK_TOPIC")?;
        let region = region_from_env();
        let group_id = optional("MSKPIPE_GROUP_ID").unwrap_or_else(|| DEFAULT_GROUP_ID.to_string());

        Ok(Self {
            brokers,
            topic,
            region,
            group_id,
            poll_timeout: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_secs(30),
            session_timeout: Duration::from_secs(30),
            max_poll_records: 64,
        })
    }
}

/// Index-store settings for the consumer.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Index-store endpoint URL.
    pub endpoint: Url,

    /// Name of the index every document is written to.
    pub index: String,

    /// Per-request timeout for index writes.
    pub timeout: Duration,
}

impl IndexConfig {
    /// Loads the index-store settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if `OPENSEARCH_INDEX_NAME` or
    /// `OPENSEARCH_ENDPOINT_URL` is not set, and [`ConfigError::InvalidVar`]
    /// if the endpoint does not parse as a URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let index = require("OPENSEARCH_INDEX_NAME")?;
        let raw_endpoint = require("OPENSEARCH_ENDPOINT_URL")?;
        let endpoint = Url::parse(&raw_endpoint).map_err(|err| ConfigError::InvalidVar {
            var: "OPENSEARCH_ENDPOINT_URL",
            reason: err.to_string(),
        })?;

        Ok(Self {
            endpoint,
            index,
            timeout: Duration::from_secs(30),
        })
    }
}

/// HTTP listener settings for the producer.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address the publish endpoint binds to.
    pub listen_addr: SocketAddr,
}

impl HttpConfig {
    /// Loads the listener settings from the environment, falling back to
    /// [`DEFAULT_HTTP_ADDR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = optional("MSKPIPE_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        Self::parse(&raw)
    }

    /// Parses a listen address, e.g. from a CLI override.
    pub fn parse(addr: &str) -> Result<Self, ConfigError> {
        let listen_addr = addr.parse().map_err(|err: std::net::AddrParseError| {
            ConfigError::InvalidVar {
                var: "MSKPIPE_HTTP_ADDR",
                reason: err.to_string(),
            }
        })?;
        Ok(Self { listen_addr })
    }
}

/// Resolves the AWS region, defaulting (and logging the default) when
/// `AWS_REGION` is not set.
pub fn region_from_env() -> String {
    match optional("AWS_REGION") {
        Some(region) => region,
        None => {
            info!(region = DEFAULT_REGION, "AWS_REGION not set, using default");
            DEFAULT_REGION.to_string()
        }
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "MSK_BROKER",
            "MSK_TOPIC",
            "AWS_REGION",
            "MSKPIPE_GROUP_ID",
            "OPENSEARCH_INDEX_NAME",
            "OPENSEARCH_ENDPOINT_URL",
            "MSKPIPE_HTTP_ADDR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_stream_config_requires_broker() {
        clear_env();
        std::env::set_var("MSK_TOPIC", "movies");

        let result = StreamConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingVar("MSK_BROKER"))));
    }

    #[test]
    #[serial]
    fn test_stream_config_requires_topic() {
        clear_env();
        std::env::set_var("MSK_BROKER", "b-1.example:9098");

        let result = StreamConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingVar("MSK_TOPIC"))));
    }

    #[test]
    #[serial]
    fn test_stream_config_defaults() {
        clear_env();
        std::env::set_var("MSK_BROKER", "b-1.example:9098,b-2.example:9098");
        std::env::set_var("MSK_TOPIC", "movies");

        let config = StreamConfig::from_env().unwrap();
        assert_eq!(config.brokers, "b-1.example:9098,b-2.example:9098");
        assert_eq!(config.topic, "movies");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.group_id, DEFAULT_GROUP_ID);
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.max_poll_records, 64);
    }

    #[test]
    #[serial]
    fn test_stream_config_overrides() {
        clear_env();
        std::env::set_var("MSK_BROKER", "b-1.example:9098");
        std::env::set_var("MSK_TOPIC", "movies");
        std::env::set_var("AWS_REGION", "eu-west-1");
        std::env::set_var("MSKPIPE_GROUP_ID", "custom-group");

        let config = StreamConfig::from_env().unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.group_id, "custom-group");
    }

    #[test]
    #[serial]
    fn test_empty_var_counts_as_missing() {
        clear_env();
        std::env::set_var("MSK_BROKER", "");
        std::env::set_var("MSK_TOPIC", "movies");

        let result = StreamConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingVar("MSK_BROKER"))));
    }

    #[test]
    #[serial]
    fn test_index_config_from_env() {
        clear_env();
        std::env::set_var("OPENSEARCH_INDEX_NAME", "movies");
        std::env::set_var(
            "OPENSEARCH_ENDPOINT_URL",
            "https://search.example.aoss.amazonaws.com",
        );

        let config = IndexConfig::from_env().unwrap();
        assert_eq!(config.index, "movies");
        assert_eq!(
            config.endpoint.host_str(),
            Some("search.example.aoss.amazonaws.com")
        );
    }

    #[test]
    #[serial]
    fn test_index_config_rejects_invalid_endpoint() {
        clear_env();
        std::env::set_var("OPENSEARCH_INDEX_NAME", "movies");
        std::env::set_var("OPENSEARCH_ENDPOINT_URL", "not a url");

        let result = IndexConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidVar {
                var: "OPENSEARCH_ENDPOINT_URL",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_http_config_default_addr() {
        clear_env();
        let config = HttpConfig::from_env().unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
    }

    #[test]
    fn test_http_config_parse_rejects_garbage() {
        let result = HttpConfig::parse("not-an-addr");
        assert!(matches!(result, Err(ConfigError::InvalidVar { .. })));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("MSK_BROKER");
        assert_eq!(
            err.to_string(),
            "missing required environment variable: MSK_BROKER"
        );

        let err = ConfigError::InvalidVar {
            var: "MSKPIPE_HTTP_ADDR",
            reason: "bad port".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for MSKPIPE_HTTP_ADDR: bad port"
        );
    }
}
