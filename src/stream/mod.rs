//! Stream (Kafka/MSK) integration.
//!
//! - [`producer`]: synchronous publish-and-acknowledge path
//! - [`consumer`]: the consume-transform-index-acknowledge loop
//! - [`membership`]: partition-ownership lifecycle
//! - [`ledger`]: offset bookkeeping behind the commit path
//! - [`context`]: rdkafka contexts (IAM auth, rebalance forwarding)

pub mod consumer;
pub mod context;
pub mod ledger;
pub mod membership;
pub mod producer;

pub use consumer::{
    build_consumer, CommitProgress, ConsumeError, ConsumeLoop, FetchedRecord, StreamCommitter,
};
pub use context::{GroupConsumerContext, IamAuth, ProducerIamContext};
pub use ledger::{CommitEntry, OffsetLedger, SharedLedger};
pub use membership::{
    MembershipHandler, PartitionAssignment, RebalanceEvent, SharedAssignment, TopicPartition,
};
pub use producer::{Publish, PublishError, PublishResult, StreamPublisher};

use rdkafka::ClientConfig;

use crate::config::StreamConfig;

/// Client settings shared by both paths: seed brokers and IAM-over-TLS SASL.
pub(crate) fn base_client_config(config: &StreamConfig, client_id: &str) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("security.protocol", "SASL_SSL")
        .set("sasl.mechanism", "OAUTHBEARER")
        .set("client.id", client_id);
    client_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_client_config_uses_iam_sasl() {
        let config = StreamConfig {
            brokers: "b-1.example:9098".to_string(),
            topic: "movies".to_string(),
            region: "us-east-1".to_string(),
            group_id: "group".to_string(),
            poll_timeout: std::time::Duration::from_secs(5),
            liveness_timeout: std::time::Duration::from_secs(10),
            delivery_timeout: std::time::Duration::from_secs(30),
            session_timeout: std::time::Duration::from_secs(30),
            max_poll_records: 64,
        };

        let client_config = base_client_config(&config, "mskpipe-test");
        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("b-1.example:9098")
        );
        assert_eq!(client_config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client_config.get("sasl.mechanism"), Some("OAUTHBEARER"));
        assert_eq!(client_config.get("client.id"), Some("mskpipe-test"));
    }
}
