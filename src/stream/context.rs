//! rdkafka client contexts for the MSK connection.
//!
//! Both paths authenticate with SASL/OAUTHBEARER: the client invokes
//! [`IamAuth::oauth_token`] on every authentication handshake, which asks the
//! MSK IAM signer for a fresh token backed by the shared credential chain.
//! Credentials are therefore re-queried per handshake, never cached here.
//!
//! The consumer context additionally forwards rebalance callbacks as
//! [`RebalanceEvent`]s; the callbacks only push onto an unbounded channel and
//! return, so a slow handler can never stall the group protocol.

use std::sync::mpsc as std_mpsc;

use aws_config::Region;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_msk_iam_sasl_signer::generate_auth_token_from_credentials_provider;
use rdkafka::client::OAuthToken;
use rdkafka::consumer::{BaseConsumer, Consumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use super::membership::{RebalanceEvent, TopicPartition};

/// IAM authenticator shared by the producer and consumer contexts.
#[derive(Clone)]
pub struct IamAuth {
    region: Region,
    credentials: SharedCredentialsProvider,
    handle: Handle,
}

impl IamAuth {
    /// # Arguments
    ///
    /// * `region` - Region the MSK cluster lives in
    /// * `credentials` - Shared provider re-queried per handshake
    /// * `handle` - Runtime handle used to drive the async signer from the
    ///   client's callback thread
    pub fn new(region: Region, credentials: SharedCredentialsProvider, handle: Handle) -> Self {
        Self {
            region,
            credentials,
            handle,
        }
    }

    /// Generates a fresh MSK IAM auth token.
    ///
    /// The signer is async while the client callback is synchronous, so the
    /// token future runs on the runtime and the callback thread blocks on a
    /// channel for the result.
    fn oauth_token(&self) -> Result<OAuthToken, Box<dyn std::error::Error>> {
        let region = self.region.clone();
        let credentials = self.credentials.clone();
        let (tx, rx) = std_mpsc::channel();

        self.handle.spawn(async move {
            let token = generate_auth_token_from_credentials_provider(region, credentials).await;
            let _ = tx.send(token);
        });

        let (token, expiration_time_ms) = rx
            .recv()
            .map_err(|err| io_error(err.to_string()))?
            .map_err(|err| io_error(err.to_string()))?;

        debug!(expires_at_ms = expiration_time_ms, "generated stream auth token");
        Ok(OAuthToken {
            token,
            principal_name: String::new(),
            lifetime_ms: expiration_time_ms,
        })
    }
}

fn io_error(message: String) -> Box<dyn std::error::Error> {
    Box::new(std::io::Error::new(std::io::ErrorKind::Other, message))
}

/// Producer-side context: IAM auth only, no group membership.
pub struct ProducerIamContext {
    auth: IamAuth,
}

impl ProducerIamContext {
    pub fn new(auth: IamAuth) -> Self {
        Self { auth }
    }
}

impl ClientContext for ProducerIamContext {
    const ENABLE_REFRESH_OAUTH_TOKEN: bool = true;

    fn generate_oauth_token(
        &self,
        _oauthbearer_config: Option<&str>,
    ) -> Result<OAuthToken, Box<dyn std::error::Error>> {
        self.auth.oauth_token()
    }
}

/// Consumer-side context: IAM auth plus rebalance event forwarding.
pub struct GroupConsumerContext {
    auth: IamAuth,
    events: UnboundedSender<RebalanceEvent>,
}

impl GroupConsumerContext {
    pub fn new(auth: IamAuth, events: UnboundedSender<RebalanceEvent>) -> Self {
        Self { auth, events }
    }

    fn emit(&self, event: RebalanceEvent) {
        // A closed channel means the membership handler is gone; the consumer
        // is shutting down and the event no longer matters.
        if self.events.send(event).is_err() {
            debug!("membership handler gone, dropping rebalance event");
        }
    }
}

impl ClientContext for GroupConsumerContext {
    const ENABLE_REFRESH_OAUTH_TOKEN: bool = true;

    fn generate_oauth_token(
        &self,
        _oauthbearer_config: Option<&str>,
    ) -> Result<OAuthToken, Box<dyn std::error::Error>> {
        self.auth.oauth_token()
    }
}

impl ConsumerContext for GroupConsumerContext {
    fn pre_rebalance(&self, consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Revoke(partitions) => {
                self.emit(RebalanceEvent::Revoked(partitions_of(partitions)));
            }
            Rebalance::Error(err) => {
                // The client does not enumerate which partitions were force-
                // lost; treat the whole current assignment as gone.
                error!(error = %err, "rebalance failed, treating assignment as lost");
                let owned = consumer
                    .assignment()
                    .map(|tpl| partitions_of(&tpl))
                    .unwrap_or_default();
                self.emit(RebalanceEvent::Lost(owned));
            }
            Rebalance::Assign(_) => {}
        }
    }

    fn post_rebalance(&self, _consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(partitions) = rebalance {
            self.emit(RebalanceEvent::Assigned(partitions_of(partitions)));
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!(offsets = offsets.count(), "offsets committed"),
            Err(err) => warn!(error = %err, "commit callback reported failure"),
        }
    }
}

fn partitions_of(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements()
        .iter()
        .map(|elem| TopicPartition {
            topic: elem.topic().to_string(),
            partition: elem.partition(),
        })
        .collect()
}
