//! AWS credential collaborator.
//!
//! Wraps the aws-config default chain (environment, shared profile, instance
//! role) behind a small handle that both the stream authenticator and the
//! index-store signer share. Credentials are re-queried from the chain on
//! every signing or authentication attempt so that short-lived session
//! credentials rotate without a restart.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use thiserror::Error;
use tracing::info;

/// Errors raised by the credential chain.
#[derive(Error, Debug)]
pub enum CredentialsError {
    /// The AWS configuration resolved without any credentials provider.
    #[error("no credentials provider available in the AWS configuration chain")]
    NoProvider,

    /// The provider failed to yield credentials.
    #[error("credential retrieval failed: {0}")]
    Retrieve(String),
}

/// Handle on the resolved AWS credential chain for one region.
///
/// Cheap to clone; clones share the underlying provider.
#[derive(Debug, Clone)]
pub struct CredentialChain {
    region: Region,
    provider: SharedCredentialsProvider,
}

impl CredentialChain {
    /// Resolves the default credential chain for `region`.
    ///
    /// Performs one eager retrieval so a mis-configured environment fails at
    /// startup rather than on the first publish or index write. The resolved
    /// identity is logged (the SDK redacts the secret parts).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::NoProvider`] if the chain resolved without
    /// a provider, or [`CredentialsError::Retrieve`] if the eager retrieval
    /// fails.
    pub async fn load(region: &str) -> Result<Self, CredentialsError> {
        let region = Region::new(region.to_string());
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region.clone())
            .load()
            .await;

        let provider = sdk_config
            .credentials_provider()
            .ok_or(CredentialsError::NoProvider)?;

        let chain = Self { region, provider };
        let credentials = chain.credentials().await?;
        info!(credentials = ?credentials, "resolved AWS credentials");

        Ok(chain)
    }

    /// Builds a chain around fixed credentials.
    ///
    /// Intended for local setups and tests where the default chain is not
    /// available.
    pub fn from_static(region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        Self {
            region: Region::new(region.to_string()),
            provider: SharedCredentialsProvider::new(credentials),
        }
    }

    /// The region this chain was resolved for.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The shared provider, for collaborators that drive their own retrieval
    /// (the stream authenticator).
    pub fn provider(&self) -> SharedCredentialsProvider {
        self.provider.clone()
    }

    /// Retrieves a fresh set of credentials from the chain.
    ///
    /// Called once per signing attempt; never caches beyond what the SDK
    /// provider itself caches.
    pub async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        self.provider
            .provide_credentials()
            .await
            .map_err(|err| CredentialsError::Retrieve(err.to_string()))
    }
}
