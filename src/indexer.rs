//! Index-store write path.
//!
//! Each record value is posted verbatim as one document to a fixed index
//! (`POST {endpoint}/{index}/_doc`). Requests are SigV4-signed for the
//! OpenSearch Serverless service with credentials re-queried from the
//! [`CredentialChain`] per request.
//!
//! The write either succeeds or fails as a whole; the consume loop must not
//! commit a record whose write failed. No document id is derived from the
//! record, so a redelivered record produces a second document.

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::IndexConfig;
use crate::credentials::{CredentialChain, CredentialsError};

/// Service name the index-store requests are signed for.
const SIGNING_SERVICE: &str = "aoss";

/// Errors raised by the index write path.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The document URL could not be built from the endpoint.
    #[error("invalid index endpoint: {0}")]
    Endpoint(String),

    /// Fresh credentials could not be retrieved for signing.
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialsError),

    /// The request could not be signed.
    #[error("request signing failed: {0}")]
    Signing(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The index store rejected the write.
    #[error("index store error ({status}): {message}")]
    Store {
        /// HTTP status returned by the store.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },
}

/// Acknowledgement for one indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReceipt {
    /// Document id assigned by the store, when the response carried one.
    pub id: Option<String>,
}

/// Response body of a `_doc` write.
#[derive(Debug, Deserialize)]
struct IndexStoreResponse {
    #[serde(rename = "_id")]
    id: Option<String>,
}

/// Seam between the consume loop and the index store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Writes one document synchronously; success or failure only.
    async fn index(&self, document: &[u8]) -> Result<IndexReceipt, IndexError>;
}

/// [`Indexer`] backed by an OpenSearch endpoint.
pub struct OpenSearchIndexer {
    http: reqwest::Client,
    doc_url: Url,
    index: String,
    credentials: CredentialChain,
}

impl OpenSearchIndexer {
    /// Creates the indexer and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Endpoint`] if the document URL cannot be built
    /// from the configured endpoint, or [`IndexError::Http`] if the HTTP
    /// client cannot be constructed.
    pub fn new(config: &IndexConfig, credentials: CredentialChain) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let doc_url = config
            .endpoint
            .join(&format!("{}/_doc", config.index))
            .map_err(|err| IndexError::Endpoint(err.to_string()))?;

        Ok(Self {
            http,
            doc_url,
            index: config.index.clone(),
            credentials,
        })
    }

    /// Builds the signed `_doc` request for one document.
    fn signed_request(
        &self,
        credentials: &Credentials,
        region: &Region,
        document: &[u8],
        now: SystemTime,
    ) -> Result<reqwest::Request, IndexError> {
        let mut request = http::Request::builder()
            .method(http::Method::POST)
            .uri(self.doc_url.as_str())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(document.to_vec())
            .map_err(|err| IndexError::Signing(err.to_string()))?;

        let identity = credentials.clone().into();
        let mut settings = SigningSettings::default();
        // Serverless collections require the payload checksum header.
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(region.as_ref())
            .name(SIGNING_SERVICE)
            .time(now)
            .settings(settings)
            .build()
            .map_err(|err| IndexError::Signing(err.to_string()))?
            .into();

        let headers = request.headers().iter().filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str(), value))
        });
        let signable = SignableRequest::new(
            request.method().as_str(),
            request.uri().to_string(),
            headers,
            SignableBody::Bytes(request.body().as_slice()),
        )
        .map_err(|err| IndexError::Signing(err.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|err| IndexError::Signing(err.to_string()))?
            .into_parts();
        instructions.apply_to_request_http0x(&mut request);

        Ok(reqwest::Request::try_from(request)?)
    }
}

#[async_trait]
impl Indexer for OpenSearchIndexer {
    async fn index(&self, document: &[u8]) -> Result<IndexReceipt, IndexError> {
        // Re-queried per write so rotated session credentials take effect.
        let credentials = self.credentials.credentials().await?;
        let region = self.credentials.region().clone();

        let request = self.signed_request(&credentials, &region, document, SystemTime::now())?;
        let response = self.http.execute(request).await?;

        let status = response.status();
        if status.is_success() {
            let id = response
                .json::<IndexStoreResponse>()
                .await
                .ok()
                .and_then(|body| body.id);
            debug!(index = %self.index, document_id = id.as_deref().unwrap_or("-"), "document indexed");
            Ok(IndexReceipt { id })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(IndexError::Store {
                status: status.as_u16(),
                message,
            })
        }
    }
}
