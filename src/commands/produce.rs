//! Producer bootstrap: configuration, credentials, stream client, HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::{HttpConfig, StreamConfig};
use crate::credentials::CredentialChain;
use crate::server::{self, AppState};
use crate::stream::{IamAuth, StreamPublisher};

/// Runs the HTTP-to-stream producer until the listener fails.
///
/// Startup is fail-fast: missing configuration or unresolvable credentials
/// abort before the listener is bound. Once serving, the process only
/// terminates on a listener failure; in-flight requests get no graceful
/// drain.
pub async fn run_produce(listen: Option<String>) -> Result<()> {
    let stream_config = StreamConfig::from_env().context("loading stream configuration")?;
    let http_config = match listen {
        Some(addr) => HttpConfig::parse(&addr)?,
        None => HttpConfig::from_env()?,
    };

    info!(
        brokers = %stream_config.brokers,
        topic = %stream_config.topic,
        region = %stream_config.region,
        "loaded producer configuration"
    );

    let credentials = CredentialChain::load(&stream_config.region)
        .await
        .context("resolving AWS credentials")?;
    let auth = IamAuth::new(
        credentials.region().clone(),
        credentials.provider(),
        Handle::current(),
    );

    let publisher =
        StreamPublisher::new(&stream_config, auth).context("creating stream client")?;
    let state = AppState {
        publisher: Arc::new(publisher),
    };

    let listener = TcpListener::bind(http_config.listen_addr)
        .await
        .with_context(|| format!("binding {}", http_config.listen_addr))?;
    info!(addr = %http_config.listen_addr, "http server ready");

    axum::serve(listener, server::router(state))
        .await
        .context("http server terminated")?;

    Ok(())
}
