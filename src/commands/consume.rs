//! Consumer bootstrap: configuration, credentials, stream client, membership
//! handler and the consume loop, wired to Ctrl-C shutdown.

use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{IndexConfig, StreamConfig};
use crate::credentials::CredentialChain;
use crate::indexer::{Indexer, OpenSearchIndexer};
use crate::stream::{
    build_consumer, ConsumeLoop, IamAuth, MembershipHandler, OffsetLedger, PartitionAssignment,
    SharedAssignment, SharedLedger, StreamCommitter,
};

/// Runs the stream-to-index consumer until Ctrl-C or a fatal loop error.
pub async fn run_consume() -> Result<()> {
    let stream_config = StreamConfig::from_env().context("loading stream configuration")?;
    let index_config = IndexConfig::from_env().context("loading index configuration")?;

    info!(
        brokers = %stream_config.brokers,
        topic = %stream_config.topic,
        group_id = %stream_config.group_id,
        index = %index_config.index,
        endpoint = %index_config.endpoint,
        "loaded consumer configuration"
    );

    let credentials = CredentialChain::load(&stream_config.region)
        .await
        .context("resolving AWS credentials")?;

    let indexer: Arc<dyn Indexer> = Arc::new(
        OpenSearchIndexer::new(&index_config, credentials.clone())
            .context("creating index-store client")?,
    );

    let (rebalance_tx, rebalance_rx) = mpsc::unbounded_channel();
    let auth = IamAuth::new(
        credentials.region().clone(),
        credentials.provider(),
        Handle::current(),
    );
    let consumer = Arc::new(
        build_consumer(&stream_config, auth, rebalance_tx).context("creating stream client")?,
    );

    let assignment: SharedAssignment = Arc::new(RwLock::new(PartitionAssignment::default()));
    let ledger: SharedLedger = Arc::new(Mutex::new(OffsetLedger::new()));
    let committer = Arc::new(StreamCommitter::new(Arc::clone(&consumer)));

    let membership = MembershipHandler::new(
        Arc::clone(&assignment),
        Arc::clone(&ledger),
        Arc::clone(&committer),
        rebalance_rx,
    );
    let membership_task = tokio::spawn(membership.run());

    let shutdown = CancellationToken::new();
    let consume_loop = ConsumeLoop::new(
        Arc::clone(&consumer),
        indexer,
        committer,
        assignment,
        ledger,
        &stream_config,
        shutdown.clone(),
    );
    let mut loop_task = tokio::spawn(consume_loop.run());

    tokio::select! {
        result = &mut loop_task => {
            result.context("consume loop task failed")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("shutdown signal received, stopping consume loop");
            shutdown.cancel();
            loop_task.await.context("consume loop task failed")??;
        }
    }

    membership_task.abort();
    info!("stream client released");
    Ok(())
}
