//! Consume-transform-index-acknowledge loop.
//!
//! One long-running worker repeats a four-stage cycle:
//!
//! 1. **Liveness** - confirm the stream client answers a metadata request for
//!    the topic before polling; a dead connection must kill the loop rather
//!    than let it spin.
//! 2. **Poll** - wait up to the poll timeout for a record, then drain whatever
//!    else the client already buffered (bounded by `max_poll_records`).
//!    A timeout is "nothing new yet", not an error.
//! 3. **Process** - per record, in delivery order: skip records on partitions
//!    this instance no longer owns or that are stalled, otherwise hand the
//!    value to the [`Indexer`].
//! 4. **Commit** - after each successful index write, commit every pending
//!    ledger position still inside the live assignment. Commit failures are
//!    reported, not fatal: an uncommitted offset only risks redelivery.
//!
//! An index failure stalls its partition (nothing at or past the failed
//! record is committed, later records are skipped) while other partitions
//! keep flowing; the record is recovered by redelivery after a restart or
//! rebalance. There is no in-process retry.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::increment_counter;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::base_client_config;
use super::context::{GroupConsumerContext, IamAuth};
use super::ledger::{CommitEntry, SharedLedger};
use super::membership::{RebalanceEvent, SharedAssignment};
use crate::config::StreamConfig;
use crate::indexer::Indexer;

/// Errors that terminate the consume loop.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// The pre-poll liveness check failed.
    #[error("liveness check failed: {0}")]
    Liveness(#[source] KafkaError),

    /// Polling failed with an error that is not a per-partition fetch error.
    #[error("polling the stream failed: {0}")]
    Poll(#[source] KafkaError),

    /// A blocking helper task died.
    #[error("internal task failure: {0}")]
    Internal(String),
}

/// Commit seam so the loop and the membership handler can be exercised
/// without a live broker.
#[cfg_attr(test, mockall::automock)]
pub trait CommitProgress: Send + Sync {
    /// Synchronously commits the given positions to the stream.
    fn commit(&self, entries: &[CommitEntry]) -> Result<(), KafkaError>;
}

impl<T: CommitProgress + ?Sized> CommitProgress for Arc<T> {
    fn commit(&self, entries: &[CommitEntry]) -> Result<(), KafkaError> {
        (**self).commit(entries)
    }
}

/// [`CommitProgress`] implementation backed by the consumer session.
pub struct StreamCommitter {
    consumer: Arc<StreamConsumer<GroupConsumerContext>>,
}

impl StreamCommitter {
    pub fn new(consumer: Arc<StreamConsumer<GroupConsumerContext>>) -> Self {
        Self { consumer }
    }
}

impl CommitProgress for StreamCommitter {
    fn commit(&self, entries: &[CommitEntry]) -> Result<(), KafkaError> {
        let mut tpl = TopicPartitionList::new();
        for entry in entries {
            tpl.add_partition_offset(
                &entry.topic,
                entry.partition,
                Offset::Offset(entry.next_offset),
            )?;
        }
        self.consumer.commit(&tpl, CommitMode::Sync)
    }
}

/// Builds the consumer session and subscribes it to the configured topic.
///
/// Offsets are committed manually only (`enable.auto.commit=false`); the
/// stream must never acknowledge a record this process has not indexed.
///
/// # Errors
///
/// Returns the client error if the session cannot be created or the
/// subscription is rejected.
pub fn build_consumer(
    config: &StreamConfig,
    auth: IamAuth,
    events: UnboundedSender<RebalanceEvent>,
) -> Result<StreamConsumer<GroupConsumerContext>, KafkaError> {
    let consumer: StreamConsumer<GroupConsumerContext> =
        base_client_config(config, "mskpipe-consumer")
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set(
                "session.timeout.ms",
                config.session_timeout.as_millis().to_string(),
            )
            .create_with_context(GroupConsumerContext::new(auth, events))?;

    consumer.subscribe(&[&config.topic])?;
    Ok(consumer)
}

/// A record copied out of the client, ready for processing.
#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Per-record pipeline: ownership check, index write, commit.
///
/// Split from the loop so the commit/stall semantics are testable with mock
/// collaborators.
struct RecordProcessor {
    indexer: Arc<dyn Indexer>,
    committer: Arc<dyn CommitProgress>,
    assignment: SharedAssignment,
    ledger: SharedLedger,
}

impl RecordProcessor {
    async fn handle_record(&self, record: &FetchedRecord) {
        let owned = self
            .assignment
            .read()
            .expect("assignment lock poisoned")
            .contains(&record.topic, record.partition);
        if !owned {
            debug!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "skipping record on unowned partition"
            );
            return;
        }

        if self
            .ledger
            .lock()
            .expect("ledger lock poisoned")
            .is_stalled(&record.topic, record.partition)
        {
            debug!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "partition stalled, awaiting redelivery"
            );
            return;
        }

        match self.indexer.index(&record.payload).await {
            Ok(receipt) => {
                increment_counter!("records_indexed_total");
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    document_id = receipt.id.as_deref().unwrap_or("-"),
                    "record indexed"
                );
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .record_indexed(&record.topic, record.partition, record.offset);
                self.commit_progress();
            }
            Err(err) => {
                increment_counter!("index_failures_total");
                error!(
                    error = %err,
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "index write failed, stalling partition until redelivery"
                );
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .mark_stalled(&record.topic, record.partition);
            }
        }
    }

    /// Commits every pending position that is still owned.
    fn commit_progress(&self) {
        let entries: Vec<CommitEntry> = {
            let ledger = self.ledger.lock().expect("ledger lock poisoned");
            let assignment = self.assignment.read().expect("assignment lock poisoned");
            ledger
                .pending()
                .into_iter()
                .filter(|entry| assignment.contains(&entry.topic, entry.partition))
                .collect()
        };

        if entries.is_empty() {
            return;
        }

        match self.committer.commit(&entries) {
            Ok(()) => {
                increment_counter!("offset_commits_total");
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .mark_committed(&entries);
            }
            Err(err) => {
                increment_counter!("offset_commit_failures_total");
                warn!(error = %err, "offset commit failed, progress will be retried");
            }
        }
    }
}

/// The long-running consume worker.
pub struct ConsumeLoop {
    consumer: Arc<StreamConsumer<GroupConsumerContext>>,
    processor: RecordProcessor,
    topic: String,
    poll_timeout: Duration,
    liveness_timeout: Duration,
    max_poll_records: usize,
    shutdown: CancellationToken,
}

impl ConsumeLoop {
    pub fn new(
        consumer: Arc<StreamConsumer<GroupConsumerContext>>,
        indexer: Arc<dyn Indexer>,
        committer: Arc<dyn CommitProgress>,
        assignment: SharedAssignment,
        ledger: SharedLedger,
        config: &StreamConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            consumer,
            processor: RecordProcessor {
                indexer,
                committer,
                assignment,
                ledger,
            },
            topic: config.topic.clone(),
            poll_timeout: config.poll_timeout,
            liveness_timeout: config.liveness_timeout,
            max_poll_records: config.max_poll_records,
            shutdown,
        }
    }

    /// Runs the cycle until cancellation or a fatal error.
    pub async fn run(self) -> Result<(), ConsumeError> {
        info!(topic = %self.topic, "consume loop started, waiting for records");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.check_liveness().await?;

            let batch = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                polled = self.poll_batch() => polled?,
            };

            for record in &batch {
                self.processor.handle_record(record).await;
            }
        }

        info!("consume loop stopped");
        Ok(())
    }

    /// Stage 1: metadata round-trip for the topic.
    async fn check_liveness(&self) -> Result<(), ConsumeError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();
        let timeout = self.liveness_timeout;

        let metadata = tokio::task::spawn_blocking(move || {
            consumer.fetch_metadata(Some(&topic), timeout)
        })
        .await
        .map_err(|err| ConsumeError::Internal(err.to_string()))?
        .map_err(ConsumeError::Liveness)?;

        debug!(brokers = metadata.brokers().len(), "stream client alive");
        Ok(())
    }

    /// Stage 2: one bounded wait, then drain whatever is already buffered.
    async fn poll_batch(&self) -> Result<Vec<FetchedRecord>, ConsumeError> {
        let mut batch = Vec::new();

        match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            // Nothing new yet; cycle again.
            Err(_elapsed) => return Ok(batch),
            Ok(Err(err)) if is_fetch_level(&err) => {
                warn!(error = %err, "fetch error reported, continuing");
                return Ok(batch);
            }
            Ok(Err(err)) => return Err(ConsumeError::Poll(err)),
            Ok(Ok(message)) => batch.push(fetched(&message)),
        }

        while batch.len() < self.max_poll_records {
            match self.consumer.recv().now_or_never() {
                None => break,
                Some(Ok(message)) => batch.push(fetched(&message)),
                Some(Err(err)) if is_fetch_level(&err) => {
                    warn!(error = %err, "fetch error reported, continuing");
                }
                Some(Err(err)) => return Err(ConsumeError::Poll(err)),
            }
        }

        Ok(batch)
    }
}

fn fetched(message: &rdkafka::message::BorrowedMessage<'_>) -> FetchedRecord {
    FetchedRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

/// Per-partition fetch errors are reported but never stop the cycle; anything
/// else is treated as a connection problem and kills the loop.
fn is_fetch_level(err: &KafkaError) -> bool {
    matches!(
        err,
        KafkaError::PartitionEOF(_) | KafkaError::MessageConsumption(_)
    )
}
