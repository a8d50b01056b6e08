//! Partition-ownership lifecycle.
//!
//! The stream client raises rebalance callbacks on its own threads; those are
//! translated into [`RebalanceEvent`]s on a channel (see
//! [`super::context::GroupConsumerContext`]) so the callbacks return promptly
//! and never stall the group protocol. The [`MembershipHandler`] task drains
//! that channel and maintains the [`PartitionAssignment`] view the consume
//! loop consults before acting on any record.
//!
//! Event semantics:
//!
//! * **Assigned** - partitions join the live set; any stale ledger state for
//!   them is discarded (fresh ownership, fresh progress).
//! * **Revoked** - cooperative handoff: pending ledger offsets for exactly
//!   those partitions are committed best-effort, then the partitions leave
//!   the live set. A failed commit only widens the redelivery window.
//! * **Lost** - the partitions already belong to another group member. No
//!   commit is attempted (it would race the new owner); state is discarded.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use super::consumer::CommitProgress;
use super::ledger::SharedLedger;

/// One partition of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Ownership change raised by the stream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceEvent {
    /// Partitions were assigned to this instance.
    Assigned(Vec<TopicPartition>),
    /// Partitions are being cooperatively revoked.
    Revoked(Vec<TopicPartition>),
    /// Partitions were forcibly reassigned elsewhere.
    Lost(Vec<TopicPartition>),
}

/// The set of partitions this process currently owns, per topic.
#[derive(Debug, Default)]
pub struct PartitionAssignment {
    owned: HashMap<String, BTreeSet<i32>>,
}

/// Assignment view shared between the membership handler (writer) and the
/// consume loop (reader).
pub type SharedAssignment = Arc<RwLock<PartitionAssignment>>;

impl PartitionAssignment {
    /// Whether this process currently owns the partition.
    pub fn contains(&self, topic: &str, partition: i32) -> bool {
        self.owned
            .get(topic)
            .map_or(false, |partitions| partitions.contains(&partition))
    }

    /// Adds partitions to the live set.
    pub fn insert_all(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            self.owned
                .entry(tp.topic.clone())
                .or_default()
                .insert(tp.partition);
        }
    }

    /// Removes partitions from the live set.
    pub fn remove_all(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            if let Some(owned) = self.owned.get_mut(&tp.topic) {
                owned.remove(&tp.partition);
                if owned.is_empty() {
                    self.owned.remove(&tp.topic);
                }
            }
        }
    }

    /// Total number of owned partitions across topics.
    pub fn len(&self) -> usize {
        self.owned.values().map(BTreeSet::len).sum()
    }

    /// Whether nothing is currently owned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Task that applies rebalance events to the shared assignment and ledger.
pub struct MembershipHandler<C: CommitProgress> {
    assignment: SharedAssignment,
    ledger: SharedLedger,
    committer: C,
    events: UnboundedReceiver<RebalanceEvent>,
}

impl<C: CommitProgress> MembershipHandler<C> {
    pub fn new(
        assignment: SharedAssignment,
        ledger: SharedLedger,
        committer: C,
        events: UnboundedReceiver<RebalanceEvent>,
    ) -> Self {
        Self {
            assignment,
            ledger,
            committer,
            events,
        }
    }

    /// Drains rebalance events until the sending side (the consumer context)
    /// is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.apply(event);
        }
        debug!("rebalance channel closed, membership handler exiting");
    }

    fn apply(&self, event: RebalanceEvent) {
        match event {
            RebalanceEvent::Assigned(partitions) => {
                info!(partitions = ?partitions, "partitions assigned");
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .drop_partitions(&partitions);
                self.assignment
                    .write()
                    .expect("assignment lock poisoned")
                    .insert_all(&partitions);
            }
            RebalanceEvent::Revoked(partitions) => {
                info!(partitions = ?partitions, "partitions revoked, committing pending work");
                let pending = self
                    .ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .pending_for(&partitions);
                if !pending.is_empty() {
                    match self.committer.commit(&pending) {
                        Ok(()) => debug!(offsets = pending.len(), "pending offsets committed"),
                        Err(err) => warn!(
                            error = %err,
                            "best-effort commit before handoff failed, records will be redelivered"
                        ),
                    }
                }
                self.assignment
                    .write()
                    .expect("assignment lock poisoned")
                    .remove_all(&partitions);
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .drop_partitions(&partitions);
            }
            RebalanceEvent::Lost(partitions) => {
                warn!(partitions = ?partitions, "partitions lost, discarding in-flight state");
                self.assignment
                    .write()
                    .expect("assignment lock poisoned")
                    .remove_all(&partitions);
                self.ledger
                    .lock()
                    .expect("ledger lock poisoned")
                    .drop_partitions(&partitions);
            }
        }
    }
}
