//! Offset bookkeeping for the consume loop.
//!
//! The ledger records, per partition, how far indexing has progressed and how
//! far the stream has acknowledged commits. It is the single source of truth
//! for what may be committed: an offset enters the ledger only after the
//! index write for it succeeded, so a commit built from the ledger can never
//! run ahead of processing.
//!
//! A partition that fails an index write is marked *stalled*: its progress
//! freezes (later records are skipped, nothing past the last success is
//! committed) until the partition is dropped on rebalance or the process
//! restarts and the stream redelivers from the committed offset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::membership::TopicPartition;

/// A committable position: the next offset the group should resume from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    /// Topic the position belongs to.
    pub topic: String,
    /// Partition the position belongs to.
    pub partition: i32,
    /// Offset of the first not-yet-indexed record (last success + 1).
    pub next_offset: i64,
}

#[derive(Debug, Default, Clone)]
struct PartitionProgress {
    /// Last successfully indexed offset + 1, if anything was indexed.
    next_offset: Option<i64>,
    /// Last next-offset acknowledged by the stream.
    committed: Option<i64>,
    /// Set after an index failure; cleared only by dropping the partition.
    stalled: bool,
}

/// Per-partition indexing and commit progress.
#[derive(Debug, Default)]
pub struct OffsetLedger {
    progress: HashMap<(String, i32), PartitionProgress>,
}

/// Ledger shared between the consume loop and the membership handler.
pub type SharedLedger = Arc<Mutex<OffsetLedger>>;

impl OffsetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the record at `offset` was indexed successfully.
    pub fn record_indexed(&mut self, topic: &str, partition: i32, offset: i64) {
        let entry = self
            .progress
            .entry((topic.to_string(), partition))
            .or_default();
        let next = offset + 1;
        if entry.next_offset.map_or(true, |current| next > current) {
            entry.next_offset = Some(next);
        }
    }

    /// Freezes a partition after an index failure.
    pub fn mark_stalled(&mut self, topic: &str, partition: i32) {
        self.progress
            .entry((topic.to_string(), partition))
            .or_default()
            .stalled = true;
    }

    /// Whether a partition is frozen waiting for redelivery.
    pub fn is_stalled(&self, topic: &str, partition: i32) -> bool {
        self.progress
            .get(&(topic.to_string(), partition))
            .map_or(false, |entry| entry.stalled)
    }

    /// All positions that have been indexed but not yet acknowledged.
    ///
    /// Sorted by topic and partition so commit batches are deterministic.
    pub fn pending(&self) -> Vec<CommitEntry> {
        let mut entries: Vec<CommitEntry> = self
            .progress
            .iter()
            .filter_map(|((topic, partition), progress)| {
                let next_offset = progress.next_offset?;
                if progress.committed == Some(next_offset) {
                    return None;
                }
                Some(CommitEntry {
                    topic: topic.clone(),
                    partition: *partition,
                    next_offset,
                })
            })
            .collect();
        entries.sort_by(|a, b| (&a.topic, a.partition).cmp(&(&b.topic, b.partition)));
        entries
    }

    /// Pending positions restricted to the given partitions (revocation path).
    pub fn pending_for(&self, partitions: &[TopicPartition]) -> Vec<CommitEntry> {
        self.pending()
            .into_iter()
            .filter(|entry| {
                partitions
                    .iter()
                    .any(|tp| tp.topic == entry.topic && tp.partition == entry.partition)
            })
            .collect()
    }

    /// Marks positions as acknowledged by the stream.
    pub fn mark_committed(&mut self, entries: &[CommitEntry]) {
        for entry in entries {
            if let Some(progress) = self
                .progress
                .get_mut(&(entry.topic.clone(), entry.partition))
            {
                if progress.committed.map_or(true, |c| entry.next_offset > c) {
                    progress.committed = Some(entry.next_offset);
                }
            }
        }
    }

    /// Discards all state for the given partitions (revoked or lost).
    pub fn drop_partitions(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            self.progress.remove(&(tp.topic.clone(), tp.partition));
        }
    }
}
