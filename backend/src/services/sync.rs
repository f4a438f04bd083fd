//! Offline retry queue
//!
//! Write sets the store could not accept because it was unreachable or failed
//! server-side wait here until the next flush. Each set is kept whole so it is
//! replayed with a single atomic `apply`. A later write to a record supersedes
//! the pending one by taking that record out of the older set. Sets leave the
//! queue only once the store has applied or rejected them; the replay itself
//! is driven by `Repository::flush_queue` under the write lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{Entity, RecordWrite, StoreError};

/// One queued write set
#[derive(Debug, Clone)]
pub struct PendingSet {
    pub id: u64,
    pub tenant_id: Uuid,
    pub writes: Vec<RecordWrite>,
    pub attempts: u32,
}

#[derive(Default)]
pub struct SyncQueue {
    pending: Mutex<Vec<PendingSet>>,
    next_id: AtomicU64,
}

/// Outcome of one flush, counted in write sets
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    pub requeued: usize,
    pub rejected: Vec<RejectedSet>,
}

impl FlushReport {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// A queued write set the store refused; none of its records were applied
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedSet {
    pub tenant_id: Uuid,
    /// `entity:key` of every record in the set
    pub records: Vec<String>,
    pub reason: String,
}

impl RejectedSet {
    pub fn new(set: &PendingSet, err: &StoreError) -> Self {
        Self {
            tenant_id: set.tenant_id,
            records: set
                .writes
                .iter()
                .map(|w| format!("{}:{}", w.entity, w.key))
                .collect(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Record writes waiting
    pub pending: usize,
    pub sets: usize,
    pub entities: Vec<Entity>,
}

fn remove_records(pending: &mut Vec<PendingSet>, tenant_id: Uuid, writes: &[RecordWrite]) {
    for set in pending.iter_mut().filter(|s| s.tenant_id == tenant_id) {
        set.writes
            .retain(|queued| !writes.iter().any(|w| w.same_record(queued)));
    }
    pending.retain(|s| !s.writes.is_empty());
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write set, taking superseded records out of older sets
    pub async fn enqueue(&self, tenant_id: Uuid, writes: Vec<RecordWrite>) {
        if writes.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().await;
        remove_records(&mut pending, tenant_id, &writes);
        pending.push(PendingSet {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tenant_id,
            writes,
            attempts: 0,
        });
    }

    /// Remove pending writes made obsolete by a successful direct write
    pub async fn supersede(&self, tenant_id: Uuid, writes: &[RecordWrite]) {
        let mut pending = self.pending.lock().await;
        remove_records(&mut pending, tenant_id, writes);
    }

    /// Number of record writes waiting, across all sets
    pub async fn len(&self) -> usize {
        self.pending.lock().await.iter().map(|s| s.writes.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    pub async fn status(&self, tenant_id: Uuid) -> SyncStatus {
        let pending = self.pending.lock().await;
        let sets: Vec<&PendingSet> = pending.iter().filter(|s| s.tenant_id == tenant_id).collect();
        let mut entities: Vec<Entity> = sets
            .iter()
            .flat_map(|s| s.writes.iter().map(|w| w.entity))
            .collect();
        entities.sort();
        entities.dedup();
        SyncStatus {
            pending: sets.iter().map(|s| s.writes.len()).sum(),
            sets: sets.len(),
            entities,
        }
    }

    /// Pending writes of one entity, oldest first
    pub async fn pending_for(&self, tenant_id: Uuid, entity: Entity) -> Vec<RecordWrite> {
        self.pending
            .lock()
            .await
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .flat_map(|s| s.writes.iter().filter(|w| w.entity == entity).cloned())
            .collect()
    }

    /// Ids of the queued sets in queue order
    pub(crate) async fn set_ids(&self) -> Vec<u64> {
        self.pending.lock().await.iter().map(|s| s.id).collect()
    }

    pub(crate) async fn get(&self, id: u64) -> Option<PendingSet> {
        self.pending.lock().await.iter().find(|s| s.id == id).cloned()
    }

    pub(crate) async fn remove(&self, id: u64) {
        self.pending.lock().await.retain(|s| s.id != id);
    }

    pub(crate) async fn record_attempt(&self, id: u64) -> u32 {
        let mut pending = self.pending.lock().await;
        match pending.iter_mut().find(|s| s.id == id) {
            Some(set) => {
                set.attempts += 1;
                set.attempts
            }
            None => 0,
        }
    }
}
