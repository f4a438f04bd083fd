//! Store access used by the services: reads overlaid with queued writes,
//! serialized mutations and atomic commits with offline fallback.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use shared::models::{
    AuxiliaryMaterial, BottlingLot, BulkExit, Delivery, MillingLot, NurseTransfer, PomaceExit,
    ProductionBatch, Tank, TankCycle, TankMovement,
};
use shared::traceability::TraceRecords;

use super::{Record, RecordWrite, Store, StoreError, WriteSet};
use crate::error::{AppError, AppResult};
use crate::services::sync::{FlushReport, RejectedSet, SyncQueue};

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
    queue: Arc<SyncQueue>,
    write_lock: Arc<Mutex<()>>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>, queue: Arc<SyncQueue>) -> Self {
        Self {
            store,
            queue,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Held for the whole check-then-commit of a mutating operation
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Latest known state of an entity: stored records with queued writes on top
    pub async fn load<R: Record>(&self, tenant_id: Uuid) -> AppResult<Vec<R>> {
        let mut values: Vec<(String, serde_json::Value)> = Vec::new();
        for value in self.store.fetch_all(tenant_id, R::ENTITY).await? {
            let record: R = decode(value.clone())?;
            values.push((record.key(), value));
        }

        for pending in self.queue.pending_for(tenant_id, R::ENTITY).await {
            match values.iter_mut().find(|(key, _)| *key == pending.key) {
                Some((_, data)) => *data = pending.data,
                None => values.push((pending.key, pending.data)),
            }
        }

        let records = values
            .into_iter()
            .map(|(_, value)| decode(value))
            .collect::<Result<Vec<R>, StoreError>>()?;
        Ok(records)
    }

    /// Commit a write set atomically. When the store is unreachable the set is
    /// queued for retry and the caller is told so.
    pub async fn commit(&self, tenant_id: Uuid, writes: WriteSet) -> AppResult<()> {
        let writes: Vec<RecordWrite> = writes.into_writes();
        if writes.is_empty() {
            return Ok(());
        }

        match self.store.apply(tenant_id, writes.clone()).await {
            Ok(()) => {
                self.queue.supersede(tenant_id, &writes).await;
                Ok(())
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(tenant = %tenant_id, writes = writes.len(), "Store unavailable, queueing write set: {}", err);
                self.queue.enqueue(tenant_id, writes).await;
                Err(AppError::SyncQueued {
                    pending: self.queue.len().await,
                })
            }
            Err(err) => {
                tracing::error!(tenant = %tenant_id, "Write set rejected: {}", err);
                Err(err.into())
            }
        }
    }

    /// Replay queued write sets in queue order.
    ///
    /// Holds the write lock so no mutation interleaves with the replay. A set
    /// leaves the queue only after the store applied or rejected it, so reads
    /// keep seeing it meanwhile. After a transient failure the tenant's later
    /// sets wait for the next flush since they may build on the failed one.
    pub async fn flush_queue(&self) -> FlushReport {
        let _guard = self.lock().await;
        let mut report = FlushReport::default();
        let mut blocked: HashSet<Uuid> = HashSet::new();

        for id in self.queue.set_ids().await {
            let Some(set) = self.queue.get(id).await else {
                continue;
            };
            if blocked.contains(&set.tenant_id) {
                report.requeued += 1;
                continue;
            }

            match self.store.apply(set.tenant_id, set.writes.clone()).await {
                Ok(()) => {
                    self.queue.remove(id).await;
                    report.applied += 1;
                }
                Err(err) if err.is_transient() => {
                    let attempts = self.queue.record_attempt(id).await;
                    tracing::debug!(
                        tenant = %set.tenant_id,
                        writes = set.writes.len(),
                        attempts,
                        "Queued write set kept for retry: {}",
                        err
                    );
                    blocked.insert(set.tenant_id);
                    report.requeued += 1;
                }
                Err(err) => {
                    self.queue.remove(id).await;
                    let rejected = RejectedSet::new(&set, &err);
                    tracing::error!(
                        tenant = %set.tenant_id,
                        records = ?rejected.records,
                        "Store rejected a queued write set; none of it was applied: {}",
                        err
                    );
                    report.rejected.push(rejected);
                }
            }
        }

        report
    }

    pub async fn snapshot(&self, tenant_id: Uuid) -> AppResult<Snapshot> {
        Ok(Snapshot {
            deliveries: self.load(tenant_id).await?,
            lots: self.load(tenant_id).await?,
            batches: self.load(tenant_id).await?,
            tanks: self.load(tenant_id).await?,
            cycles: self.load(tenant_id).await?,
            movements: self.load(tenant_id).await?,
            nurse_transfers: self.load(tenant_id).await?,
            bottling_lots: self.load(tenant_id).await?,
            bulk_exits: self.load(tenant_id).await?,
            pomace_exits: self.load(tenant_id).await?,
            materials: self.load(tenant_id).await?,
        })
    }
}

fn decode<R: Record>(value: serde_json::Value) -> Result<R, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Every record of a tenant, loaded for read-side queries
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub deliveries: Vec<Delivery>,
    pub lots: Vec<MillingLot>,
    pub batches: Vec<ProductionBatch>,
    pub tanks: Vec<Tank>,
    pub cycles: Vec<TankCycle>,
    pub movements: Vec<TankMovement>,
    pub nurse_transfers: Vec<NurseTransfer>,
    pub bottling_lots: Vec<BottlingLot>,
    pub bulk_exits: Vec<BulkExit>,
    pub pomace_exits: Vec<PomaceExit>,
    pub materials: Vec<AuxiliaryMaterial>,
}

impl Snapshot {
    pub fn trace_records(&self) -> TraceRecords<'_> {
        TraceRecords {
            deliveries: &self.deliveries,
            lots: &self.lots,
            batches: &self.batches,
            tanks: &self.tanks,
            movements: &self.movements,
            nurse_transfers: &self.nurse_transfers,
            bottling_lots: &self.bottling_lots,
            bulk_exits: &self.bulk_exits,
        }
    }
}
