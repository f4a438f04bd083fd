//! Offline retry queue tests
//!
//! Write sets made while the store is unreachable stay visible locally, are
//! replayed whole on flush, and are reported back when the store rejects them.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{day, dec, milling_delivery, mill_config, Mill};
use olive_mill_backend::error::AppError;
use olive_mill_backend::services::{OutflowService, SyncQueue};
use olive_mill_backend::store::{Entity, MemoryStore, RecordWrite, Repository, Store, StoreError};
use proptest::prelude::*;
use serde_json::json;
use shared::closure::ClosureRequest;
use shared::models::{AuxiliaryMaterial, DeliveryStatus, MaterialCategory, Tank};
use shared::types::{Confirmations, SessionContext};
use tokio::sync::Notify;
use uuid::Uuid;

fn write(key: &str, value: i64) -> RecordWrite {
    RecordWrite {
        entity: Entity::AuxiliaryMaterial,
        key: key.to_string(),
        data: json!({ "id": key, "stock_units": value }),
    }
}

fn caps(stock: i64) -> AuxiliaryMaterial {
    AuxiliaryMaterial {
        id: "CAP-PET".to_string(),
        name: "PET cap".to_string(),
        category: MaterialCategory::Cap,
        size_liters: None,
        stock_units: stock,
    }
}

/// Memory store whose next `apply` waits until released
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Store for GatedStore {
    async fn fetch_all(
        &self,
        tenant_id: Uuid,
        entity: Entity,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        self.inner.fetch_all(tenant_id, entity).await
    }

    async fn upsert(&self, tenant_id: Uuid, write: RecordWrite) -> Result<(), StoreError> {
        self.inner.upsert(tenant_id, write).await
    }

    async fn apply(&self, tenant_id: Uuid, writes: Vec<RecordWrite>) -> Result<(), StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.apply(tenant_id, writes).await
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

/// Two deliveries milled from hopper 3 while the store is up, then the
/// closure into D.02 made during an outage
async fn queued_closure(mill: &Mill) -> String {
    mill.storage_tank(2, "D.02", "20000").await;
    mill.deliver("Juan Pérez", 3, "2000").await;
    mill.deliver("María López", 3, "3000").await;
    let lot = mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap();

    mill.store
        .fail_writes(Some(StoreError::Unavailable("connection refused".to_string())))
        .await;
    let request = ClosureRequest {
        production_date: day(10),
        milling_lot_ids: vec![lot.id.clone()],
        real_oil_kg: dec("1000"),
        tank_id: Some(2),
        notes: None,
        series_choice: None,
        confirmations: Confirmations::default(),
    };
    let err = mill.production.close(&mill.ctx, request).await.unwrap_err();
    assert!(matches!(err, AppError::SyncQueued { .. }));
    lot.id
}

async fn stored_tank(mill: &Mill, id: u32) -> Tank {
    let rows = mill
        .store
        .fetch_all(mill.ctx.tenant_id, Entity::Tank)
        .await
        .unwrap();
    let tanks: Vec<Tank> = rows
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect();
    tanks.into_iter().find(|t| t.id == id).unwrap()
}

#[tokio::test]
async fn test_offline_write_is_queued_and_visible() {
    let mill = Mill::new();
    mill.store
        .fail_writes(Some(StoreError::Unavailable("connection refused".to_string())))
        .await;

    let err = mill
        .intake
        .register_delivery(&mill.ctx, milling_delivery("Ana", 3, "1000", "Picual"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SyncQueued { pending: 1 }));

    // The queued delivery is part of the latest local state
    let deliveries = mill.intake.list_deliveries(&mill.ctx).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].net_kg(), dec("1000"));

    let second = mill
        .intake
        .register_delivery(&mill.ctx, milling_delivery("Luis", 3, "500", "Picual"))
        .await
        .unwrap_err();
    assert!(matches!(second, AppError::SyncQueued { pending: 2 }));
    assert_eq!(mill.intake.list_deliveries(&mill.ctx).await.unwrap().len(), 2);

    let status = mill.repo.queue().status(mill.ctx.tenant_id).await;
    assert_eq!((status.pending, status.sets), (2, 2));
    assert_eq!(status.entities, vec![Entity::Delivery]);
}

#[tokio::test]
async fn test_flush_applies_after_recovery() {
    let mill = Mill::new();
    mill.store
        .fail_writes(Some(StoreError::Server("503".to_string())))
        .await;
    let _ = mill
        .intake
        .register_delivery(&mill.ctx, milling_delivery("Ana", 3, "1000", "Picual"))
        .await;

    let report = mill.repo.flush_queue().await;
    assert_eq!((report.applied, report.requeued), (0, 1));
    assert!(!report.has_rejections());
    assert_eq!(mill.repo.queue().len().await, 1);

    mill.store.fail_writes(None).await;
    let report = mill.repo.flush_queue().await;
    assert_eq!(report.applied, 1);
    assert!(mill.repo.queue().is_empty().await);

    let stored = mill
        .store
        .fetch_all(mill.ctx.tenant_id, Entity::Delivery)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_later_sets_wait_behind_a_failed_one() {
    let mill = Mill::new();
    mill.store
        .fail_writes(Some(StoreError::Unavailable("timeout".to_string())))
        .await;
    for grower in ["Ana", "Luis", "Rosa"] {
        let _ = mill
            .intake
            .register_delivery(&mill.ctx, milling_delivery(grower, 3, "1000", "Picual"))
            .await;
    }

    let report = mill.repo.flush_queue().await;
    assert_eq!((report.applied, report.requeued), (0, 3));
    assert_eq!(mill.repo.queue().status(mill.ctx.tenant_id).await.sets, 3);
}

#[tokio::test]
async fn test_commit_during_flush_is_not_overwritten() {
    let store = Arc::new(GatedStore::default());
    let repo = Repository::new(store.clone(), Arc::new(SyncQueue::new()));
    let outflows = OutflowService::new(repo.clone(), mill_config());
    let ctx = SessionContext::new(Uuid::new_v4());

    // An older stock count waiting from an outage
    repo.queue()
        .enqueue(ctx.tenant_id, vec![RecordWrite::of(&caps(100)).unwrap()])
        .await;

    store.armed.store(true, Ordering::SeqCst);
    let flush = tokio::spawn({
        let repo = repo.clone();
        async move { repo.flush_queue().await }
    });
    store.entered.notified().await;

    // Mid-replay the queued count is still what reads return
    let visible = outflows.list_materials(&ctx).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].stock_units, 100);

    let edit = tokio::spawn({
        let outflows = outflows.clone();
        let ctx = ctx.clone();
        async move { outflows.upsert_material(&ctx, caps(40)).await }
    });
    tokio::task::yield_now().await;
    store.release.notify_one();

    let report = flush.await.unwrap();
    assert_eq!(report.applied, 1);
    edit.await.unwrap().unwrap();

    let stored = store
        .inner
        .fetch_all(ctx.tenant_id, Entity::AuxiliaryMaterial)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["stock_units"], 40);
    assert!(repo.queue().is_empty().await);
    assert_eq!(outflows.list_materials(&ctx).await.unwrap()[0].stock_units, 40);
}

#[tokio::test]
async fn test_queued_closure_replays_as_one_set() {
    let mill = Mill::new();
    let lot_id = queued_closure(&mill).await;

    let status = mill.repo.queue().status(mill.ctx.tenant_id).await;
    assert_eq!(status.sets, 1);
    assert!(status.pending > 3);
    assert!(mill.hoppers.list_milling_lots(&mill.ctx, true).await.unwrap().is_empty());

    mill.store.fail_writes(None).await;
    let report = mill.repo.flush_queue().await;
    assert_eq!((report.applied, report.requeued), (1, 0));
    assert!(mill.repo.queue().is_empty().await);

    assert_eq!(stored_tank(&mill, 2).await.current_kg, dec("1000"));
    let batches = mill
        .store
        .fetch_all(mill.ctx.tenant_id, Entity::ProductionBatch)
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    let lots = mill.hoppers.list_milling_lots(&mill.ctx, false).await.unwrap();
    let lot = lots.iter().find(|l| l.id == lot_id).unwrap();
    assert_eq!(lot.real_oil_kg, dec("1000"));
}

#[tokio::test]
async fn test_rejected_queued_closure_applies_nothing() {
    let mill = Mill::new();
    let lot_id = queued_closure(&mill).await;

    mill.store
        .fail_writes(Some(StoreError::Rejected("check constraint".to_string())))
        .await;
    let report = mill.repo.flush_queue().await;

    assert_eq!(report.applied, 0);
    assert_eq!(report.rejected.len(), 1);
    let rejected = &report.rejected[0];
    assert_eq!(rejected.tenant_id, mill.ctx.tenant_id);
    assert!(rejected.records.contains(&"production_batch:LP-10/11/25".to_string()));
    assert!(rejected.records.contains(&"tank:2".to_string()));
    assert!(rejected.reason.contains("check constraint"));
    assert!(mill.repo.queue().is_empty().await);

    // None of the closure reached the store
    mill.store.fail_writes(None).await;
    let batches = mill
        .store
        .fetch_all(mill.ctx.tenant_id, Entity::ProductionBatch)
        .await
        .unwrap();
    assert!(batches.is_empty());
    assert!(stored_tank(&mill, 2).await.current_kg.is_zero());

    let open = mill.hoppers.list_milling_lots(&mill.ctx, true).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, lot_id);
    for id in [1, 2] {
        let delivery = mill.intake.get_delivery(&mill.ctx, id).await.unwrap();
        assert_ne!(delivery.status, DeliveryStatus::Milled);
    }
}

#[tokio::test]
async fn test_rejected_direct_write_is_not_queued() {
    let mill = Mill::new();
    mill.store
        .fail_writes(Some(StoreError::Rejected("bad record".to_string())))
        .await;

    let err = mill
        .intake
        .register_delivery(&mill.ctx, milling_delivery("Ana", 3, "1000", "Picual"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::Rejected(_))));
    assert!(mill.repo.queue().is_empty().await);
}

#[tokio::test]
async fn test_enqueue_supersedes_same_record() {
    let queue = SyncQueue::new();
    let tenant = Uuid::new_v4();
    queue.enqueue(tenant, vec![write("CAP-PET", 10)]).await;
    queue.enqueue(tenant, vec![write("CAP-PET", 4), write("LBL-1L", 7)]).await;

    assert_eq!(queue.len().await, 2);
    // The older set lost its only record
    assert_eq!(queue.status(tenant).await.sets, 1);
    let pending = queue.pending_for(tenant, Entity::AuxiliaryMaterial).await;
    let cap = pending.iter().find(|w| w.key == "CAP-PET").unwrap();
    assert_eq!(cap.data["stock_units"], 4);
}

#[tokio::test]
async fn test_successful_write_supersedes_queue() {
    let mill = Mill::new();
    mill.store
        .fail_writes(Some(StoreError::Unavailable("timeout".to_string())))
        .await;
    let _ = mill
        .intake
        .register_delivery(&mill.ctx, milling_delivery("Ana", 3, "1000", "Picual"))
        .await;

    mill.store.fail_writes(None).await;
    let lab = shared::models::LabAnalysis {
        fat_yield_percent: Some(dec("21")),
        acidity_percent: None,
    };
    mill.intake.update_lab(&mill.ctx, 1, lab).await.unwrap();

    assert!(mill.repo.queue().is_empty().await);
    let delivery = mill.intake.get_delivery(&mill.ctx, 1).await.unwrap();
    assert_eq!(delivery.lab.fat_yield_percent, Some(dec("21")));
}

#[tokio::test]
async fn test_queues_are_per_tenant() {
    let queue = SyncQueue::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    queue.enqueue(a, vec![write("CAP-PET", 1)]).await;
    queue.enqueue(b, vec![write("CAP-PET", 2)]).await;

    assert_eq!(queue.len().await, 2);
    assert_eq!(queue.status(a).await.pending, 1);
    assert_eq!(queue.pending_for(b, Entity::AuxiliaryMaterial).await[0].data["stock_units"], 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// However many times records are queued, one write per record remains
    #[test]
    fn prop_queue_dedups_by_record(keys in prop::collection::vec(0u8..5, 1..30)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let queue = SyncQueue::new();
            let tenant = Uuid::new_v4();
            for (i, k) in keys.iter().enumerate() {
                queue.enqueue(tenant, vec![write(&format!("M{}", k), i as i64)]).await;
            }

            let mut distinct = keys.clone();
            distinct.sort();
            distinct.dedup();
            assert_eq!(queue.len().await, distinct.len());

            // The latest value of each record wins
            let pending = queue.pending_for(tenant, Entity::AuxiliaryMaterial).await;
            for k in distinct {
                let last = keys.iter().rposition(|x| *x == k).unwrap() as i64;
                let w = pending.iter().find(|w| w.key == format!("M{}", k)).unwrap();
                assert_eq!(w.data["stock_units"], last);
            }
        });
    }
}
