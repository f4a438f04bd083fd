//! Production batch closure tests
//!
//! Closure of milling lots into production batches, merges and series, and the
//! tank capacity gate on the target tank.

mod common;

use common::{day, dec, Mill};
use olive_mill_backend::error::AppError;
use shared::closure::{ClosureMode, ClosureRequest, SeriesChoice};
use shared::models::{DeliveryStatus, MillingLot};
use shared::types::Confirmations;
use shared::MillError;

fn closure(lot_ids: &[&str], real_oil: &str, tank_id: u32) -> ClosureRequest {
    ClosureRequest {
        production_date: day(10),
        milling_lot_ids: lot_ids.iter().map(|s| s.to_string()).collect(),
        real_oil_kg: dec(real_oil),
        tank_id: Some(tank_id),
        notes: None,
        series_choice: None,
        confirmations: Confirmations::default(),
    }
}

/// Two deliveries (2000 + 3000 kg) milled from hopper 3
async fn first_lot(mill: &Mill) -> MillingLot {
    mill.deliver("Juan Pérez", 3, "2000").await;
    mill.deliver("María López", 3, "3000").await;
    mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap()
}

#[tokio::test]
async fn test_first_closure_of_the_day() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    let lot = first_lot(&mill).await;

    let outcome = mill
        .production
        .close(&mill.ctx, closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();

    assert_eq!(outcome.batch.id, "LP-10/11/25");
    assert_eq!(outcome.plan.mode, ClosureMode::New);
    assert_eq!(outcome.plan.yield_factor, dec("0.2"));
    assert_eq!(outcome.batch.total_olive_kg, dec("5000"));
    assert_eq!(outcome.batch.total_real_oil_kg, dec("1000"));
    assert_eq!(outcome.tank_kg, dec("1000"));

    let allocated: Vec<_> = outcome.plan.lots[0]
        .deliveries
        .iter()
        .map(|d| (d.delivery_id, d.allocated_oil_kg))
        .collect();
    assert_eq!(allocated, vec![(1, dec("400")), (2, dec("600"))]);

    for id in [1, 2] {
        let delivery = mill.intake.get_delivery(&mill.ctx, id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Milled);
    }
    let lots = mill.hoppers.list_milling_lots(&mill.ctx, false).await.unwrap();
    assert_eq!(lots[0].real_oil_kg, dec("1000"));
    assert!(mill.hoppers.list_milling_lots(&mill.ctx, true).await.unwrap().is_empty());

    let tank = mill.tanks.get_tank(&mill.ctx, 2).await.unwrap();
    assert_eq!(tank.batch_label.as_deref(), Some("LP-10/11/25"));
    assert_eq!(tank.variety.as_deref(), Some("Picual"));
}

#[tokio::test]
async fn test_same_day_merge_recomputes_factor() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    let lot = first_lot(&mill).await;
    mill.production
        .close(&mill.ctx, closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();

    mill.deliver("Pedro Ruiz", 3, "2000").await;
    let second = mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap();
    assert_eq!(second.id, "MT3/2-10/11/25");

    let request = closure(&[&second.id], "380", 2);
    let err = mill
        .production
        .close(&mill.ctx, request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::BatchExists { .. })));

    let mut merge = request;
    merge.series_choice = Some(SeriesChoice::Merge);
    let outcome = mill.production.close(&mill.ctx, merge).await.unwrap();

    assert_eq!(outcome.plan.mode, ClosureMode::Merge);
    assert_eq!(outcome.batch.id, "LP-10/11/25");
    assert_eq!(outcome.batch.total_olive_kg, dec("7000"));
    assert_eq!(outcome.batch.total_real_oil_kg, dec("1380"));
    assert_eq!(outcome.plan.yield_factor.round_dp(4), dec("0.1971"));
    assert_eq!(outcome.batch.milling_lot_ids.len(), 2);
    assert_eq!(outcome.tank_kg, dec("1380"));

    // Only the new lot is re-allocated
    let lots = mill.hoppers.list_milling_lots(&mill.ctx, false).await.unwrap();
    let first = lots.iter().find(|l| l.id == lot.id).unwrap();
    let merged = lots.iter().find(|l| l.id == second.id).unwrap();
    assert_eq!(first.real_oil_kg, dec("1000"));
    assert_eq!(merged.real_oil_kg.round_dp(2), dec("394.29"));
}

#[tokio::test]
async fn test_new_series_gets_suffix() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    mill.storage_tank(3, "D.03", "20000").await;
    let lot = first_lot(&mill).await;
    mill.production
        .close(&mill.ctx, closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();

    let identity = mill.production.resolve_identity(&mill.ctx, day(10)).await.unwrap();
    assert_eq!(identity.existing_id.as_deref(), Some("LP-10/11/25"));
    assert_eq!(identity.next_series_id.as_deref(), Some("LP-10/11/25-B"));

    mill.deliver("Pedro Ruiz", 3, "1500").await;
    let second = mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap();
    let mut request = closure(&[&second.id], "300", 3);
    request.series_choice = Some(SeriesChoice::NewSeries);
    let outcome = mill.production.close(&mill.ctx, request).await.unwrap();

    assert_eq!(outcome.batch.id, "LP-10/11/25-B");
    assert_eq!(outcome.batch.total_olive_kg, dec("1500"));
    assert_eq!(outcome.plan.yield_factor, dec("0.2"));

    let batches = mill.production.list_batches(&mill.ctx).await.unwrap();
    assert_eq!(batches.len(), 2);
}

#[tokio::test]
async fn test_capacity_gate_and_override() {
    let mill = Mill::new();
    mill.storage_tank(5, "D.05", "10000").await;
    mill.tanks
        .fill(
            &mill.ctx,
            5,
            olive_mill_backend::services::tank::FillRequest {
                date: day(9),
                kg: dec("9500"),
                variety: "Picual".to_string(),
                batch_label: Some("LP-09/11/25".to_string()),
                reference: None,
                confirmations: Confirmations::default(),
            },
        )
        .await
        .unwrap();

    mill.deliver("Juan Pérez", 1, "3500").await;
    let lot = mill.hoppers.start_milling(&mill.ctx, 1, day(10)).await.unwrap();

    let request = closure(&[&lot.id], "700", 5);
    let err = mill
        .production
        .close(&mill.ctx, request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::CapacityExceeded { .. })));

    // Nothing was written
    let open = mill.hoppers.list_milling_lots(&mill.ctx, true).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(mill.production.list_batches(&mill.ctx).await.unwrap().is_empty());

    let mut confirmed = request;
    confirmed.confirmations.overflow = true;
    let outcome = mill.production.close(&mill.ctx, confirmed).await.unwrap();
    assert_eq!(outcome.tank_kg, dec("10200"));
}

#[tokio::test]
async fn test_closure_validation() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    let lot = first_lot(&mill).await;

    let mut no_tank = closure(&[&lot.id], "1000", 2);
    no_tank.tank_id = None;
    assert!(matches!(
        mill.production.close(&mill.ctx, no_tank).await.unwrap_err(),
        AppError::Mill(MillError::Validation { .. })
    ));

    assert!(matches!(
        mill.production.close(&mill.ctx, closure(&[], "1000", 2)).await.unwrap_err(),
        AppError::Mill(MillError::Validation { .. })
    ));

    assert!(matches!(
        mill.production
            .close(&mill.ctx, closure(&["MT9/9-01/01/25"], "1000", 2))
            .await
            .unwrap_err(),
        AppError::Mill(MillError::NotFound(_))
    ));

    mill.production
        .close(&mill.ctx, closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();
    let mut again = closure(&[&lot.id], "100", 2);
    again.series_choice = Some(SeriesChoice::Merge);
    assert!(matches!(
        mill.production.close(&mill.ctx, again).await.unwrap_err(),
        AppError::Mill(MillError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn test_preview_has_no_side_effects() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    let lot = first_lot(&mill).await;

    let plan = mill
        .production
        .preview(&mill.ctx, &closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();
    assert_eq!(plan.batch_id, "LP-10/11/25");
    assert_eq!(plan.allocated_oil_kg(), dec("1000"));
    assert_eq!(plan.theoretical_oil_kg, dec("1000"));

    assert!(mill.production.list_batches(&mill.ctx).await.unwrap().is_empty());
    assert!(mill.tanks.get_tank(&mill.ctx, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_detail_lists_lots() {
    let mill = Mill::new();
    mill.storage_tank(2, "D.02", "20000").await;
    let lot = first_lot(&mill).await;
    mill.production
        .close(&mill.ctx, closure(&[&lot.id], "1000", 2))
        .await
        .unwrap();

    let detail = mill.production.get_batch(&mill.ctx, "LP-10/11/25").await.unwrap();
    assert_eq!(detail.industrial_yield_percent, dec("20"));
    assert_eq!(detail.lots.len(), 1);
    assert_eq!(detail.lots[0].deliveries.len(), 2);
}
