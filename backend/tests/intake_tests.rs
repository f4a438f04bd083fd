//! Intake tests
//!
//! Delivery registration, hopper usage batches and milling start

mod common;

use common::{day, dec, milling_delivery, Mill};
use olive_mill_backend::error::AppError;
use shared::models::{DeliveryStatus, DeliveryType, LabAnalysis};
use shared::yields::delivery_theoretical_oil;
use shared::MillError;

#[tokio::test]
async fn test_delivery_net_weight_and_theoretical_oil() {
    let mill = Mill::new();
    let mut input = milling_delivery("Juan Pérez", 3, "1000", "Picual");
    input.impurity_kg = dec("20");

    let delivery = mill.intake.register_delivery(&mill.ctx, input).await.unwrap();

    assert_eq!(delivery.id, 1);
    assert_eq!(delivery.net_kg(), dec("980"));
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert_eq!(delivery.usage_counter, 1);
    let config = common::mill_config().yield_config();
    assert_eq!(delivery_theoretical_oil(&delivery, &config), dec("196"));
}

#[tokio::test]
async fn test_ids_are_sequential() {
    let mill = Mill::new();
    let first = mill.deliver("Ana", 1, "500").await;
    let second = mill.deliver("Luis", 1, "700").await;
    assert_eq!((first, second), (1, 2));
}

#[tokio::test]
async fn test_direct_sale_gets_document_and_skips_hopper() {
    let mill = Mill::new();
    let mut input = milling_delivery("Ana", 4, "1200", "Hojiblanca");
    input.delivery_type = DeliveryType::DirectSale;
    input.buyer = Some("Aceites del Sur".to_string());

    let delivery = mill.intake.register_delivery(&mill.ctx, input).await.unwrap();

    assert_eq!(delivery.status, DeliveryStatus::SoldDirect);
    assert_eq!(delivery.hopper_id, 0);
    assert_eq!(delivery.sale_document.as_deref(), Some("VD001/25/26"));
    assert!(mill.hoppers.list_hoppers(&mill.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_direct_sale_requires_buyer() {
    let mill = Mill::new();
    let mut input = milling_delivery("Ana", 4, "1200", "Hojiblanca");
    input.delivery_type = DeliveryType::DirectSale;

    let err = mill.intake.register_delivery(&mill.ctx, input).await.unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::Validation { ref field, .. }) if field == "buyer"));
}

#[tokio::test]
async fn test_variety_mismatch_needs_confirmation() {
    let mill = Mill::new();
    mill.deliver("Ana", 2, "800").await;

    let input = milling_delivery("Luis", 2, "600", "Arbequina");
    let err = mill
        .intake
        .register_delivery(&mill.ctx, input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::VarietyMismatch { .. })));

    let mut confirmed = input;
    confirmed.confirmations.mixing = true;
    let delivery = mill.intake.register_delivery(&mill.ctx, confirmed).await.unwrap();
    assert_eq!(delivery.usage_counter, 1);

    let view = mill.hoppers.get_hopper(&mill.ctx, 2).await.unwrap();
    assert!(view.active.unwrap().mixed_varieties());
}

#[tokio::test]
async fn test_hopper_queues_next_usage_after_milling_starts() {
    let mill = Mill::new();
    mill.deliver("Ana", 3, "1000").await;
    mill.deliver("Luis", 3, "2000").await;
    mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap();

    mill.deliver("Marta", 3, "1500").await;
    let delivery = mill.intake.get_delivery(&mill.ctx, 3).await.unwrap();
    assert_eq!(delivery.usage_counter, 2);

    let view = mill.hoppers.get_hopper(&mill.ctx, 3).await.unwrap();
    let active = view.active.unwrap();
    assert_eq!(active.usage_counter, 2);
    assert_eq!(active.net_kg, dec("1500"));
}

#[tokio::test]
async fn test_start_milling_creates_lot() {
    let mill = Mill::new();
    mill.deliver("Ana", 3, "1000").await;
    mill.deliver("Luis", 3, "2000").await;

    let lot = mill.hoppers.start_milling(&mill.ctx, 3, day(10)).await.unwrap();

    assert_eq!(lot.id, "MT3/1-10/11/25");
    assert_eq!(lot.olive_kg, dec("3000"));
    assert_eq!(lot.theoretical_oil_kg, dec("600"));
    assert!(lot.is_open());
    assert_eq!(lot.delivery_ids, vec![1, 2]);

    let delivery = mill.intake.get_delivery(&mill.ctx, 1).await.unwrap();
    assert_eq!(delivery.milling_lot_id.as_deref(), Some("MT3/1-10/11/25"));
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert!(mill.hoppers.get_hopper(&mill.ctx, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_milling_on_empty_hopper_rejected() {
    let mill = Mill::new();
    let err = mill.hoppers.start_milling(&mill.ctx, 7, day(10)).await.unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::Validation { .. })));
}

#[tokio::test]
async fn test_lab_update_only_while_pending() {
    let mill = Mill::new();
    mill.deliver("Ana", 3, "1000").await;

    let lab = LabAnalysis {
        fat_yield_percent: Some(dec("22.5")),
        acidity_percent: Some(dec("0.3")),
    };
    let updated = mill.intake.update_lab(&mill.ctx, 1, lab.clone()).await.unwrap();
    assert_eq!(updated.lab, lab);

    let invalid = LabAnalysis {
        fat_yield_percent: Some(dec("120")),
        acidity_percent: None,
    };
    assert!(mill.intake.update_lab(&mill.ctx, 1, invalid).await.is_err());

    let err = mill.intake.update_lab(&mill.ctx, 99, lab).await.unwrap_err();
    assert!(matches!(err, AppError::Mill(MillError::NotFound(_))));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let mill = Mill::new();
    mill.deliver("Ana", 3, "1000").await;

    let other = shared::types::SessionContext::new(uuid::Uuid::new_v4());
    assert!(mill.intake.list_deliveries(&other).await.unwrap().is_empty());
    assert_eq!(mill.intake.list_deliveries(&mill.ctx).await.unwrap().len(), 1);
}
