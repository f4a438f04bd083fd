//! Grouping of pending hopper deliveries into usage batches

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{MillError, MillResult};
use crate::models::{Delivery, DeliveryType};
use crate::yields::{delivery_theoretical_oil, YieldConfig};

/// Deliveries sharing one usage counter of a hopper
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HopperBatch {
    pub hopper_id: u32,
    pub usage_counter: u32,
    pub deliveries: Vec<Delivery>,
    pub net_kg: Decimal,
    pub theoretical_oil_kg: Decimal,
    pub average_yield_percent: Decimal,
    /// Variety of the first delivery
    pub variety: String,
    /// Distinct varieties in delivery order
    pub varieties: Vec<String>,
}

impl HopperBatch {
    pub fn mixed_varieties(&self) -> bool {
        self.varieties.len() > 1
    }
}

/// Hopper state: one active batch and the queue behind it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HopperView {
    pub hopper_id: u32,
    pub active: Option<HopperBatch>,
    pub queued: Vec<HopperBatch>,
}

impl HopperView {
    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }
}

/// Group a hopper's pending, unassigned milling deliveries by usage counter
pub fn group_hopper(hopper_id: u32, deliveries: &[Delivery], config: &YieldConfig) -> HopperView {
    let mut by_counter: BTreeMap<u32, Vec<Delivery>> = BTreeMap::new();
    for delivery in deliveries
        .iter()
        .filter(|d| d.hopper_id == hopper_id && d.is_awaiting_milling())
    {
        by_counter
            .entry(delivery.usage_counter)
            .or_default()
            .push(delivery.clone());
    }

    let mut batches = by_counter
        .into_iter()
        .map(|(usage_counter, members)| build_batch(hopper_id, usage_counter, members, config));

    let active = batches.next();
    HopperView {
        hopper_id,
        active,
        queued: batches.collect(),
    }
}

fn build_batch(
    hopper_id: u32,
    usage_counter: u32,
    deliveries: Vec<Delivery>,
    config: &YieldConfig,
) -> HopperBatch {
    let net_kg: Decimal = deliveries.iter().map(Delivery::net_kg).sum();
    let theoretical_oil_kg: Decimal = deliveries
        .iter()
        .map(|d| delivery_theoretical_oil(d, config))
        .sum();
    let average_yield_percent = if net_kg.is_zero() {
        Decimal::ZERO
    } else {
        theoretical_oil_kg / net_kg * Decimal::from(100)
    };

    let mut varieties: Vec<String> = Vec::new();
    for d in &deliveries {
        if !varieties.iter().any(|v| v.eq_ignore_ascii_case(&d.variety)) {
            varieties.push(d.variety.clone());
        }
    }
    let variety = deliveries
        .first()
        .map(|d| d.variety.clone())
        .unwrap_or_default();

    HopperBatch {
        hopper_id,
        usage_counter,
        deliveries,
        net_kg,
        theoretical_oil_kg,
        average_yield_percent,
        variety,
        varieties,
    }
}

/// Usage counter for a new delivery into a hopper
pub fn next_usage_counter(hopper_id: u32, deliveries: &[Delivery]) -> u32 {
    let active = deliveries
        .iter()
        .filter(|d| d.hopper_id == hopper_id && d.is_awaiting_milling())
        .map(|d| d.usage_counter)
        .min();
    if let Some(counter) = active {
        return counter;
    }

    deliveries
        .iter()
        .filter(|d| d.hopper_id == hopper_id && d.delivery_type == DeliveryType::ForMilling)
        .map(|d| d.usage_counter)
        .max()
        .map_or(1, |max| max + 1)
}

/// Check an incoming delivery's variety against the hopper's active batch
pub fn check_batch_variety(view: &HopperView, incoming_variety: &str) -> MillResult<()> {
    match &view.active {
        Some(batch) if !batch.variety.eq_ignore_ascii_case(incoming_variety.trim()) => {
            Err(MillError::VarietyMismatch {
                target: format!("hopper {}", view.hopper_id),
                current: batch.variety.clone(),
                incoming: incoming_variety.to_string(),
            })
        }
        _ => Ok(()),
    }
}
