//! Conversion of a hopper's active batch into an open milling lot

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::hopper::HopperBatch;
use crate::models::{generate_milling_lot_id, Delivery, MillingLot};

/// Open milling lot plus the deliveries stamped with its id
#[derive(Debug, Clone, Serialize)]
pub struct MillingAllocation {
    pub lot: MillingLot,
    pub deliveries: Vec<Delivery>,
}

/// Start milling a hopper batch.
///
/// Deliveries keep their `Pending` status; they only become `Milled` when the
/// lot is closed into a production batch.
pub fn start_milling(batch: &HopperBatch, date: NaiveDate) -> MillingAllocation {
    let id = generate_milling_lot_id(batch.hopper_id, batch.usage_counter, date);

    let lot = MillingLot {
        id: id.clone(),
        created_on: date,
        hopper_id: batch.hopper_id,
        usage_counter: batch.usage_counter,
        olive_kg: batch.net_kg,
        theoretical_oil_kg: batch.theoretical_oil_kg,
        real_oil_kg: Decimal::ZERO,
        variety: batch.variety.clone(),
        delivery_ids: batch.deliveries.iter().map(|d| d.id).collect(),
    };

    let deliveries = batch
        .deliveries
        .iter()
        .cloned()
        .map(|mut d| {
            d.milling_lot_id = Some(id.clone());
            d
        })
        .collect();

    MillingAllocation { lot, deliveries }
}
