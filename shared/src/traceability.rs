//! Read-side reconstruction of traceability chains
//!
//! Three entry points: a delivery (forward to its final disposition), a tank
//! (backward to batches, lots and growers) and a milling lot (its deliveries
//! under the lot's stored yield factor). Nothing here mutates.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{MillError, MillResult};
use crate::models::{
    BottlingLot, BulkExit, Delivery, DeliveryType, MillingLot, NurseTransfer, OilSource,
    ProductionBatch, Tank, TankMovement, TankStatus,
};
use crate::tank_ledger::label_contains;
use crate::types::DateRange;

/// Snapshot of every record the resolver may follow
#[derive(Debug, Clone, Copy)]
pub struct TraceRecords<'a> {
    pub deliveries: &'a [Delivery],
    pub lots: &'a [MillingLot],
    pub batches: &'a [ProductionBatch],
    pub tanks: &'a [Tank],
    pub movements: &'a [TankMovement],
    pub nurse_transfers: &'a [NurseTransfer],
    pub bottling_lots: &'a [BottlingLot],
    pub bulk_exits: &'a [BulkExit],
}

/// Where oil left a tank
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    Bottled {
        bottling_lot_id: String,
        date: NaiveDate,
        liters: Decimal,
        kg: Decimal,
    },
    NurseTransfer {
        transfer_id: String,
        date: NaiveDate,
        nurse_tank_id: u32,
        kg: Decimal,
    },
    BulkSale {
        document_number: String,
        date: NaiveDate,
        buyer: String,
        kg: Decimal,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryTrace {
    DirectSale {
        delivery_id: u64,
        grower: String,
        buyer: Option<String>,
        entry_date: NaiveDate,
        net_kg: Decimal,
        sale_document: Option<String>,
    },
    Milling(MillingTrace),
}

/// Forward chain of a milled (or milling) delivery
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MillingTrace {
    pub delivery_id: u64,
    pub grower: String,
    pub parcel: String,
    pub variety: String,
    pub net_kg: Decimal,
    pub milling_lot_id: Option<String>,
    pub production_batch_id: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub tank_id: Option<u32>,
    pub tank_name: Option<String>,
    pub allocated_oil_kg: Decimal,
    /// Share of the milling lot's real oil
    pub share_percent: Decimal,
    pub downstream: Vec<Disposition>,
    pub still_in_stock: bool,
}

pub fn trace_delivery(delivery_id: u64, records: TraceRecords<'_>) -> MillResult<DeliveryTrace> {
    let delivery = records
        .deliveries
        .iter()
        .find(|d| d.id == delivery_id)
        .ok_or_else(|| MillError::NotFound(format!("Delivery {}", delivery_id)))?;

    if delivery.delivery_type == DeliveryType::DirectSale {
        return Ok(DeliveryTrace::DirectSale {
            delivery_id: delivery.id,
            grower: delivery.grower.clone(),
            buyer: delivery.buyer.clone(),
            entry_date: delivery.entry_date,
            net_kg: delivery.net_kg(),
            sale_document: delivery.sale_document.clone(),
        });
    }

    let net_kg = delivery.net_kg();
    let mut trace = MillingTrace {
        delivery_id: delivery.id,
        grower: delivery.grower.clone(),
        parcel: delivery.parcel.clone(),
        variety: delivery.variety.clone(),
        net_kg,
        milling_lot_id: None,
        production_batch_id: None,
        production_date: None,
        tank_id: None,
        tank_name: None,
        allocated_oil_kg: Decimal::ZERO,
        share_percent: Decimal::ZERO,
        downstream: Vec::new(),
        still_in_stock: false,
    };

    let Some(lot) = records.lots.iter().find(|l| l.contains(delivery.id)) else {
        return Ok(DeliveryTrace::Milling(trace));
    };
    trace.milling_lot_id = Some(lot.id.clone());
    trace.allocated_oil_kg = net_kg * lot.yield_factor();
    trace.share_percent = percent_of(trace.allocated_oil_kg, lot.real_oil_kg);

    let Some(batch) = records
        .batches
        .iter()
        .find(|b| b.milling_lot_ids.contains(&lot.id))
    else {
        return Ok(DeliveryTrace::Milling(trace));
    };
    trace.production_batch_id = Some(batch.id.clone());
    trace.production_date = Some(batch.production_date);
    trace.tank_id = Some(batch.tank_id);
    trace.tank_name = records
        .tanks
        .iter()
        .find(|t| t.id == batch.tank_id)
        .map(|t| t.name.clone());

    trace.downstream = downstream_of(batch.tank_id, batch.production_date, records);
    trace.still_in_stock = trace.downstream.is_empty();
    Ok(DeliveryTrace::Milling(trace))
}

/// Everything that left a tank on or after a date
fn downstream_of(tank_id: u32, since: NaiveDate, records: TraceRecords<'_>) -> Vec<Disposition> {
    let mut downstream = Vec::new();

    for lot in records.bottling_lots.iter().filter(|b| b.date >= since) {
        if lot.source == (OilSource::Tank { tank_id }) {
            downstream.push(bottled(lot));
        }
    }

    let transfers: Vec<&NurseTransfer> = records
        .nurse_transfers
        .iter()
        .filter(|t| t.source_tank_id == tank_id && t.date >= since)
        .collect();
    let mut seen_batches = BTreeSet::new();
    let mut seen_lots = BTreeSet::new();
    for transfer in &transfers {
        downstream.push(Disposition::NurseTransfer {
            transfer_id: transfer.id.clone(),
            date: transfer.date,
            nurse_tank_id: transfer.nurse_tank_id,
            kg: transfer.kg,
        });
        if !seen_batches.insert(transfer.batch_id.as_str()) {
            continue;
        }
        for lot in records.bottling_lots.iter().filter(|b| b.date >= since) {
            // The nurse tank label blends every batch moved into it
            let from_batch = matches!(
                &lot.source,
                OilSource::NurseTransfer { batch_id } if shares_batch(batch_id, &transfer.batch_id)
            );
            if from_batch && seen_lots.insert(lot.id.as_str()) {
                downstream.push(bottled(lot));
            }
        }
    }

    for exit in records
        .bulk_exits
        .iter()
        .filter(|e| e.tank_id == tank_id && e.date >= since)
    {
        downstream.push(Disposition::BulkSale {
            document_number: exit.document_number.clone(),
            date: exit.date,
            buyer: exit.buyer.clone(),
            kg: exit.kg,
        });
    }

    downstream
}

fn shares_batch(bottled_label: &str, transfer_label: &str) -> bool {
    transfer_label
        .split(" + ")
        .any(|batch| label_contains(bottled_label, batch))
}

fn bottled(lot: &BottlingLot) -> Disposition {
    Disposition::Bottled {
        bottling_lot_id: lot.id.clone(),
        date: lot.date,
        liters: lot.total_liters,
        kg: lot.total_kg,
    }
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::from(100)
    }
}

/// Backward chain of a tank
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TankTrace {
    pub tank_id: u32,
    pub tank_name: String,
    pub status: TankStatus,
    pub current_kg: Decimal,
    pub variety: Option<String>,
    pub batch_label: Option<String>,
    pub batches: Vec<BatchSummary>,
    pub delivery_count: usize,
    pub growers: Vec<String>,
    /// Earliest and latest movement dates
    pub period: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchSummary {
    pub id: String,
    pub production_date: NaiveDate,
    pub total_olive_kg: Decimal,
    pub total_real_oil_kg: Decimal,
    pub industrial_yield_percent: Decimal,
    pub lots: Vec<LotTrace>,
}

pub fn trace_tank(tank_id: u32, records: TraceRecords<'_>) -> MillResult<TankTrace> {
    let tank = records
        .tanks
        .iter()
        .find(|t| t.id == tank_id)
        .ok_or_else(|| MillError::NotFound(format!("Tank {}", tank_id)))?;

    let mut batches: Vec<BatchSummary> = Vec::new();
    for batch in records.batches.iter().filter(|b| b.tank_id == tank_id) {
        let lots = batch
            .milling_lot_ids
            .iter()
            .filter_map(|id| records.lots.iter().find(|l| &l.id == id))
            .map(|lot| lot_trace(lot, records.deliveries))
            .collect();
        batches.push(BatchSummary {
            id: batch.id.clone(),
            production_date: batch.production_date,
            total_olive_kg: batch.total_olive_kg,
            total_real_oil_kg: batch.total_real_oil_kg,
            industrial_yield_percent: batch.industrial_yield_percent(),
            lots,
        });
    }
    batches.sort_by(|a, b| a.production_date.cmp(&b.production_date).then(a.id.cmp(&b.id)));

    let lines = batches
        .iter()
        .flat_map(|b| b.lots.iter())
        .flat_map(|l| l.deliveries.iter());
    let mut delivery_count = 0;
    let mut growers = BTreeSet::new();
    for line in lines {
        delivery_count += 1;
        growers.insert(line.grower.clone());
    }

    let dates = records
        .movements
        .iter()
        .filter(|m| m.tank_id == tank_id)
        .map(|m| m.date);
    let period = dates
        .clone()
        .min()
        .zip(dates.max())
        .map(|(start, end)| DateRange { start, end });

    Ok(TankTrace {
        tank_id,
        tank_name: tank.name.clone(),
        status: tank.status,
        current_kg: tank.current_kg,
        variety: tank.variety.clone(),
        batch_label: tank.batch_label.clone(),
        batches,
        delivery_count,
        growers: growers.into_iter().collect(),
        period,
    })
}

/// A milling lot with its deliveries valued at the stored yield factor
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LotTrace {
    pub lot_id: String,
    pub created_on: NaiveDate,
    pub hopper_id: u32,
    pub variety: String,
    pub is_open: bool,
    pub olive_kg: Decimal,
    pub theoretical_oil_kg: Decimal,
    pub real_oil_kg: Decimal,
    pub industrial_yield_percent: Decimal,
    /// Real minus theoretical; zero while the lot is open
    pub deviation_kg: Decimal,
    pub deliveries: Vec<LotDeliveryLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LotDeliveryLine {
    pub delivery_id: u64,
    pub grower: String,
    pub parcel: String,
    pub net_kg: Decimal,
    pub allocated_oil_kg: Decimal,
    pub share_percent: Decimal,
}

pub fn trace_milling_lot(lot_id: &str, records: TraceRecords<'_>) -> MillResult<LotTrace> {
    records
        .lots
        .iter()
        .find(|l| l.id == lot_id)
        .map(|lot| lot_trace(lot, records.deliveries))
        .ok_or_else(|| MillError::NotFound(format!("Milling lot {}", lot_id)))
}

fn lot_trace(lot: &MillingLot, deliveries: &[Delivery]) -> LotTrace {
    let factor = lot.yield_factor();
    let lines = lot
        .delivery_ids
        .iter()
        .filter_map(|id| deliveries.iter().find(|d| d.id == *id))
        .map(|d| {
            let allocated_oil_kg = d.net_kg() * factor;
            LotDeliveryLine {
                delivery_id: d.id,
                grower: d.grower.clone(),
                parcel: d.parcel.clone(),
                net_kg: d.net_kg(),
                allocated_oil_kg,
                share_percent: percent_of(allocated_oil_kg, lot.real_oil_kg),
            }
        })
        .collect();

    LotTrace {
        lot_id: lot.id.clone(),
        created_on: lot.created_on,
        hopper_id: lot.hopper_id,
        variety: lot.variety.clone(),
        is_open: lot.is_open(),
        olive_kg: lot.olive_kg,
        theoretical_oil_kg: lot.theoretical_oil_kg,
        real_oil_kg: lot.real_oil_kg,
        industrial_yield_percent: factor * Decimal::from(100),
        deviation_kg: if lot.is_open() {
            Decimal::ZERO
        } else {
            lot.real_oil_kg - lot.theoretical_oil_kg
        },
        deliveries: lines,
    }
}
