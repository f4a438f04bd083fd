//! Production batch closure
//!
//! Closing converts a set of open milling lots and the real oil measured at the
//! vat into a production batch. The industrial yield factor is computed from
//! the combined olive and oil mass of the batch, and every delivery receives
//! `net_kg x factor` regardless of its own lab analysis.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MillError, MillResult};
use crate::models::{
    production_batch_base_id, series_batch_id, Delivery, DeliveryStatus, MillingLot,
    MovementKind, ProductionBatch, Tank, TankMovement,
};
use crate::tank_ledger::{apply_fill, check_fill, Inflow};
use crate::types::Confirmations;
use crate::yields::{resolve_delivery_yield, theoretical_oil, ResolvedYield, YieldConfig};

/// Operator's answer when a batch already exists for the date
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesChoice {
    Merge,
    NewSeries,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClosureMode {
    New,
    Merge,
    NewSeries,
}

/// Outcome of the date-collision check
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdentityResolution {
    pub base_id: String,
    pub existing_id: Option<String>,
    /// First free `-B`, `-C`, ... id, offered when the base id is taken
    pub next_series_id: Option<String>,
}

/// Look up the batch ids available for a production date
pub fn resolve_identity(date: NaiveDate, batches: &[ProductionBatch]) -> IdentityResolution {
    let base_id = production_batch_base_id(date);
    let taken = |id: &str| batches.iter().any(|b| b.id == id);

    if !taken(&base_id) {
        return IdentityResolution {
            base_id,
            existing_id: None,
            next_series_id: None,
        };
    }

    let next_series_id = (0..)
        .map(|index| series_batch_id(&base_id, index))
        .find(|candidate| !taken(candidate));

    IdentityResolution {
        existing_id: Some(base_id.clone()),
        base_id,
        next_series_id,
    }
}

impl IdentityResolution {
    /// Pick mode and final id; an existing batch needs an explicit choice
    pub fn choose(&self, choice: Option<SeriesChoice>) -> MillResult<(ClosureMode, String)> {
        match (&self.existing_id, choice) {
            (None, _) => Ok((ClosureMode::New, self.base_id.clone())),
            (Some(existing), None) => Err(MillError::BatchExists {
                existing_id: existing.clone(),
            }),
            (Some(existing), Some(SeriesChoice::Merge)) => {
                Ok((ClosureMode::Merge, existing.clone()))
            }
            (Some(_), Some(SeriesChoice::NewSeries)) => {
                let id = self
                    .next_series_id
                    .clone()
                    .ok_or_else(|| MillError::validation("production_date", "No free series id"))?;
                Ok((ClosureMode::NewSeries, id))
            }
        }
    }
}

/// Operator input for a closure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureRequest {
    pub production_date: NaiveDate,
    pub milling_lot_ids: Vec<String>,
    pub real_oil_kg: Decimal,
    pub tank_id: Option<u32>,
    pub notes: Option<String>,
    pub series_choice: Option<SeriesChoice>,
    #[serde(default)]
    pub confirmations: Confirmations,
}

/// Current records the closure reads
#[derive(Debug, Clone, Copy)]
pub struct ClosureState<'a> {
    pub lots: &'a [MillingLot],
    pub deliveries: &'a [Delivery],
    pub batches: &'a [ProductionBatch],
    pub tanks: &'a [Tank],
    pub config: &'a YieldConfig,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryAllocation {
    pub delivery_id: u64,
    pub grower: String,
    pub parcel: String,
    pub net_kg: Decimal,
    pub resolved_yield: ResolvedYield,
    pub theoretical_oil_kg: Decimal,
    pub allocated_oil_kg: Decimal,
    /// Allocated minus theoretical, negative when the vat under-performed
    pub deviation_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LotAllocation {
    pub lot_id: String,
    pub variety: String,
    pub olive_kg: Decimal,
    pub theoretical_oil_kg: Decimal,
    pub allocated_oil_kg: Decimal,
    pub deliveries: Vec<DeliveryAllocation>,
}

/// Computed closure, ready to validate and commit
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClosurePlan {
    pub mode: ClosureMode,
    pub batch_id: String,
    pub tank_id: u32,
    pub prior_olive_kg: Decimal,
    pub prior_oil_kg: Decimal,
    pub combined_olive_kg: Decimal,
    pub combined_oil_kg: Decimal,
    pub yield_factor: Decimal,
    pub industrial_yield_percent: Decimal,
    /// Theoretical oil of the newly selected lots only
    pub theoretical_oil_kg: Decimal,
    pub lots: Vec<LotAllocation>,
}

impl ClosurePlan {
    pub fn selected_olive_kg(&self) -> Decimal {
        self.lots.iter().map(|l| l.olive_kg).sum()
    }

    pub fn allocated_oil_kg(&self) -> Decimal {
        self.lots
            .iter()
            .flat_map(|l| l.deliveries.iter())
            .map(|d| d.allocated_oil_kg)
            .sum()
    }

    /// Lot varieties joined the way tank labels are blended
    pub fn variety(&self) -> String {
        let mut varieties: Vec<&str> = Vec::new();
        for lot in &self.lots {
            if !varieties.iter().any(|v| v.eq_ignore_ascii_case(&lot.variety)) {
                varieties.push(&lot.variety);
            }
        }
        varieties.join(" + ")
    }
}

/// Resolve identity, recompute theoretical figures and allocate real oil.
///
/// Fails only on malformed selections or an unresolved date collision.
pub fn plan_closure(request: &ClosureRequest, state: ClosureState<'_>) -> MillResult<ClosurePlan> {
    let tank_id = request
        .tank_id
        .ok_or_else(|| MillError::validation("tank_id", "A target tank must be selected"))?;
    if request.milling_lot_ids.is_empty() {
        return Err(MillError::validation(
            "milling_lot_ids",
            "At least one milling lot must be selected",
        ));
    }
    if request.real_oil_kg <= Decimal::ZERO {
        return Err(MillError::validation(
            "real_oil_kg",
            "Real oil quantity must be positive",
        ));
    }

    let mut selected: Vec<&MillingLot> = Vec::with_capacity(request.milling_lot_ids.len());
    for id in &request.milling_lot_ids {
        let lot = state
            .lots
            .iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| MillError::NotFound(format!("Milling lot {}", id)))?;
        if !lot.is_open() {
            return Err(MillError::InvalidTransition(format!(
                "Milling lot {} is already closed",
                lot.id
            )));
        }
        if selected.iter().any(|s| s.id == lot.id) {
            return Err(MillError::validation(
                "milling_lot_ids",
                format!("Milling lot {} selected twice", lot.id),
            ));
        }
        selected.push(lot);
    }

    let identity = resolve_identity(request.production_date, state.batches);
    let (mode, batch_id) = identity.choose(request.series_choice)?;

    let (prior_olive_kg, prior_oil_kg) = match mode {
        ClosureMode::Merge => state
            .batches
            .iter()
            .find(|b| b.id == batch_id)
            .map(|b| (b.total_olive_kg, b.total_real_oil_kg))
            .unwrap_or_default(),
        ClosureMode::New | ClosureMode::NewSeries => (Decimal::ZERO, Decimal::ZERO),
    };

    let selected_olive_kg: Decimal = selected.iter().map(|l| l.olive_kg).sum();
    let combined_olive_kg = prior_olive_kg + selected_olive_kg;
    let combined_oil_kg = prior_oil_kg + request.real_oil_kg;
    let yield_factor = if combined_olive_kg.is_zero() {
        Decimal::ZERO
    } else {
        combined_oil_kg / combined_olive_kg
    };

    let lots: Vec<LotAllocation> = selected
        .iter()
        .map(|lot| allocate_lot(lot, state.deliveries, state.config, yield_factor))
        .collect();
    let theoretical_oil_kg = lots.iter().map(|l| l.theoretical_oil_kg).sum();

    Ok(ClosurePlan {
        mode,
        batch_id,
        tank_id,
        prior_olive_kg,
        prior_oil_kg,
        combined_olive_kg,
        combined_oil_kg,
        yield_factor,
        industrial_yield_percent: yield_factor * Decimal::from(100),
        theoretical_oil_kg,
        lots,
    })
}

fn allocate_lot(
    lot: &MillingLot,
    deliveries: &[Delivery],
    config: &YieldConfig,
    yield_factor: Decimal,
) -> LotAllocation {
    let allocations: Vec<DeliveryAllocation> = lot
        .delivery_ids
        .iter()
        .filter_map(|id| deliveries.iter().find(|d| d.id == *id))
        .map(|d| {
            let resolved_yield = resolve_delivery_yield(d, config);
            let net_kg = d.net_kg();
            let theoretical_oil_kg = theoretical_oil(net_kg, resolved_yield.percent);
            let allocated_oil_kg = net_kg * yield_factor;
            DeliveryAllocation {
                delivery_id: d.id,
                grower: d.grower.clone(),
                parcel: d.parcel.clone(),
                net_kg,
                resolved_yield,
                theoretical_oil_kg,
                allocated_oil_kg,
                deviation_kg: allocated_oil_kg - theoretical_oil_kg,
            }
        })
        .collect();

    LotAllocation {
        lot_id: lot.id.clone(),
        variety: lot.variety.clone(),
        olive_kg: lot.olive_kg,
        theoretical_oil_kg: allocations.iter().map(|a| a.theoretical_oil_kg).sum(),
        allocated_oil_kg: lot.olive_kg * yield_factor,
        deliveries: allocations,
    }
}

/// Records to write for a closure; applied together or not at all
#[derive(Debug, Clone, Serialize)]
pub struct ClosureCommit {
    pub batch: ProductionBatch,
    pub lots: Vec<MillingLot>,
    pub deliveries: Vec<Delivery>,
    pub tank: Tank,
    pub movement: TankMovement,
}

/// Validate the plan against the target tank and build the records to write
pub fn commit_closure(
    plan: &ClosurePlan,
    request: &ClosureRequest,
    state: ClosureState<'_>,
) -> MillResult<ClosureCommit> {
    let mut tank = state
        .tanks
        .iter()
        .find(|t| t.id == plan.tank_id)
        .cloned()
        .ok_or_else(|| MillError::NotFound(format!("Tank {}", plan.tank_id)))?;

    let existing = state.batches.iter().find(|b| b.id == plan.batch_id);
    let self_merge = match (plan.mode, existing) {
        (ClosureMode::Merge, Some(batch)) if batch.tank_id != tank.id => {
            return Err(MillError::validation(
                "tank_id",
                format!(
                    "Batch {} is stored in tank {}; merged oil must go to the same tank",
                    batch.id, batch.tank_id
                ),
            ));
        }
        (ClosureMode::Merge, Some(_)) => true,
        _ => false,
    };

    if plan.yield_factor.is_zero() {
        return Err(MillError::validation(
            "milling_lot_ids",
            "Selected milling lots carry no olive mass",
        ));
    }

    let variety = plan.variety();
    check_fill(
        &tank,
        request.real_oil_kg,
        &variety,
        request.confirmations,
        self_merge,
    )?;

    let mut lots = Vec::with_capacity(plan.lots.len());
    let mut deliveries = Vec::new();
    for allocation in &plan.lots {
        let mut lot = state
            .lots
            .iter()
            .find(|l| l.id == allocation.lot_id)
            .cloned()
            .ok_or_else(|| MillError::NotFound(format!("Milling lot {}", allocation.lot_id)))?;
        lot.real_oil_kg = allocation.allocated_oil_kg;
        lot.theoretical_oil_kg = allocation.theoretical_oil_kg;

        for id in &lot.delivery_ids {
            if let Some(delivery) = state.deliveries.iter().find(|d| d.id == *id) {
                let mut delivery = delivery.clone();
                delivery.status = DeliveryStatus::Milled;
                delivery.milling_lot_id = Some(lot.id.clone());
                deliveries.push(delivery);
            }
        }
        lots.push(lot);
    }

    let lot_ids: Vec<String> = lots.iter().map(|l| l.id.clone()).collect();
    let batch = match existing.filter(|_| plan.mode == ClosureMode::Merge) {
        Some(batch) => {
            let mut merged = batch.clone();
            merged.milling_lot_ids.extend(lot_ids);
            merged.total_olive_kg = plan.combined_olive_kg;
            merged.total_real_oil_kg = plan.combined_oil_kg;
            merged.notes = merge_notes(merged.notes.take(), request.notes.clone());
            merged
        }
        None => ProductionBatch {
            id: plan.batch_id.clone(),
            production_date: request.production_date,
            milling_lot_ids: lot_ids,
            total_olive_kg: plan.combined_olive_kg,
            total_real_oil_kg: plan.combined_oil_kg,
            tank_id: tank.id,
            notes: request.notes.clone(),
        },
    };

    let movement = apply_fill(
        &mut tank,
        Inflow {
            kg: request.real_oil_kg,
            variety,
            batch_label: None,
            date: request.production_date,
            reference: Some(batch.id.clone()),
        },
        MovementKind::Fill,
    );
    tank.batch_label = Some(batch.id.clone());

    Ok(ClosureCommit {
        batch,
        lots,
        deliveries,
        tank,
        movement,
    })
}

fn merge_notes(existing: Option<String>, added: Option<String>) -> Option<String> {
    match (existing, added.filter(|n| !n.trim().is_empty())) {
        (Some(a), Some(b)) => Some(format!("{}\n{}", a, b)),
        (a, b) => a.or(b),
    }
}
