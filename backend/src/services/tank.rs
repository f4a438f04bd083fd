//! Tank inventory operations

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shared::models::{NurseTransfer, Tank, TankCycle, TankKind, TankMovement, TankStatus};
use shared::tank_ledger::{self, Inflow};
use shared::types::{Confirmations, SessionContext};
use shared::validation::validate_tank;
use shared::MillError;

use crate::error::AppResult;
use crate::store::{Repository, WriteSet};

#[derive(Clone)]
pub struct TankService {
    repo: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTank {
    pub id: u32,
    pub name: String,
    pub kind: TankKind,
    pub capacity_kg: Decimal,
}

/// Oil entering a tank from outside production
#[derive(Debug, Clone, Deserialize)]
pub struct FillRequest {
    pub date: NaiveDate,
    pub kg: Decimal,
    pub variety: String,
    pub batch_label: Option<String>,
    pub reference: Option<String>,
    #[serde(default)]
    pub confirmations: Confirmations,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub target_tank_id: u32,
    pub date: NaiveDate,
    pub kg: Decimal,
    #[serde(default)]
    pub confirmations: Confirmations,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub source: Tank,
    pub target: Tank,
    pub nurse_transfer: Option<NurseTransfer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseRequest {
    pub close_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetRequest {
    pub date: NaiveDate,
}

impl TankService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn list_tanks(&self, ctx: &SessionContext) -> AppResult<Vec<Tank>> {
        let mut tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        tanks.sort_by_key(|t| t.id);
        Ok(tanks)
    }

    pub async fn get_tank(&self, ctx: &SessionContext, id: u32) -> AppResult<Tank> {
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        find_tank(&tanks, id).cloned()
    }

    pub async fn create_tank(&self, ctx: &SessionContext, input: NewTank) -> AppResult<Tank> {
        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;

        let tank = Tank::new(input.id, input.name.trim(), input.kind, input.capacity_kg);
        validate_tank(&tank)?;
        if tanks.iter().any(|t| t.id == tank.id) {
            return Err(MillError::validation("id", format!("Tank {} already exists", tank.id)).into());
        }

        let mut writes = WriteSet::new();
        writes.put(&tank)?;
        self.repo.commit(ctx.tenant_id, writes).await?;
        tracing::info!(tenant = %ctx.tenant_id, tank = %tank.name, kind = ?tank.kind, "Tank registered");
        Ok(tank)
    }

    pub async fn fill(&self, ctx: &SessionContext, id: u32, request: FillRequest) -> AppResult<Tank> {
        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let mut tank = find_tank(&tanks, id)?.clone();

        let movement = tank_ledger::fill(
            &mut tank,
            Inflow {
                kg: request.kg,
                variety: request.variety.trim().to_string(),
                batch_label: request.batch_label,
                date: request.date,
                reference: request.reference,
            },
            request.confirmations,
        )?;

        let mut writes = WriteSet::new();
        writes.put(&tank)?.put(&movement)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        log_overflow(&tank, request.confirmations);
        tracing::info!(tenant = %ctx.tenant_id, tank = %tank.name, kg = %request.kg, "Tank filled");
        Ok(tank)
    }

    /// Trasiego. Moving oil into a nurse tank also records the nurse transfer
    /// bottling lots will reference.
    pub async fn transfer(
        &self,
        ctx: &SessionContext,
        source_id: u32,
        request: TransferRequest,
    ) -> AppResult<TransferOutcome> {
        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let mut source = find_tank(&tanks, source_id)?.clone();
        let mut target = find_tank(&tanks, request.target_tank_id)?.clone();

        let moved = tank_ledger::transfer(
            &mut source,
            &mut target,
            request.kg,
            request.date,
            request.confirmations,
        )?;

        let nurse_transfer = if target.kind == TankKind::Nurse {
            let batch_id = source.batch_label.clone().ok_or_else(|| {
                MillError::validation(
                    "source_tank_id",
                    format!("Tank {} holds no identified batch", source.name),
                )
            })?;
            Some(NurseTransfer {
                id: moved.incoming.id.clone(),
                date: request.date,
                source_tank_id: source.id,
                nurse_tank_id: target.id,
                kg: request.kg,
                batch_id,
            })
        } else {
            None
        };

        let mut writes = WriteSet::new();
        writes
            .put(&source)?
            .put(&target)?
            .put(&moved.outgoing)?
            .put(&moved.incoming)?;
        if let Some(transfer) = &nurse_transfer {
            writes.put(transfer)?;
        }
        self.repo.commit(ctx.tenant_id, writes).await?;

        log_overflow(&target, request.confirmations);
        tracing::info!(
            tenant = %ctx.tenant_id,
            source = %source.name,
            target = %target.name,
            kg = %request.kg,
            nurse = nurse_transfer.is_some(),
            "Trasiego recorded"
        );
        Ok(TransferOutcome {
            source,
            target,
            nurse_transfer,
        })
    }

    pub async fn close(&self, ctx: &SessionContext, id: u32, request: CloseRequest) -> AppResult<Tank> {
        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let movements: Vec<TankMovement> = self.repo.load(ctx.tenant_id).await?;
        let mut tank = find_tank(&tanks, id)?.clone();

        let date = tank_ledger::close(&mut tank, &movements, request.close_date)?;

        let mut writes = WriteSet::new();
        writes.put(&tank)?;
        self.repo.commit(ctx.tenant_id, writes).await?;
        tracing::info!(tenant = %ctx.tenant_id, tank = %tank.name, closed_on = %date, "Tank closed");
        Ok(tank)
    }

    /// Archive the cycle and empty the tank
    pub async fn reset(&self, ctx: &SessionContext, id: u32, request: ResetRequest) -> AppResult<TankCycle> {
        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let mut tank = find_tank(&tanks, id)?.clone();
        let was_full = tank.status == TankStatus::Full;

        let cycle = tank_ledger::reset(&mut tank, request.date)?;

        let mut writes = WriteSet::new();
        writes.put(&tank)?.put(&cycle)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        if was_full && cycle.final_kg > Decimal::ZERO {
            tracing::warn!(
                tank = %tank.name,
                final_kg = %cycle.final_kg,
                "Tank reset with oil still recorded"
            );
        }
        tracing::info!(tenant = %ctx.tenant_id, tank = %tank.name, cycle = cycle.cycle, "Tank reset");
        Ok(cycle)
    }

    /// Movements of a tank, current cycle first
    pub async fn movements(&self, ctx: &SessionContext, id: u32) -> AppResult<Vec<TankMovement>> {
        let movements: Vec<TankMovement> = self.repo.load(ctx.tenant_id).await?;
        let mut movements: Vec<TankMovement> =
            movements.into_iter().filter(|m| m.tank_id == id).collect();
        movements.sort_by(|a, b| b.cycle.cmp(&a.cycle).then_with(|| a.date.cmp(&b.date)));
        Ok(movements)
    }

    pub async fn cycles(&self, ctx: &SessionContext, id: u32) -> AppResult<Vec<TankCycle>> {
        let cycles: Vec<TankCycle> = self.repo.load(ctx.tenant_id).await?;
        let mut cycles: Vec<TankCycle> = cycles.into_iter().filter(|c| c.tank_id == id).collect();
        cycles.sort_by_key(|c| c.cycle);
        Ok(cycles)
    }
}

pub(crate) fn find_tank(tanks: &[Tank], id: u32) -> AppResult<&Tank> {
    tanks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| MillError::NotFound(format!("Tank {}", id)).into())
}

pub(crate) fn log_overflow(tank: &Tank, confirmations: Confirmations) {
    if confirmations.overflow && tank.current_kg > tank.capacity_kg {
        tracing::warn!(
            tank = %tank.name,
            current_kg = %tank.current_kg,
            capacity_kg = %tank.capacity_kg,
            "Tank overflow accepted by operator"
        );
    }
}
