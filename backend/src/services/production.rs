//! Production batch closure against the persisted state

use chrono::NaiveDate;
use serde::Serialize;

use shared::closure::{
    commit_closure, plan_closure, resolve_identity, ClosurePlan, ClosureRequest, ClosureState,
    IdentityResolution,
};
use shared::models::{Delivery, MillingLot, ProductionBatch, Tank};
use shared::traceability::{trace_milling_lot, LotTrace};
use shared::types::SessionContext;
use shared::MillError;

use crate::config::MillConfig;
use crate::error::AppResult;
use crate::services::tank::log_overflow;
use crate::store::{Repository, WriteSet};

#[derive(Clone)]
pub struct ProductionService {
    repo: Repository,
    mill: MillConfig,
}

/// A committed closure
#[derive(Debug, Clone, Serialize)]
pub struct ClosureOutcome {
    pub batch: ProductionBatch,
    pub plan: ClosurePlan,
    pub tank_kg: rust_decimal::Decimal,
}

/// Production batch with its lots for the detail view
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetail {
    pub batch: ProductionBatch,
    pub industrial_yield_percent: rust_decimal::Decimal,
    pub lots: Vec<LotTrace>,
}

struct Loaded {
    lots: Vec<MillingLot>,
    deliveries: Vec<Delivery>,
    batches: Vec<ProductionBatch>,
    tanks: Vec<Tank>,
}

impl ProductionService {
    pub fn new(repo: Repository, mill: MillConfig) -> Self {
        Self { repo, mill }
    }

    async fn load(&self, ctx: &SessionContext) -> AppResult<Loaded> {
        Ok(Loaded {
            lots: self.repo.load(ctx.tenant_id).await?,
            deliveries: self.repo.load(ctx.tenant_id).await?,
            batches: self.repo.load(ctx.tenant_id).await?,
            tanks: self.repo.load(ctx.tenant_id).await?,
        })
    }

    /// Date collision check; has no side effects
    pub async fn resolve_identity(
        &self,
        ctx: &SessionContext,
        date: NaiveDate,
    ) -> AppResult<IdentityResolution> {
        let batches: Vec<ProductionBatch> = self.repo.load(ctx.tenant_id).await?;
        Ok(resolve_identity(date, &batches))
    }

    /// Compute the closure without validating the tank or writing anything
    pub async fn preview(
        &self,
        ctx: &SessionContext,
        request: &ClosureRequest,
    ) -> AppResult<ClosurePlan> {
        let loaded = self.load(ctx).await?;
        let config = self.mill.yield_config();
        let state = ClosureState {
            lots: &loaded.lots,
            deliveries: &loaded.deliveries,
            batches: &loaded.batches,
            tanks: &loaded.tanks,
            config: &config,
        };
        Ok(plan_closure(request, state)?)
    }

    /// Close the selected milling lots into a production batch.
    ///
    /// Lots, deliveries, the batch, the tank and its movement are written as
    /// one write set.
    pub async fn close(
        &self,
        ctx: &SessionContext,
        request: ClosureRequest,
    ) -> AppResult<ClosureOutcome> {
        let _guard = self.repo.lock().await;
        let loaded = self.load(ctx).await?;
        let config = self.mill.yield_config();
        let state = ClosureState {
            lots: &loaded.lots,
            deliveries: &loaded.deliveries,
            batches: &loaded.batches,
            tanks: &loaded.tanks,
            config: &config,
        };

        let plan = plan_closure(&request, state)?;
        let commit = commit_closure(&plan, &request, state)?;

        let mut writes = WriteSet::new();
        writes
            .put_all(&commit.lots)?
            .put_all(&commit.deliveries)?
            .put(&commit.batch)?
            .put(&commit.tank)?
            .put(&commit.movement)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        log_overflow(&commit.tank, request.confirmations);
        tracing::info!(
            tenant = %ctx.tenant_id,
            batch = %commit.batch.id,
            mode = ?plan.mode,
            lots = commit.lots.len(),
            real_oil_kg = %request.real_oil_kg,
            yield_factor = %plan.yield_factor.round_dp(4),
            tank = %commit.tank.name,
            "Production batch closed"
        );

        Ok(ClosureOutcome {
            tank_kg: commit.tank.current_kg,
            batch: commit.batch,
            plan,
        })
    }

    pub async fn list_batches(&self, ctx: &SessionContext) -> AppResult<Vec<ProductionBatch>> {
        let mut batches: Vec<ProductionBatch> = self.repo.load(ctx.tenant_id).await?;
        batches.sort_by(|a, b| {
            b.production_date
                .cmp(&a.production_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(batches)
    }

    pub async fn get_batch(&self, ctx: &SessionContext, id: &str) -> AppResult<BatchDetail> {
        let snapshot = self.repo.snapshot(ctx.tenant_id).await?;
        let batch = snapshot
            .batches
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| MillError::NotFound(format!("Production batch {}", id)))?;

        let lots = batch
            .milling_lot_ids
            .iter()
            .map(|lot_id| trace_milling_lot(lot_id, snapshot.trace_records()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchDetail {
            industrial_yield_percent: batch.industrial_yield_percent(),
            batch,
            lots,
        })
    }
}
