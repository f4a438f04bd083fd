//! Hopper views and the "start milling" action

use std::collections::BTreeSet;

use chrono::NaiveDate;

use shared::hopper::{group_hopper, HopperView};
use shared::milling::start_milling;
use shared::models::{Delivery, MillingLot};
use shared::types::SessionContext;
use shared::MillError;

use crate::config::MillConfig;
use crate::error::AppResult;
use crate::store::{Repository, WriteSet};

#[derive(Clone)]
pub struct HopperService {
    repo: Repository,
    mill: MillConfig,
}

impl HopperService {
    pub fn new(repo: Repository, mill: MillConfig) -> Self {
        Self { repo, mill }
    }

    /// Every hopper that has deliveries waiting, by hopper id
    pub async fn list_hoppers(&self, ctx: &SessionContext) -> AppResult<Vec<HopperView>> {
        let deliveries: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;
        let config = self.mill.yield_config();
        let hoppers: BTreeSet<u32> = deliveries
            .iter()
            .filter(|d| d.is_awaiting_milling())
            .map(|d| d.hopper_id)
            .collect();
        Ok(hoppers
            .into_iter()
            .map(|id| group_hopper(id, &deliveries, &config))
            .collect())
    }

    pub async fn get_hopper(&self, ctx: &SessionContext, hopper_id: u32) -> AppResult<HopperView> {
        let deliveries: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;
        Ok(group_hopper(hopper_id, &deliveries, &self.mill.yield_config()))
    }

    /// Turn the hopper's active batch into an open milling lot
    pub async fn start_milling(
        &self,
        ctx: &SessionContext,
        hopper_id: u32,
        date: NaiveDate,
    ) -> AppResult<MillingLot> {
        let _guard = self.repo.lock().await;
        let deliveries: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;
        let lots: Vec<MillingLot> = self.repo.load(ctx.tenant_id).await?;

        let view = group_hopper(hopper_id, &deliveries, &self.mill.yield_config());
        let batch = view.active.ok_or_else(|| {
            MillError::validation("hopper_id", format!("Hopper {} has no pending deliveries", hopper_id))
        })?;

        let allocation = start_milling(&batch, date);
        if lots.iter().any(|l| l.id == allocation.lot.id) {
            return Err(MillError::validation(
                "hopper_id",
                format!("Milling lot {} already exists", allocation.lot.id),
            )
            .into());
        }

        let mut writes = WriteSet::new();
        writes.put(&allocation.lot)?;
        writes.put_all(&allocation.deliveries)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        if batch.mixed_varieties() {
            tracing::warn!(
                lot = %allocation.lot.id,
                varieties = ?batch.varieties,
                "Milling lot started with mixed varieties"
            );
        }
        tracing::info!(
            tenant = %ctx.tenant_id,
            lot = %allocation.lot.id,
            deliveries = allocation.lot.delivery_ids.len(),
            olive_kg = %allocation.lot.olive_kg,
            "Milling started"
        );
        Ok(allocation.lot)
    }

    pub async fn list_milling_lots(
        &self,
        ctx: &SessionContext,
        open_only: bool,
    ) -> AppResult<Vec<MillingLot>> {
        let lots: Vec<MillingLot> = self.repo.load(ctx.tenant_id).await?;
        Ok(lots
            .into_iter()
            .filter(|l| !open_only || l.is_open())
            .collect())
    }
}
