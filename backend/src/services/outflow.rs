//! Oil leaving the mill: bottling runs, bulk sales and pomace, plus the
//! packaging materials bottling consumes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::bottling::PendingBottlingOrder;
use shared::documents::{next_document_number, DocumentKind};
use shared::models::{
    low_stock_materials, AuxiliaryMaterial, BottlingFormat, BottlingLot, BulkExit, PomaceExit,
    Tank,
};
use shared::tank_ledger::withdraw;
use shared::types::SessionContext;
use shared::units::kg_to_liters;
use shared::MillError;

use crate::config::MillConfig;
use crate::error::AppResult;
use crate::services::tank::find_tank;
use crate::store::{Repository, WriteSet};

#[derive(Clone)]
pub struct OutflowService {
    repo: Repository,
    mill: MillConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BottlingRequest {
    pub date: NaiveDate,
    pub tank_id: u32,
    pub lines: Vec<BottlingLineRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BottlingLineRequest {
    pub format_id: String,
    pub units: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkExitRequest {
    pub date: NaiveDate,
    pub tank_id: u32,
    pub buyer: String,
    pub kg: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PomaceExitRequest {
    pub date: NaiveDate,
    pub destination: String,
    pub kg: Decimal,
}

impl OutflowService {
    pub fn new(repo: Repository, mill: MillConfig) -> Self {
        Self { repo, mill }
    }

    pub fn formats(&self) -> Vec<BottlingFormat> {
        self.mill.enabled_formats()
    }

    fn build_order(&self, request: &BottlingRequest) -> AppResult<PendingBottlingOrder> {
        let mut order = PendingBottlingOrder::new(request.date, request.tank_id);
        for line in &request.lines {
            let format = self
                .mill
                .bottling_formats
                .iter()
                .find(|f| f.id == line.format_id)
                .ok_or_else(|| MillError::NotFound(format!("Bottling format {}", line.format_id)))?;
            order.add_line(format, line.units)?;
        }
        Ok(order)
    }

    /// Submit a bottling run: oil leaves the tank, materials are consumed and
    /// the bottling lot is created in one write set.
    pub async fn bottle(&self, ctx: &SessionContext, request: BottlingRequest) -> AppResult<BottlingLot> {
        let order = self.build_order(&request)?;

        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let materials: Vec<AuxiliaryMaterial> = self.repo.load(ctx.tenant_id).await?;
        let lots: Vec<BottlingLot> = self.repo.load(ctx.tenant_id).await?;
        let tank = find_tank(&tanks, request.tank_id)?;

        let commit = order.submit(tank, &self.mill.enabled_formats(), &materials, &lots)?;

        let mut writes = WriteSet::new();
        writes
            .put(&commit.lot)?
            .put(&commit.tank)?
            .put(&commit.movement)?
            .put_all(&commit.materials)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        for material in low_stock_materials(&commit.materials, self.mill.low_stock_threshold) {
            tracing::warn!(
                material = %material.name,
                stock_units = material.stock_units,
                "Auxiliary material running low"
            );
        }
        tracing::info!(
            tenant = %ctx.tenant_id,
            lot = %commit.lot.id,
            tank = %commit.tank.name,
            liters = %commit.lot.total_liters,
            kg = %commit.lot.total_kg,
            "Bottling lot created"
        );
        Ok(commit.lot)
    }

    pub async fn bulk_exit(&self, ctx: &SessionContext, request: BulkExitRequest) -> AppResult<BulkExit> {
        if request.buyer.trim().is_empty() {
            return Err(MillError::validation("buyer", "Buyer is required for a bulk sale").into());
        }

        let _guard = self.repo.lock().await;
        let tanks: Vec<Tank> = self.repo.load(ctx.tenant_id).await?;
        let exits: Vec<BulkExit> = self.repo.load(ctx.tenant_id).await?;
        let mut tank = find_tank(&tanks, request.tank_id)?.clone();

        let document_number = next_document_number(
            DocumentKind::BulkExit,
            request.date,
            self.mill.campaign_start_month,
            exits.iter().map(|e| e.document_number.as_str()),
        );
        let movement = withdraw(&mut tank, request.kg, request.date, Some(document_number.clone()))?;
        let exit = BulkExit {
            document_number,
            date: request.date,
            tank_id: tank.id,
            buyer: request.buyer.trim().to_string(),
            kg: request.kg,
            liters: kg_to_liters(request.kg),
        };

        let mut writes = WriteSet::new();
        writes.put(&exit)?.put(&tank)?.put(&movement)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        tracing::info!(
            tenant = %ctx.tenant_id,
            document = %exit.document_number,
            tank = %tank.name,
            kg = %exit.kg,
            "Bulk exit recorded"
        );
        Ok(exit)
    }

    pub async fn pomace_exit(
        &self,
        ctx: &SessionContext,
        request: PomaceExitRequest,
    ) -> AppResult<PomaceExit> {
        if request.kg <= Decimal::ZERO {
            return Err(MillError::validation("kg", "Quantity must be positive").into());
        }
        if request.destination.trim().is_empty() {
            return Err(MillError::validation("destination", "Destination is required").into());
        }

        let _guard = self.repo.lock().await;
        let exits: Vec<PomaceExit> = self.repo.load(ctx.tenant_id).await?;
        let exit = PomaceExit {
            document_number: next_document_number(
                DocumentKind::PomaceExit,
                request.date,
                self.mill.campaign_start_month,
                exits.iter().map(|e| e.document_number.as_str()),
            ),
            date: request.date,
            destination: request.destination.trim().to_string(),
            kg: request.kg,
        };

        let mut writes = WriteSet::new();
        writes.put(&exit)?;
        self.repo.commit(ctx.tenant_id, writes).await?;
        tracing::info!(tenant = %ctx.tenant_id, document = %exit.document_number, kg = %exit.kg, "Pomace exit recorded");
        Ok(exit)
    }

    pub async fn list_bottling_lots(&self, ctx: &SessionContext) -> AppResult<Vec<BottlingLot>> {
        let mut lots: Vec<BottlingLot> = self.repo.load(ctx.tenant_id).await?;
        lots.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(lots)
    }

    pub async fn list_bulk_exits(&self, ctx: &SessionContext) -> AppResult<Vec<BulkExit>> {
        let mut exits: Vec<BulkExit> = self.repo.load(ctx.tenant_id).await?;
        exits.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(exits)
    }

    pub async fn list_pomace_exits(&self, ctx: &SessionContext) -> AppResult<Vec<PomaceExit>> {
        let mut exits: Vec<PomaceExit> = self.repo.load(ctx.tenant_id).await?;
        exits.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(exits)
    }

    pub async fn list_materials(&self, ctx: &SessionContext) -> AppResult<Vec<AuxiliaryMaterial>> {
        let mut materials: Vec<AuxiliaryMaterial> = self.repo.load(ctx.tenant_id).await?;
        materials.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(materials)
    }

    /// Register a material or replace its stock count
    pub async fn upsert_material(
        &self,
        ctx: &SessionContext,
        material: AuxiliaryMaterial,
    ) -> AppResult<AuxiliaryMaterial> {
        if material.id.trim().is_empty() {
            return Err(MillError::validation("id", "Material id is required").into());
        }
        if material.stock_units < 0 {
            return Err(MillError::validation("stock_units", "Stock cannot be negative").into());
        }

        let _guard = self.repo.lock().await;
        let mut writes = WriteSet::new();
        writes.put(&material)?;
        self.repo.commit(ctx.tenant_id, writes).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            material = %material.id,
            category = %material.category,
            stock_units = material.stock_units,
            "Auxiliary material saved"
        );
        Ok(material)
    }

    pub async fn low_stock(&self, ctx: &SessionContext) -> AppResult<Vec<AuxiliaryMaterial>> {
        let materials = self.list_materials(ctx).await?;
        Ok(low_stock_materials(&materials, self.mill.low_stock_threshold)
            .into_iter()
            .cloned()
            .collect())
    }
}
