//! Traceability queries and audit export

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use shared::traceability::{
    trace_delivery, trace_milling_lot, trace_tank, DeliveryTrace, LotTrace, TankTrace,
};
use shared::types::SessionContext;

use crate::error::{AppError, AppResult};
use crate::store::Repository;

#[derive(Clone)]
pub struct TraceabilityService {
    repo: Repository,
}

/// One delivery line of a tank's audit document
#[derive(Debug, Clone, Serialize)]
pub struct TankTraceRow {
    pub tank: String,
    pub production_batch: String,
    pub production_date: NaiveDate,
    pub milling_lot: String,
    pub variety: String,
    pub delivery_id: u64,
    pub grower: String,
    pub parcel: String,
    pub net_kg: Decimal,
    pub allocated_oil_kg: Decimal,
    pub share_percent: Decimal,
}

impl TraceabilityService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Forward trace from a delivery to where its oil went
    pub async fn trace_delivery(&self, ctx: &SessionContext, id: u64) -> AppResult<DeliveryTrace> {
        let snapshot = self.repo.snapshot(ctx.tenant_id).await?;
        Ok(trace_delivery(id, snapshot.trace_records())?)
    }

    /// Backward trace from a tank to the growers who supplied it
    pub async fn trace_tank(&self, ctx: &SessionContext, id: u32) -> AppResult<TankTrace> {
        let snapshot = self.repo.snapshot(ctx.tenant_id).await?;
        Ok(trace_tank(id, snapshot.trace_records())?)
    }

    pub async fn trace_milling_lot(&self, ctx: &SessionContext, id: &str) -> AppResult<LotTrace> {
        let snapshot = self.repo.snapshot(ctx.tenant_id).await?;
        Ok(trace_milling_lot(id, snapshot.trace_records())?)
    }

    pub async fn export_tank_trace(&self, ctx: &SessionContext, id: u32) -> AppResult<String> {
        let trace = self.trace_tank(ctx, id).await?;
        Self::export_to_csv(&tank_trace_rows(&trace))
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

pub fn tank_trace_rows(trace: &TankTrace) -> Vec<TankTraceRow> {
    trace
        .batches
        .iter()
        .flat_map(|batch| {
            batch.lots.iter().flat_map(move |lot| {
                lot.deliveries.iter().map(move |line| TankTraceRow {
                    tank: trace.tank_name.clone(),
                    production_batch: batch.id.clone(),
                    production_date: batch.production_date,
                    milling_lot: lot.lot_id.clone(),
                    variety: lot.variety.clone(),
                    delivery_id: line.delivery_id,
                    grower: line.grower.clone(),
                    parcel: line.parcel.clone(),
                    net_kg: line.net_kg,
                    allocated_oil_kg: line.allocated_oil_kg,
                    share_percent: line.share_percent,
                })
            })
        })
        .collect()
}
