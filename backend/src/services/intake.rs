//! Olive intake: registering deliveries ("vales") at the weighbridge

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::documents::{next_document_number, DocumentKind};
use shared::hopper::{check_batch_variety, group_hopper, next_usage_counter};
use shared::models::{Delivery, DeliveryStatus, DeliveryType, LabAnalysis};
use shared::types::{Confirmations, SessionContext};
use shared::validation::validate_delivery;
use shared::MillError;

use crate::config::MillConfig;
use crate::error::AppResult;
use crate::store::{Repository, WriteSet};

#[derive(Clone)]
pub struct IntakeService {
    repo: Repository,
    mill: MillConfig,
}

/// Input for a new delivery
#[derive(Debug, Clone, Deserialize)]
pub struct NewDelivery {
    pub delivery_type: DeliveryType,
    pub grower: String,
    pub buyer: Option<String>,
    pub parcel: String,
    pub entry_date: NaiveDate,
    pub gross_kg: Decimal,
    #[serde(default)]
    pub impurity_kg: Decimal,
    pub variety: String,
    #[serde(default)]
    pub hopper_id: u32,
    #[serde(default)]
    pub lab: LabAnalysis,
    #[serde(default)]
    pub confirmations: Confirmations,
}

impl IntakeService {
    pub fn new(repo: Repository, mill: MillConfig) -> Self {
        Self { repo, mill }
    }

    pub async fn list_deliveries(&self, ctx: &SessionContext) -> AppResult<Vec<Delivery>> {
        let mut deliveries: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;
        deliveries.sort_by_key(|d| d.id);
        Ok(deliveries)
    }

    pub async fn get_delivery(&self, ctx: &SessionContext, id: u64) -> AppResult<Delivery> {
        let deliveries: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;
        deliveries
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| MillError::NotFound(format!("Delivery {}", id)).into())
    }

    /// Register a delivery. Milling deliveries join the hopper's active usage
    /// batch; direct sales get a sale document and never enter milling.
    pub async fn register_delivery(
        &self,
        ctx: &SessionContext,
        input: NewDelivery,
    ) -> AppResult<Delivery> {
        let _guard = self.repo.lock().await;
        let existing: Vec<Delivery> = self.repo.load(ctx.tenant_id).await?;

        let mut delivery = Delivery {
            id: existing.iter().map(|d| d.id).max().unwrap_or(0) + 1,
            delivery_type: input.delivery_type,
            grower: input.grower.trim().to_string(),
            buyer: input.buyer,
            parcel: input.parcel.trim().to_string(),
            entry_date: input.entry_date,
            gross_kg: input.gross_kg,
            impurity_kg: input.impurity_kg,
            variety: input.variety.trim().to_string(),
            hopper_id: input.hopper_id,
            usage_counter: 0,
            status: DeliveryStatus::Pending,
            milling_lot_id: None,
            lab: input.lab,
            sale_document: None,
        };
        validate_delivery(&delivery)?;

        match delivery.delivery_type {
            DeliveryType::ForMilling => {
                let view = group_hopper(delivery.hopper_id, &existing, &self.mill.yield_config());
                if !input.confirmations.mixing {
                    check_batch_variety(&view, &delivery.variety)?;
                }
                delivery.usage_counter = next_usage_counter(delivery.hopper_id, &existing);
            }
            DeliveryType::DirectSale => {
                delivery.status = DeliveryStatus::SoldDirect;
                delivery.hopper_id = 0;
                delivery.sale_document = Some(next_document_number(
                    DocumentKind::Sale,
                    delivery.entry_date,
                    self.mill.campaign_start_month,
                    existing.iter().filter_map(|d| d.sale_document.as_deref()),
                ));
            }
        }

        let mut writes = WriteSet::new();
        writes.put(&delivery)?;
        self.repo.commit(ctx.tenant_id, writes).await?;

        tracing::info!(
            tenant = %ctx.tenant_id,
            delivery_id = delivery.id,
            delivery_type = ?delivery.delivery_type,
            hopper = delivery.hopper_id,
            usage_counter = delivery.usage_counter,
            net_kg = %delivery.net_kg(),
            "Delivery registered"
        );
        Ok(delivery)
    }

    /// Record a lab analysis; allowed until the delivery is milled
    pub async fn update_lab(
        &self,
        ctx: &SessionContext,
        id: u64,
        lab: LabAnalysis,
    ) -> AppResult<Delivery> {
        let _guard = self.repo.lock().await;
        let mut delivery = self.get_delivery(ctx, id).await?;
        if delivery.status != DeliveryStatus::Pending {
            return Err(MillError::InvalidTransition(format!(
                "Delivery {} is {} and can no longer be edited",
                id, delivery.status
            ))
            .into());
        }

        delivery.lab = lab;
        validate_delivery(&delivery)?;

        let mut writes = WriteSet::new();
        writes.put(&delivery)?;
        self.repo.commit(ctx.tenant_id, writes).await?;
        tracing::info!(tenant = %ctx.tenant_id, delivery_id = id, "Lab analysis updated");
        Ok(delivery)
    }
}
