//! Helpers shared by the backend integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use olive_mill_backend::config::MillConfig;
use olive_mill_backend::services::intake::NewDelivery;
use olive_mill_backend::services::tank::NewTank;
use olive_mill_backend::services::{
    HopperService, IntakeService, OutflowService, ProductionService, SyncQueue, TankService,
    TraceabilityService,
};
use olive_mill_backend::store::{MemoryStore, Repository};
use shared::models::{DeliveryType, LabAnalysis, TankKind};
use shared::types::{Confirmations, SessionContext};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
}

/// Picual configured at 20%
pub fn mill_config() -> MillConfig {
    let mut variety_yields = HashMap::new();
    variety_yields.insert("picual".to_string(), dec("20"));
    MillConfig {
        variety_yields,
        ..MillConfig::default()
    }
}

pub struct Mill {
    pub store: Arc<MemoryStore>,
    pub repo: Repository,
    pub ctx: SessionContext,
    pub intake: IntakeService,
    pub hoppers: HopperService,
    pub production: ProductionService,
    pub tanks: TankService,
    pub outflows: OutflowService,
    pub trace: TraceabilityService,
}

impl Mill {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone(), Arc::new(SyncQueue::new()));
        let mill = mill_config();
        Self {
            ctx: SessionContext::new(Uuid::new_v4()),
            intake: IntakeService::new(repo.clone(), mill.clone()),
            hoppers: HopperService::new(repo.clone(), mill.clone()),
            production: ProductionService::new(repo.clone(), mill.clone()),
            tanks: TankService::new(repo.clone()),
            outflows: OutflowService::new(repo.clone(), mill),
            trace: TraceabilityService::new(repo.clone()),
            store,
            repo,
        }
    }

    pub async fn storage_tank(&self, id: u32, name: &str, capacity: &str) {
        self.tanks
            .create_tank(
                &self.ctx,
                NewTank {
                    id,
                    name: name.to_string(),
                    kind: TankKind::Storage,
                    capacity_kg: dec(capacity),
                },
            )
            .await
            .unwrap();
    }

    pub async fn nurse_tank(&self, id: u32, name: &str, capacity: &str) {
        self.tanks
            .create_tank(
                &self.ctx,
                NewTank {
                    id,
                    name: name.to_string(),
                    kind: TankKind::Nurse,
                    capacity_kg: dec(capacity),
                },
            )
            .await
            .unwrap();
    }

    /// Register a Picual milling delivery with no impurities
    pub async fn deliver(&self, grower: &str, hopper_id: u32, net: &str) -> u64 {
        self.intake
            .register_delivery(&self.ctx, milling_delivery(grower, hopper_id, net, "Picual"))
            .await
            .unwrap()
            .id
    }
}

pub fn milling_delivery(grower: &str, hopper_id: u32, gross: &str, variety: &str) -> NewDelivery {
    NewDelivery {
        delivery_type: DeliveryType::ForMilling,
        grower: grower.to_string(),
        buyer: None,
        parcel: "Los Olivares".to_string(),
        entry_date: day(10),
        gross_kg: dec(gross),
        impurity_kg: Decimal::ZERO,
        variety: variety.to_string(),
        hopper_id,
        lab: LabAnalysis::default(),
        confirmations: Confirmations::default(),
    }
}
