//! Milling lot models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate record of one hopper usage batch once milling starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MillingLot {
    pub id: String,
    pub created_on: NaiveDate,
    pub hopper_id: u32,
    pub usage_counter: u32,
    pub olive_kg: Decimal,
    pub theoretical_oil_kg: Decimal,
    /// Zero while the lot is open; stamped once by production closure
    pub real_oil_kg: Decimal,
    pub variety: String,
    pub delivery_ids: Vec<u64>,
}

impl MillingLot {
    pub fn is_open(&self) -> bool {
        self.real_oil_kg.is_zero()
    }

    /// Stored industrial yield factor (real oil / olive mass)
    pub fn yield_factor(&self) -> Decimal {
        if self.olive_kg.is_zero() {
            Decimal::ZERO
        } else {
            self.real_oil_kg / self.olive_kg
        }
    }

    pub fn contains(&self, delivery_id: u64) -> bool {
        self.delivery_ids.contains(&delivery_id)
    }
}

/// Milling lot identifier, e.g. `MT3/2-10/11/25`
pub fn generate_milling_lot_id(hopper_id: u32, usage_counter: u32, date: NaiveDate) -> String {
    format!(
        "MT{}/{}-{}",
        hopper_id,
        usage_counter,
        date.format("%d/%m/%y")
    )
}
