//! Production batch ("tanda") models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A day's (or sub-series) closure converting milling lots into tank inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionBatch {
    /// `LP-DD/MM/YY`, optionally suffixed `-B`, `-C`, ...
    pub id: String,
    pub production_date: NaiveDate,
    pub milling_lot_ids: Vec<String>,
    pub total_olive_kg: Decimal,
    pub total_real_oil_kg: Decimal,
    pub tank_id: u32,
    pub notes: Option<String>,
}

impl ProductionBatch {
    pub fn yield_factor(&self) -> Decimal {
        if self.total_olive_kg.is_zero() {
            Decimal::ZERO
        } else {
            self.total_real_oil_kg / self.total_olive_kg
        }
    }

    pub fn industrial_yield_percent(&self) -> Decimal {
        self.yield_factor() * Decimal::from(100)
    }
}

/// Base production batch id for a date, e.g. `LP-10/11/25`
pub fn production_batch_base_id(date: NaiveDate) -> String {
    format!("LP-{}", date.format("%d/%m/%y"))
}

/// Series id for a same-day additional batch: index 0 is `-B`, 1 is `-C`, ...
///
/// Past `-Z` the suffix continues with numbers so probing never runs dry.
pub fn series_batch_id(base_id: &str, index: usize) -> String {
    match u8::try_from(index).ok().filter(|i| *i < 25) {
        Some(i) => format!("{}-{}", base_id, (b'B' + i) as char),
        None => format!("{}-{}", base_id, index + 2),
    }
}
