//! Downstream dispositions of tank oil: nurse transfers, bottling and exits

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Storage tank to nurse tank movement feeding the bottling line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NurseTransfer {
    pub id: String,
    pub date: NaiveDate,
    pub source_tank_id: u32,
    pub nurse_tank_id: u32,
    pub kg: Decimal,
    /// Batch label of the transferred oil; bottling lots reference it
    pub batch_id: String,
}

/// Where a bottling run drew its oil from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OilSource {
    Tank { tank_id: u32 },
    NurseTransfer { batch_id: String },
}

/// A finished bottling run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BottlingLot {
    /// `<batch label>-E<n>`, e.g. `LP-10/11/25-E1`
    pub id: String,
    pub date: NaiveDate,
    pub source: OilSource,
    /// Tank the oil was physically drawn from
    pub drawn_from_tank_id: u32,
    pub lines: Vec<BottlingLine>,
    pub total_liters: Decimal,
    pub total_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BottlingLine {
    pub format_id: String,
    pub units: u32,
    pub liters: Decimal,
}

/// Bulk oil sale drawn from a tank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkExit {
    pub document_number: String,
    pub date: NaiveDate,
    pub tank_id: u32,
    pub buyer: String,
    pub kg: Decimal,
    pub liters: Decimal,
}

/// Pomace (orujo) shipped to an extractor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PomaceExit {
    pub document_number: String,
    pub date: NaiveDate,
    pub destination: String,
    pub kg: Decimal,
}

/// Bottle format enabled for bottling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BottlingFormat {
    pub id: String,
    pub name: String,
    pub liters: Decimal,
    pub enabled: bool,
}

/// Auxiliary packaging material with an explicit category and size
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuxiliaryMaterial {
    pub id: String,
    pub name: String,
    pub category: MaterialCategory,
    /// Nominal volume for bottles and boxes sized per format
    pub size_liters: Option<Decimal>,
    pub stock_units: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    Bottle,
    Cap,
    Label,
    Box,
    Other,
}

impl std::fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialCategory::Bottle => write!(f, "Bottle"),
            MaterialCategory::Cap => write!(f, "Cap"),
            MaterialCategory::Label => write!(f, "Label"),
            MaterialCategory::Box => write!(f, "Box"),
            MaterialCategory::Other => write!(f, "Other"),
        }
    }
}

/// Materials at or below the low-stock threshold
pub fn low_stock_materials(
    materials: &[AuxiliaryMaterial],
    threshold: i64,
) -> Vec<&AuxiliaryMaterial> {
    materials
        .iter()
        .filter(|m| m.stock_units <= threshold)
        .collect()
}
