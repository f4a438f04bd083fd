//! Grower delivery ("vale") models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A grower's weighed olive drop-off
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    /// Sequential per tenant
    pub id: u64,
    pub delivery_type: DeliveryType,
    pub grower: String,
    /// Only set for direct sales
    pub buyer: Option<String>,
    /// Parcel or field name, free text used for provenance
    pub parcel: String,
    pub entry_date: NaiveDate,
    pub gross_kg: Decimal,
    pub impurity_kg: Decimal,
    pub variety: String,
    pub hopper_id: u32,
    pub usage_counter: u32,
    pub status: DeliveryStatus,
    pub milling_lot_id: Option<String>,
    pub lab: LabAnalysis,
    /// Sale document issued at intake for direct sales
    pub sale_document: Option<String>,
}

impl Delivery {
    pub fn net_kg(&self) -> Decimal {
        net_weight(self.gross_kg, self.impurity_kg)
    }

    /// Pending milling input not yet claimed by a milling lot
    pub fn is_awaiting_milling(&self) -> bool {
        self.delivery_type == DeliveryType::ForMilling
            && self.status == DeliveryStatus::Pending
            && self.milling_lot_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    ForMilling,
    DirectSale,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Milled,
    SoldDirect,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "Pending"),
            DeliveryStatus::Milled => write!(f, "Milled"),
            DeliveryStatus::SoldDirect => write!(f, "Sold direct"),
        }
    }
}

/// Laboratory analysis of a delivery sample. Zero means "not analysed".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabAnalysis {
    pub fat_yield_percent: Option<Decimal>,
    pub acidity_percent: Option<Decimal>,
}

/// Net olive weight, never negative
pub fn net_weight(gross_kg: Decimal, impurity_kg: Decimal) -> Decimal {
    (gross_kg - impurity_kg).max(Decimal::ZERO)
}
