//! Storage tank models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An oil storage tank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tank {
    pub id: u32,
    /// Display name, e.g. "D.05"
    pub name: String,
    pub kind: TankKind,
    pub capacity_kg: Decimal,
    pub current_kg: Decimal,
    pub variety: Option<String>,
    /// Identity of the oil inside, usually a production batch id
    pub batch_label: Option<String>,
    pub status: TankStatus,
    /// Incremented on every reset
    pub cycle: u32,
    pub opened_on: Option<NaiveDate>,
    pub closed_on: Option<NaiveDate>,
}

impl Tank {
    pub fn new(id: u32, name: impl Into<String>, kind: TankKind, capacity_kg: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            capacity_kg,
            current_kg: Decimal::ZERO,
            variety: None,
            batch_label: None,
            status: TankStatus::Filling,
            cycle: 1,
            opened_on: None,
            closed_on: None,
        }
    }

    pub fn available_kg(&self) -> Decimal {
        self.capacity_kg - self.current_kg
    }

    pub fn is_empty(&self) -> bool {
        self.current_kg <= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TankKind {
    Storage,
    /// Intermediate tank feeding the bottling line
    Nurse,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TankStatus {
    Filling,
    Full,
}

impl std::fmt::Display for TankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TankStatus::Filling => write!(f, "Filling"),
            TankStatus::Full => write!(f, "Full"),
        }
    }
}

/// Archived fill cycle, written when a tank is reset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankCycle {
    pub tank_id: u32,
    pub cycle: u32,
    pub opened_on: Option<NaiveDate>,
    pub closed_on: Option<NaiveDate>,
    pub reset_on: NaiveDate,
    pub final_kg: Decimal,
    pub variety: Option<String>,
    pub batch_label: Option<String>,
}

impl TankCycle {
    pub fn key(&self) -> String {
        format!("{}#{}", self.tank_id, self.cycle)
    }
}

/// One line of the tank ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankMovement {
    pub id: String,
    pub tank_id: u32,
    pub cycle: u32,
    pub date: NaiveDate,
    pub kind: MovementKind,
    /// Positive for inflows, negative for outflows
    pub delta_kg: Decimal,
    /// Production batch, transfer or document the movement belongs to
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Fill,
    TransferIn,
    TransferOut,
    Withdrawal,
}
