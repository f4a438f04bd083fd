//! Domain errors raised by the production and tank engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors and operator warnings produced by the engine.
///
/// Soft warnings (`CapacityExceeded`, `VarietyMismatch`, `BatchExists`) block the
/// default path but may be overridden by an explicit operator confirmation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MillError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Tank {tank_id} would exceed capacity: requested {requested_kg} kg, available {available_kg} kg")]
    CapacityExceeded {
        tank_id: u32,
        requested_kg: Decimal,
        available_kg: Decimal,
    },

    #[error("{target} holds {current}, incoming is {incoming}")]
    VarietyMismatch {
        target: String,
        current: String,
        incoming: String,
    },

    #[error("Production batch {existing_id} already exists")]
    BatchExists { existing_id: String },

    #[error("Insufficient stock in {source_name}: requested {requested}, available {available}")]
    InsufficientStock {
        source_name: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl MillError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        MillError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Warnings the operator can accept and resubmit with a confirmation flag
    pub fn is_confirmable(&self) -> bool {
        matches!(
            self,
            MillError::CapacityExceeded { .. }
                | MillError::VarietyMismatch { .. }
                | MillError::BatchExists { .. }
        )
    }
}

pub type MillResult<T> = Result<T, MillError>;
