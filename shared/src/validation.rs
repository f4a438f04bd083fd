//! Validation utilities for intake and configuration records

use rust_decimal::Decimal;

use crate::error::{MillError, MillResult};
use crate::models::{BottlingFormat, Delivery, DeliveryType, Tank};

// ============================================================================
// Intake Validations
// ============================================================================

/// Validate a delivery before it is accepted at the weighbridge
pub fn validate_delivery(delivery: &Delivery) -> MillResult<()> {
    if delivery.grower.trim().is_empty() {
        return Err(MillError::validation("grower", "Grower is required"));
    }
    if delivery.gross_kg < Decimal::ZERO {
        return Err(MillError::validation("gross_kg", "Gross weight cannot be negative"));
    }
    if delivery.impurity_kg < Decimal::ZERO {
        return Err(MillError::validation(
            "impurity_kg",
            "Impurity weight cannot be negative",
        ));
    }
    if delivery.net_kg() <= Decimal::ZERO {
        return Err(MillError::validation(
            "net_kg",
            "Net weight must be greater than zero",
        ));
    }

    match delivery.delivery_type {
        DeliveryType::DirectSale => {
            if delivery
                .buyer
                .as_deref()
                .map_or(true, |b| b.trim().is_empty())
            {
                return Err(MillError::validation(
                    "buyer",
                    "A direct sale requires a buyer",
                ));
            }
        }
        DeliveryType::ForMilling => {
            if delivery.variety.trim().is_empty() {
                return Err(MillError::validation("variety", "Variety is required"));
            }
            if delivery.hopper_id == 0 {
                return Err(MillError::validation("hopper_id", "A hopper must be selected"));
            }
        }
    }

    validate_percent("fat_yield_percent", delivery.lab.fat_yield_percent)?;
    validate_percent("acidity_percent", delivery.lab.acidity_percent)
}

fn validate_percent(field: &str, value: Option<Decimal>) -> MillResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO || v > Decimal::from(100) => Err(MillError::validation(
            field,
            "Percentage must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// Setup Validations
// ============================================================================

pub fn validate_tank(tank: &Tank) -> MillResult<()> {
    if tank.name.trim().is_empty() {
        return Err(MillError::validation("name", "Tank name is required"));
    }
    if tank.capacity_kg <= Decimal::ZERO {
        return Err(MillError::validation(
            "capacity_kg",
            "Capacity must be greater than zero",
        ));
    }
    Ok(())
}

pub fn validate_bottling_format(format: &BottlingFormat) -> MillResult<()> {
    if format.id.trim().is_empty() {
        return Err(MillError::validation("id", "Format id is required"));
    }
    if format.liters <= Decimal::ZERO {
        return Err(MillError::validation(
            "liters",
            "Format volume must be greater than zero",
        ));
    }
    Ok(())
}
