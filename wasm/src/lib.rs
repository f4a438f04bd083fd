//! WebAssembly module for the Olive Mill platform
//!
//! Lets the weighbridge and tank screens compute figures while offline:
//! - Net weight and theoretical oil of a delivery
//! - Yield resolution (lab, variety default, fallback)
//! - Mass/volume conversion at the fixed oil density
//! - Production batch and series ids
//!
//! Quantities cross the boundary as decimal strings so no precision is lost
//! to JavaScript floats.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::models::{net_weight, production_batch_base_id, series_batch_id, Delivery};
use shared::units::{kg_to_liters, liters_to_kg};
use shared::validation::validate_delivery;
use shared::yields::{resolve_yield, theoretical_oil, YieldConfig};

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("olive mill engine loaded"));
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("Invalid date {}: {}", value, e))
}

fn to_js(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

fn net_kg(gross_kg: &str, impurity_kg: &str) -> Result<Decimal, String> {
    Ok(net_weight(
        parse_decimal("gross_kg", gross_kg)?,
        parse_decimal("impurity_kg", impurity_kg)?,
    ))
}

fn yield_percent(
    lab_percent: Option<String>,
    variety: &str,
    variety_yields_json: &str,
    fallback_percent: &str,
) -> Result<(Decimal, &'static str), String> {
    let defaults: HashMap<String, Decimal> = serde_json::from_str(variety_yields_json)
        .map_err(|e| format!("Invalid variety yields: {}", e))?;
    let mut config = YieldConfig::new(parse_decimal("fallback_percent", fallback_percent)?);
    for (name, percent) in defaults {
        config.set_variety(&name, percent);
    }
    let lab = lab_percent
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_decimal("lab_percent", s))
        .transpose()?;

    let resolved = resolve_yield(lab, variety, &config);
    let source = match resolved.source {
        shared::yields::YieldSource::Lab => "lab",
        shared::yields::YieldSource::ConfigDefault => "config_default",
        shared::yields::YieldSource::Fallback => "fallback",
    };
    Ok((resolved.percent, source))
}

fn industrial_yield(real_oil_kg: &str, olive_kg: &str) -> Result<Decimal, String> {
    let olive = parse_decimal("olive_kg", olive_kg)?;
    if olive <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok(parse_decimal("real_oil_kg", real_oil_kg)? / olive * Decimal::from(100))
}

fn next_batch_id(date: &str, existing_json: &str) -> Result<String, String> {
    let existing: Vec<String> = serde_json::from_str(existing_json)
        .map_err(|e| format!("Invalid batch list: {}", e))?;
    let base = production_batch_base_id(parse_date(date)?);
    if !existing.contains(&base) {
        return Ok(base);
    }
    let mut index = 0;
    loop {
        let candidate = series_batch_id(&base, index);
        if !existing.contains(&candidate) {
            return Ok(candidate);
        }
        index += 1;
    }
}

/// Net olive weight: gross minus impurities, floored at zero
#[wasm_bindgen]
pub fn calculate_net_weight(gross_kg: &str, impurity_kg: &str) -> Result<String, JsValue> {
    net_kg(gross_kg, impurity_kg)
        .map(|d| d.to_string())
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn calculate_theoretical_oil(net_kg: &str, yield_percent: &str) -> Result<String, JsValue> {
    let net = parse_decimal("net_kg", net_kg).map_err(to_js)?;
    let percent = parse_decimal("yield_percent", yield_percent).map_err(to_js)?;
    Ok(theoretical_oil(net, percent).to_string())
}

/// Yield for a delivery as `{"percent": "...", "source": "..."}`.
///
/// `variety_yields_json` maps variety names to default percentages.
#[wasm_bindgen]
pub fn resolve_yield_percent(
    lab_percent: Option<String>,
    variety: &str,
    variety_yields_json: &str,
    fallback_percent: &str,
) -> Result<String, JsValue> {
    let (percent, source) =
        yield_percent(lab_percent, variety, variety_yields_json, fallback_percent).map_err(to_js)?;
    Ok(serde_json::json!({ "percent": percent.to_string(), "source": source }).to_string())
}

#[wasm_bindgen]
pub fn calculate_industrial_yield(real_oil_kg: &str, olive_kg: &str) -> Result<String, JsValue> {
    industrial_yield(real_oil_kg, olive_kg)
        .map(|d| d.round_dp(2).to_string())
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn convert_kg_to_liters(kg: &str) -> Result<String, JsValue> {
    let kg = parse_decimal("kg", kg).map_err(to_js)?;
    Ok(kg_to_liters(kg).round_dp(2).to_string())
}

#[wasm_bindgen]
pub fn convert_liters_to_kg(liters: &str) -> Result<String, JsValue> {
    let liters = parse_decimal("liters", liters).map_err(to_js)?;
    Ok(liters_to_kg(liters).to_string())
}

/// First free production batch id for a date, given the ids already in use
#[wasm_bindgen]
pub fn next_production_batch_id(date: &str, existing_json: &str) -> Result<String, JsValue> {
    next_batch_id(date, existing_json).map_err(to_js)
}

/// Validate a delivery before it is queued for upload
#[wasm_bindgen]
pub fn validate_delivery_json(delivery_json: &str) -> Result<(), JsValue> {
    let delivery: Delivery = serde_json::from_str(delivery_json)
        .map_err(|e| to_js(format!("Invalid delivery JSON: {}", e)))?;
    validate_delivery(&delivery).map_err(|e| to_js(e.to_string()))
}
