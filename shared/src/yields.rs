//! Oil yield resolution for deliveries
//!
//! Priority order: laboratory fat yield, then the variety default from
//! configuration, then the single configured fallback.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Delivery;

/// Yield defaults consumed from configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YieldConfig {
    variety_defaults: HashMap<String, Decimal>,
    pub fallback_percent: Decimal,
}

impl YieldConfig {
    pub fn new(fallback_percent: Decimal) -> Self {
        Self {
            variety_defaults: HashMap::new(),
            fallback_percent,
        }
    }

    pub fn with_variety(mut self, variety: &str, percent: Decimal) -> Self {
        self.set_variety(variety, percent);
        self
    }

    pub fn set_variety(&mut self, variety: &str, percent: Decimal) {
        self.variety_defaults
            .insert(normalize_variety(variety), percent);
    }

    pub fn variety_default(&self, variety: &str) -> Option<Decimal> {
        self.variety_defaults.get(&normalize_variety(variety)).copied()
    }
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self::new(Decimal::new(215, 1))
    }
}

/// Varieties are matched case- and whitespace-insensitively
fn normalize_variety(variety: &str) -> String {
    variety.trim().to_lowercase()
}

/// Where a resolved yield percentage came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum YieldSource {
    Lab,
    ConfigDefault,
    Fallback,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResolvedYield {
    pub percent: Decimal,
    pub source: YieldSource,
}

/// Resolve the yield percentage for a lab reading and variety
pub fn resolve_yield(
    lab_fat_percent: Option<Decimal>,
    variety: &str,
    config: &YieldConfig,
) -> ResolvedYield {
    if let Some(lab) = lab_fat_percent.filter(|p| *p > Decimal::ZERO) {
        return ResolvedYield {
            percent: lab,
            source: YieldSource::Lab,
        };
    }

    match config.variety_default(variety) {
        Some(percent) => ResolvedYield {
            percent,
            source: YieldSource::ConfigDefault,
        },
        None => ResolvedYield {
            percent: config.fallback_percent,
            source: YieldSource::Fallback,
        },
    }
}

pub fn resolve_delivery_yield(delivery: &Delivery, config: &YieldConfig) -> ResolvedYield {
    resolve_yield(delivery.lab.fat_yield_percent, &delivery.variety, config)
}

/// Theoretical oil = net weight x yield% / 100
pub fn theoretical_oil(net_kg: Decimal, yield_percent: Decimal) -> Decimal {
    net_kg * yield_percent / Decimal::from(100)
}

pub fn delivery_theoretical_oil(delivery: &Delivery, config: &YieldConfig) -> Decimal {
    theoretical_oil(
        delivery.net_kg(),
        resolve_delivery_yield(delivery, config).percent,
    )
}
