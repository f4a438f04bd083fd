//! Pending bottling order
//!
//! Lines are collected and validated here before anything is written. Submitting
//! the order draws the oil from the source tank, consumes one bottle, cap and
//! label per unit and produces the bottling lot.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MillError, MillResult};
use crate::models::{
    AuxiliaryMaterial, BottlingFormat, BottlingLine, BottlingLot, MaterialCategory, OilSource,
    Tank, TankKind, TankMovement,
};
use crate::tank_ledger::withdraw;
use crate::units::liters_to_kg;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingBottlingOrder {
    pub date: NaiveDate,
    pub tank_id: u32,
    lines: Vec<BottlingLine>,
}

/// Material units an order needs
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MaterialDemand {
    pub material_id: String,
    pub units: i64,
}

/// Records produced by a submitted order
#[derive(Debug, Clone, Serialize)]
pub struct BottlingCommit {
    pub lot: BottlingLot,
    pub tank: Tank,
    pub movement: TankMovement,
    pub materials: Vec<AuxiliaryMaterial>,
}

impl PendingBottlingOrder {
    pub fn new(date: NaiveDate, tank_id: u32) -> Self {
        Self {
            date,
            tank_id,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[BottlingLine] {
        &self.lines
    }

    /// Add units of a format; repeated formats accumulate on one line
    pub fn add_line(&mut self, format: &BottlingFormat, units: u32) -> MillResult<()> {
        if !format.enabled {
            return Err(MillError::validation(
                "format_id",
                format!("Bottling format {} is disabled", format.name),
            ));
        }
        if units == 0 {
            return Err(MillError::validation("units", "Units must be positive"));
        }

        match self.lines.iter_mut().find(|l| l.format_id == format.id) {
            Some(line) => {
                line.units += units;
                line.liters = format.liters * Decimal::from(line.units);
            }
            None => self.lines.push(BottlingLine {
                format_id: format.id.clone(),
                units,
                liters: format.liters * Decimal::from(units),
            }),
        }
        Ok(())
    }

    pub fn total_liters(&self) -> Decimal {
        self.lines.iter().map(|l| l.liters).sum()
    }

    pub fn total_kg(&self) -> Decimal {
        liters_to_kg(self.total_liters())
    }

    /// Bottles, caps and labels required, one of each per unit
    pub fn material_demand(
        &self,
        formats: &[BottlingFormat],
        materials: &[AuxiliaryMaterial],
    ) -> MillResult<Vec<MaterialDemand>> {
        let mut demand: Vec<MaterialDemand> = Vec::new();
        for line in &self.lines {
            let format = formats
                .iter()
                .find(|f| f.id == line.format_id)
                .ok_or_else(|| MillError::NotFound(format!("Bottling format {}", line.format_id)))?;

            for category in [MaterialCategory::Bottle, MaterialCategory::Cap, MaterialCategory::Label] {
                let material = pick_material(materials, category, format.liters).ok_or_else(|| {
                    MillError::validation(
                        "materials",
                        format!("No {} registered for format {}", category, format.name),
                    )
                })?;
                let units = i64::from(line.units);
                match demand.iter_mut().find(|d| d.material_id == material.id) {
                    Some(existing) => existing.units += units,
                    None => demand.push(MaterialDemand {
                        material_id: material.id.clone(),
                        units,
                    }),
                }
            }
        }
        Ok(demand)
    }

    pub fn validate(
        &self,
        tank: &Tank,
        formats: &[BottlingFormat],
        materials: &[AuxiliaryMaterial],
    ) -> MillResult<Vec<MaterialDemand>> {
        if self.lines.is_empty() {
            return Err(MillError::validation("lines", "Add at least one bottling line"));
        }
        if tank.id != self.tank_id {
            return Err(MillError::validation("tank_id", "Order was built for another tank"));
        }
        if tank.current_kg < self.total_kg() {
            return Err(MillError::InsufficientStock {
                source_name: format!("tank {}", tank.name),
                requested: self.total_kg(),
                available: tank.current_kg,
            });
        }

        let demand = self.material_demand(formats, materials)?;
        for need in &demand {
            let material = materials
                .iter()
                .find(|m| m.id == need.material_id)
                .ok_or_else(|| MillError::NotFound(format!("Material {}", need.material_id)))?;
            if material.stock_units < need.units {
                return Err(MillError::InsufficientStock {
                    source_name: material.name.clone(),
                    requested: Decimal::from(need.units),
                    available: Decimal::from(material.stock_units),
                });
            }
        }
        Ok(demand)
    }

    /// Validate and build every record the bottling run writes
    pub fn submit(
        &self,
        tank: &Tank,
        formats: &[BottlingFormat],
        materials: &[AuxiliaryMaterial],
        existing_lots: &[BottlingLot],
    ) -> MillResult<BottlingCommit> {
        let demand = self.validate(tank, formats, materials)?;

        let label = tank
            .batch_label
            .clone()
            .ok_or_else(|| {
                MillError::validation(
                    "tank_id",
                    format!("Tank {} holds no identified batch", tank.name),
                )
            })?;
        let source = match tank.kind {
            TankKind::Nurse => OilSource::NurseTransfer {
                batch_id: label.clone(),
            },
            TankKind::Storage => OilSource::Tank { tank_id: tank.id },
        };

        let lot_id = next_bottling_lot_id(&label, existing_lots);
        let mut drawn = tank.clone();
        let movement = withdraw(&mut drawn, self.total_kg(), self.date, Some(lot_id.clone()))?;

        let consumed = demand
            .iter()
            .filter_map(|need| {
                materials.iter().find(|m| m.id == need.material_id).map(|m| {
                    let mut updated = m.clone();
                    updated.stock_units -= need.units;
                    updated
                })
            })
            .collect();

        Ok(BottlingCommit {
            lot: BottlingLot {
                id: lot_id,
                date: self.date,
                source,
                drawn_from_tank_id: tank.id,
                lines: self.lines.clone(),
                total_liters: self.total_liters(),
                total_kg: self.total_kg(),
            },
            tank: drawn,
            movement,
            materials: consumed,
        })
    }
}

/// Bottle of the exact size; caps and labels of the size or size-agnostic.
/// Among candidates the best stocked wins.
fn pick_material(
    materials: &[AuxiliaryMaterial],
    category: MaterialCategory,
    liters: Decimal,
) -> Option<&AuxiliaryMaterial> {
    materials
        .iter()
        .filter(|m| m.category == category)
        .filter(|m| match (category, m.size_liters) {
            (MaterialCategory::Bottle, size) => size == Some(liters),
            (_, None) => true,
            (_, Some(size)) => size == liters,
        })
        .max_by_key(|m| m.stock_units)
}

/// `<label>-E<n>`, first free n starting after the lots already issued
pub fn next_bottling_lot_id(label: &str, existing: &[BottlingLot]) -> String {
    let prefix = format!("{}-E", label);
    let issued = existing.iter().filter(|l| l.id.starts_with(&prefix)).count();
    (issued + 1..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !existing.iter().any(|l| &l.id == candidate))
        .unwrap_or_else(|| format!("{}{}", prefix, issued + 1))
}
