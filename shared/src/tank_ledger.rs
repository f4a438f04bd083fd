//! Tank inventory state machine
//!
//! `Filling` accepts inflow until an explicit close moves the tank to `Full`.
//! The only way out of `Full` is a reset, which archives the cycle and empties
//! the tank. Every function here validates first and mutates only on success.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{MillError, MillResult};
use crate::models::{MovementKind, Tank, TankCycle, TankMovement, TankStatus};
use crate::types::Confirmations;

/// Oil arriving into a tank
#[derive(Debug, Clone)]
pub struct Inflow {
    pub kg: Decimal,
    pub variety: String,
    pub batch_label: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
}

/// Validate an inflow against status, capacity and mixing rules.
///
/// `allow_full` lets a production batch merge back into the tank that already
/// holds it even after the tank was closed.
pub fn check_fill(
    tank: &Tank,
    kg: Decimal,
    variety: &str,
    confirmations: Confirmations,
    allow_full: bool,
) -> MillResult<()> {
    if kg <= Decimal::ZERO {
        return Err(MillError::validation("kg", "Quantity must be positive"));
    }
    if tank.status == TankStatus::Full && !allow_full {
        return Err(MillError::InvalidTransition(format!(
            "Tank {} is closed (Full) and cannot receive oil",
            tank.name
        )));
    }
    check_capacity(tank, kg, confirmations)?;
    check_mixing(tank, variety, confirmations)
}

fn check_capacity(tank: &Tank, kg: Decimal, confirmations: Confirmations) -> MillResult<()> {
    let available = tank.available_kg();
    if kg > available && !confirmations.overflow {
        return Err(MillError::CapacityExceeded {
            tank_id: tank.id,
            requested_kg: kg,
            available_kg: available.max(Decimal::ZERO),
        });
    }
    Ok(())
}

fn check_mixing(tank: &Tank, incoming: &str, confirmations: Confirmations) -> MillResult<()> {
    if tank.is_empty() || confirmations.mixing {
        return Ok(());
    }
    match &tank.variety {
        Some(current) if !label_contains(current, incoming) => Err(MillError::VarietyMismatch {
            target: format!("tank {}", tank.name),
            current: current.clone(),
            incoming: incoming.to_string(),
        }),
        _ => Ok(()),
    }
}

/// A blended label `A + B` contains each of its components
pub fn label_contains(label: &str, part: &str) -> bool {
    label
        .split(" + ")
        .any(|component| component.trim().eq_ignore_ascii_case(part.trim()))
}

fn blend_label(current: Option<&str>, incoming: &str, tank_was_empty: bool) -> String {
    match current {
        Some(existing) if !tank_was_empty && !existing.trim().is_empty() => {
            if label_contains(existing, incoming) {
                existing.to_string()
            } else {
                format!("{} + {}", existing, incoming.trim())
            }
        }
        _ => incoming.trim().to_string(),
    }
}

/// Apply an already validated inflow
pub fn apply_fill(tank: &mut Tank, inflow: Inflow, kind: MovementKind) -> TankMovement {
    let was_empty = tank.is_empty();
    tank.variety = Some(blend_label(tank.variety.as_deref(), &inflow.variety, was_empty));
    if let Some(label) = &inflow.batch_label {
        tank.batch_label = Some(blend_label(tank.batch_label.as_deref(), label, was_empty));
    }
    tank.current_kg += inflow.kg;
    if tank.opened_on.is_none() {
        tank.opened_on = Some(inflow.date);
    }

    movement(tank, inflow.date, kind, inflow.kg, inflow.reference)
}

/// Fill a tank from production or an external transfer-in
pub fn fill(
    tank: &mut Tank,
    inflow: Inflow,
    confirmations: Confirmations,
) -> MillResult<TankMovement> {
    check_fill(tank, inflow.kg, &inflow.variety, confirmations, false)?;
    Ok(apply_fill(tank, inflow, MovementKind::Fill))
}

/// Result of a tank-to-tank transfer
#[derive(Debug, Clone)]
pub struct TransferMovements {
    pub outgoing: TankMovement,
    pub incoming: TankMovement,
}

/// Move oil between tanks (trasiego)
pub fn transfer(
    source: &mut Tank,
    target: &mut Tank,
    kg: Decimal,
    date: NaiveDate,
    confirmations: Confirmations,
) -> MillResult<TransferMovements> {
    if source.id == target.id {
        return Err(MillError::validation(
            "target_tank_id",
            "Source and target tank must differ",
        ));
    }
    check_stock(source, kg)?;
    let variety = source.variety.clone().unwrap_or_default();
    check_fill(target, kg, &variety, confirmations, false)?;

    let reference = source.batch_label.clone();
    source.current_kg -= kg;
    let outgoing = movement(
        source,
        date,
        MovementKind::TransferOut,
        -kg,
        Some(format!("trasiego to {}", target.name)),
    );
    let incoming = apply_fill(
        target,
        Inflow {
            kg,
            variety,
            batch_label: reference,
            date,
            reference: Some(format!("trasiego from {}", source.name)),
        },
        MovementKind::TransferIn,
    );

    Ok(TransferMovements { outgoing, incoming })
}

fn check_stock(tank: &Tank, kg: Decimal) -> MillResult<()> {
    if kg <= Decimal::ZERO {
        return Err(MillError::validation("kg", "Quantity must be positive"));
    }
    if tank.current_kg < kg {
        return Err(MillError::InsufficientStock {
            source_name: format!("tank {}", tank.name),
            requested: kg,
            available: tank.current_kg,
        });
    }
    Ok(())
}

/// Draw oil for a bulk sale or bottling; status is unchanged
pub fn withdraw(
    tank: &mut Tank,
    kg: Decimal,
    date: NaiveDate,
    reference: Option<String>,
) -> MillResult<TankMovement> {
    check_stock(tank, kg)?;
    tank.current_kg -= kg;
    Ok(movement(tank, date, MovementKind::Withdrawal, -kg, reference))
}

/// Close a filling tank.
///
/// The close date is the explicit input, else the latest movement of the
/// current cycle; a tank with neither cannot be closed.
pub fn close(
    tank: &mut Tank,
    movements: &[TankMovement],
    close_date: Option<NaiveDate>,
) -> MillResult<NaiveDate> {
    if tank.status != TankStatus::Filling {
        return Err(MillError::InvalidTransition(format!(
            "Tank {} is already closed",
            tank.name
        )));
    }

    let date = close_date
        .or_else(|| latest_movement_date(tank, movements))
        .ok_or_else(|| {
            MillError::validation(
                "close_date",
                "Tank has no movements in this cycle; provide a close date",
            )
        })?;

    tank.status = TankStatus::Full;
    tank.closed_on = Some(date);
    Ok(date)
}

fn latest_movement_date(tank: &Tank, movements: &[TankMovement]) -> Option<NaiveDate> {
    movements
        .iter()
        .filter(|m| m.tank_id == tank.id && m.cycle == tank.cycle)
        .map(|m| m.date)
        .max()
}

/// Reset a closed or empty tank and archive the finished cycle
pub fn reset(tank: &mut Tank, date: NaiveDate) -> MillResult<TankCycle> {
    if tank.status != TankStatus::Full && !tank.is_empty() {
        return Err(MillError::InvalidTransition(format!(
            "Tank {} must be closed or empty before reset",
            tank.name
        )));
    }

    let archived = TankCycle {
        tank_id: tank.id,
        cycle: tank.cycle,
        opened_on: tank.opened_on,
        closed_on: tank.closed_on,
        reset_on: date,
        final_kg: tank.current_kg,
        variety: tank.variety.take(),
        batch_label: tank.batch_label.take(),
    };

    tank.current_kg = Decimal::ZERO;
    tank.status = TankStatus::Filling;
    tank.cycle += 1;
    tank.opened_on = None;
    tank.closed_on = None;

    Ok(archived)
}

fn movement(
    tank: &Tank,
    date: NaiveDate,
    kind: MovementKind,
    delta_kg: Decimal,
    reference: Option<String>,
) -> TankMovement {
    TankMovement {
        id: Uuid::new_v4().to_string(),
        tank_id: tank.id,
        cycle: tank.cycle,
        date,
        kind,
        delta_kg,
        reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TankKind;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn tank(capacity: i64) -> Tank {
        Tank::new(5, "D.05", TankKind::Storage, Decimal::from(capacity))
    }

    fn inflow(kg: i64, variety: &str) -> Inflow {
        Inflow {
            kg: Decimal::from(kg),
            variety: variety.to_string(),
            batch_label: Some("LP-10/11/25".to_string()),
            date: day(10),
            reference: None,
        }
    }

    #[test]
    fn test_fill_sets_identity() {
        let mut t = tank(10000);
        let m = fill(&mut t, inflow(700, "Picual"), Confirmations::default()).unwrap();
        assert_eq!(t.current_kg, Decimal::from(700));
        assert_eq!(t.variety.as_deref(), Some("Picual"));
        assert_eq!(t.batch_label.as_deref(), Some("LP-10/11/25"));
        assert_eq!(t.opened_on, Some(day(10)));
        assert_eq!(m.delta_kg, Decimal::from(700));
        assert_eq!(m.kind, MovementKind::Fill);
    }

    #[test]
    fn test_overflow_requires_confirmation() {
        let mut t = tank(10000);
        t.current_kg = Decimal::from(9500);
        t.variety = Some("Picual".to_string());

        let err = fill(&mut t, inflow(700, "Picual"), Confirmations::default()).unwrap_err();
        assert!(matches!(err, MillError::CapacityExceeded { .. }));
        assert_eq!(t.current_kg, Decimal::from(9500));

        let confirmed = Confirmations {
            overflow: true,
            mixing: false,
        };
        fill(&mut t, inflow(700, "Picual"), confirmed).unwrap();
        assert_eq!(t.current_kg, Decimal::from(10200));
    }

    #[test]
    fn test_mixing_requires_confirmation_and_blends_label() {
        let mut t = tank(10000);
        fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();

        let err = fill(&mut t, inflow(500, "Hojiblanca"), Confirmations::default()).unwrap_err();
        assert!(matches!(err, MillError::VarietyMismatch { .. }));

        let confirmed = Confirmations {
            overflow: false,
            mixing: true,
        };
        fill(&mut t, inflow(500, "Hojiblanca"), confirmed).unwrap();
        assert_eq!(t.variety.as_deref(), Some("Picual + Hojiblanca"));

        // Either component of a blend is accepted without a new warning
        fill(&mut t, inflow(100, "hojiblanca"), Confirmations::default()).unwrap();
    }

    #[test]
    fn test_full_tank_rejects_fill() {
        let mut t = tank(10000);
        fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();
        close(&mut t, &[], Some(day(11))).unwrap();
        let err = fill(&mut t, inflow(10, "Picual"), Confirmations::default()).unwrap_err();
        assert!(matches!(err, MillError::InvalidTransition(_)));
    }

    #[test]
    fn test_transfer_moves_mass_and_label() {
        let mut source = tank(10000);
        fill(&mut source, inflow(3000, "Picual"), Confirmations::default()).unwrap();
        let mut target = Tank::new(9, "NODRIZA", TankKind::Nurse, Decimal::from(2000));

        let moves = transfer(&mut source, &mut target, Decimal::from(1500), day(12), Confirmations::default())
            .unwrap();

        assert_eq!(source.current_kg, Decimal::from(1500));
        assert_eq!(target.current_kg, Decimal::from(1500));
        assert_eq!(target.batch_label.as_deref(), Some("LP-10/11/25"));
        assert_eq!(moves.outgoing.delta_kg, Decimal::from(-1500));
        assert_eq!(moves.incoming.kind, MovementKind::TransferIn);
    }

    #[test]
    fn test_transfer_checks_source_stock() {
        let mut source = tank(10000);
        fill(&mut source, inflow(100, "Picual"), Confirmations::default()).unwrap();
        let mut target = Tank::new(6, "D.06", TankKind::Storage, Decimal::from(10000));
        let err = transfer(&mut source, &mut target, Decimal::from(101), day(12), Confirmations::default())
            .unwrap_err();
        assert!(matches!(err, MillError::InsufficientStock { .. }));
        assert_eq!(source.current_kg, Decimal::from(100));
        assert!(target.is_empty());
    }

    #[test]
    fn test_transfer_checks_target_capacity() {
        let mut source = tank(10000);
        fill(&mut source, inflow(3000, "Picual"), Confirmations::default()).unwrap();
        let mut target = Tank::new(6, "D.06", TankKind::Storage, Decimal::from(1000));
        let err = transfer(&mut source, &mut target, Decimal::from(1500), day(12), Confirmations::default())
            .unwrap_err();
        assert!(matches!(err, MillError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_withdraw() {
        let mut t = tank(10000);
        fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();
        withdraw(&mut t, Decimal::from(400), day(15), None).unwrap();
        assert_eq!(t.current_kg, Decimal::from(600));
        assert!(withdraw(&mut t, Decimal::from(601), day(15), None).is_err());
        assert_eq!(t.status, TankStatus::Filling);
    }

    #[test]
    fn test_close_uses_latest_movement() {
        let mut t = tank(10000);
        let first = fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();
        let second = withdraw(&mut t, Decimal::from(100), day(14), None).unwrap();
        let date = close(&mut t, &[first, second], None).unwrap();
        assert_eq!(date, day(14));
        assert_eq!(t.status, TankStatus::Full);
        assert_eq!(t.closed_on, Some(day(14)));
    }

    #[test]
    fn test_close_without_history_needs_date() {
        let mut t = tank(10000);
        let err = close(&mut t, &[], None).unwrap_err();
        assert!(matches!(err, MillError::Validation { .. }));
        assert_eq!(t.status, TankStatus::Filling);
    }

    #[test]
    fn test_close_twice_rejected() {
        let mut t = tank(10000);
        close(&mut t, &[], Some(day(1))).unwrap();
        assert!(matches!(
            close(&mut t, &[], Some(day(2))),
            Err(MillError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_reset_archives_cycle() {
        let mut t = tank(10000);
        fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();
        close(&mut t, &[], Some(day(20))).unwrap();

        let cycle = reset(&mut t, day(21)).unwrap();

        assert_eq!(cycle.cycle, 1);
        assert_eq!(cycle.final_kg, Decimal::from(1000));
        assert_eq!(cycle.batch_label.as_deref(), Some("LP-10/11/25"));
        assert_eq!(t.cycle, 2);
        assert!(t.is_empty());
        assert_eq!(t.variety, None);
        assert_eq!(t.status, TankStatus::Filling);
    }

    #[test]
    fn test_reset_rejects_filling_tank_with_oil() {
        let mut t = tank(10000);
        fill(&mut t, inflow(1000, "Picual"), Confirmations::default()).unwrap();
        assert!(matches!(reset(&mut t, day(21)), Err(MillError::InvalidTransition(_))));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Fill(u32),
        Withdraw(u32),
        TransferAtoB(u32),
        TransferBtoA(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..5000).prop_map(Op::Fill),
            (1u32..5000).prop_map(Op::Withdraw),
            (1u32..5000).prop_map(Op::TransferAtoB),
            (1u32..5000).prop_map(Op::TransferBtoA),
        ]
    }

    proptest! {
        #[test]
        fn prop_tank_mass_stays_in_bounds(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut a = Tank::new(1, "D.01", TankKind::Storage, Decimal::from(10000));
            let mut b = Tank::new(2, "D.02", TankKind::Storage, Decimal::from(6000));
            let none = Confirmations::default();

            for op in ops {
                let _ = match op {
                    Op::Fill(kg) => fill(&mut a, inflow(kg as i64, "Picual"), none).map(|_| ()),
                    Op::Withdraw(kg) => withdraw(&mut a, Decimal::from(kg), day(3), None).map(|_| ()),
                    Op::TransferAtoB(kg) => transfer(&mut a, &mut b, Decimal::from(kg), day(3), none).map(|_| ()),
                    Op::TransferBtoA(kg) => transfer(&mut b, &mut a, Decimal::from(kg), day(3), none).map(|_| ()),
                };
                for t in [&a, &b] {
                    prop_assert!(t.current_kg >= Decimal::ZERO);
                    prop_assert!(t.current_kg <= t.capacity_kg);
                }
            }
        }
    }
}
