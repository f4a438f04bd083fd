//! Mass and volume conversion for olive oil

use rust_decimal::Decimal;

/// Oil density in kg per liter
pub fn oil_density() -> Decimal {
    Decimal::new(916, 3)
}

/// Convert oil mass to volume
pub fn kg_to_liters(kg: Decimal) -> Decimal {
    kg / oil_density()
}

/// Convert oil volume to mass
pub fn liters_to_kg(liters: Decimal) -> Decimal {
    liters * oil_density()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_one_liter_weighs_density() {
        assert_eq!(liters_to_kg(Decimal::ONE), dec("0.916"));
    }

    #[test]
    fn test_kg_to_liters() {
        assert_eq!(kg_to_liters(dec("916")), dec("1000"));
    }

    #[test]
    fn test_five_liter_bottle() {
        assert_eq!(liters_to_kg(dec("5")), dec("4.580"));
    }
}
