//! Money helpers

use bigdecimal::{BigDecimal, RoundingMode};

/// Scale used for stored monetary amounts
pub const MONEY_SCALE: i64 = 2;

/// Round to two decimals, half away from zero
pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

pub fn is_positive(amount: &BigDecimal) -> bool {
    *amount > BigDecimal::from(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_money() {
        let amount = BigDecimal::from_str("10.005").unwrap();
        assert_eq!(round_money(&amount), BigDecimal::from_str("10.01").unwrap());

        let negative = BigDecimal::from_str("-10.005").unwrap();
        assert_eq!(round_money(&negative), BigDecimal::from_str("-10.01").unwrap());

        assert_eq!(round_money(&BigDecimal::from(7)), BigDecimal::from(7));
    }

    #[test]
    fn test_is_positive() {
        assert!(is_positive(&BigDecimal::from_str("0.01").unwrap()));
        assert!(!is_positive(&BigDecimal::from(0)));
        assert!(!is_positive(&BigDecimal::from(-5)));
    }
}
