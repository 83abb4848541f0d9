//! Decimal arithmetic helpers and the f64 bridge used by the statistical code.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Convert a decimal to f64 for statistical work.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert an f64 back to a decimal; non-finite values map to zero.
pub fn from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Relative distance `|a - b| / b`; zero when `b` is zero.
pub fn relative_distance(a: Decimal, b: Decimal) -> Decimal {
    if b == Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((a - b) / b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_f64_bridge() {
        assert_eq!(to_f64(dec!(100.25)), 100.25);
        assert_eq!(from_f64(0.5), dec!(0.5));
        assert_eq!(from_f64(f64::NAN), Decimal::ZERO);
        assert_eq!(from_f64(f64::INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_relative_distance() {
        assert_eq!(relative_distance(dec!(101), dec!(100)), dec!(0.01));
        assert_eq!(relative_distance(dec!(99), dec!(100)), dec!(0.01));
        assert_eq!(relative_distance(dec!(5), Decimal::ZERO), Decimal::ZERO);
    }
}
