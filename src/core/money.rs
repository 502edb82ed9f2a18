//! Fixed-point money helpers.
//!
//! Amounts are persisted as `i64` minor units (cents) and exposed as [`Decimal`] with two
//! decimal places. Every sum in the crate is taken over minor units, so adding many
//! expenses can never drift the way binary floating point does.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Number of decimal places kept for currency values.
pub const SCALE: u32 = 2;

/// Converts a decimal amount into minor units, rounding to [`SCALE`] places
/// (midpoint away from zero).
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let rounded = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|units| units.to_i64())
        .ok_or_else(|| Error::validation(format!("Amount {amount} is out of range")))
}

/// Like [`to_minor_units`] but rejects amounts that are not strictly positive
/// once rounded.
pub fn positive_minor_units(amount: Decimal) -> Result<i64> {
    let units = to_minor_units(amount)?;
    if units <= 0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(units)
}

/// Converts minor units back into a two-decimal value.
#[must_use]
pub fn from_minor_units(units: i64) -> Decimal {
    Decimal::new(units, SCALE)
}

/// Converts a sum of minor units back into a two-decimal value. Sums beyond the range of
/// [`Decimal`] saturate at [`Decimal::MAX`] or [`Decimal::MIN`].
#[must_use]
pub fn from_minor_units_sum(units: i128) -> Decimal {
    Decimal::try_from_i128_with_scale(units, SCALE).unwrap_or(if units < 0 {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

/// Formats an amount for display, e.g. `₹1,234.50`.
#[must_use]
pub fn format_amount(amount: Decimal, currency_symbol: &str) -> String {
    let rounded = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{currency_symbol}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() -> Result<()> {
        assert_eq!(to_minor_units(dec!(12.345))?, 1235);
        assert_eq!(to_minor_units(dec!(12.344))?, 1234);
        assert_eq!(to_minor_units(dec!(100))?, 10_000);
        Ok(())
    }

    #[test]
    fn test_positive_minor_units_rejects_zero_and_negative() {
        assert!(matches!(
            positive_minor_units(dec!(0)),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            positive_minor_units(dec!(-5)),
            Err(Error::InvalidAmount { .. })
        ));
        // Rounds to zero
        assert!(matches!(
            positive_minor_units(dec!(0.004)),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_out_of_range_amounts_are_rejected() {
        assert!(matches!(
            to_minor_units(Decimal::MAX),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            to_minor_units(Decimal::MIN),
            Err(Error::Validation { .. })
        ));
        // Fits in a Decimal but not in i64 cents
        assert!(matches!(
            positive_minor_units(dec!(100000000000000000000)),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units(45_000), dec!(450));
        assert_eq!(from_minor_units(1), dec!(0.01));
    }

    #[test]
    fn test_from_minor_units_sum_saturates() {
        assert_eq!(from_minor_units_sum(i128::from(i64::MAX) * 2), dec!(184467440737095516.14));
        assert_eq!(from_minor_units_sum(i128::MAX), Decimal::MAX);
        assert_eq!(from_minor_units_sum(i128::MIN), Decimal::MIN);
    }

    #[test]
    fn test_summing_minor_units_does_not_drift() -> Result<()> {
        // 0.1 + 0.2 is the classic floating point trap
        let total: i64 = [dec!(0.1), dec!(0.2)]
            .into_iter()
            .map(to_minor_units)
            .sum::<Result<i64>>()?;
        assert_eq!(from_minor_units(total), dec!(0.3));
        Ok(())
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(1234.5), "₹"), "₹1,234.50");
        assert_eq!(format_amount(dec!(0), "$"), "$0.00");
        assert_eq!(format_amount(dec!(999), "$"), "$999.00");
        assert_eq!(format_amount(dec!(-1000000), "$"), "-$1,000,000.00");
    }
}
