//! Decimal money helpers shared by every pricing stage.
//!
//! Amounts are always `Decimal`; rounding is half-up (midpoint away from zero)
//! to whole cents and is applied to every intermediate value before it is used
//! in further arithmetic or stored.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::ValidationError;

/// Fractional digits kept for monetary amounts and percentages.
pub const MONEY_SCALE: u32 = 2;

/// Largest accepted quantity, unit price, cost or additional-cost amount.
/// Keeps every product, percentage and sum well inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest accepted margin percentage.
pub const MAX_MARGIN_PERCENT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn ensure_at_most(field: &str, value: Decimal, max: Decimal) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::AboveMaximum { field: field.to_string(), value, max });
    }
    Ok(())
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × pct / 100`, unrounded.
pub fn percent_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount * pct / HUNDRED
}

/// `(numerator / denominator) × 100` rounded to cents, or zero when the
/// denominator is zero. Saturates at the `Decimal` bounds instead of overflowing.
pub fn ratio_percent(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    match numerator.checked_div(denominator).and_then(|ratio| ratio.checked_mul(HUNDRED)) {
        Some(percent) => round2(percent),
        None if numerator.is_sign_negative() != denominator.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

pub fn sum_rounded<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round2(amounts.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ensure_at_most, percent_of, ratio_percent, round2, sum_rounded, MAX_AMOUNT};
    use crate::errors::ValidationError;

    #[test]
    fn round2_uses_half_up() {
        assert_eq!(round2(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round2(Decimal::new(12344, 3)), Decimal::new(1234, 2));
        assert_eq!(round2(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round2(Decimal::new(5, 3)), Decimal::new(1, 2));
    }

    #[test]
    fn round2_keeps_whole_amounts() {
        assert_eq!(round2(Decimal::from(125)), Decimal::from(125));
    }

    #[test]
    fn percent_of_is_unrounded() {
        assert_eq!(percent_of(Decimal::new(9999, 2), Decimal::from(8)), Decimal::new(79992, 4));
    }

    #[test]
    fn ratio_percent_never_divides_by_zero() {
        assert_eq!(ratio_percent(Decimal::from(7), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(ratio_percent(Decimal::from(7), Decimal::from(50)), Decimal::from(14));
    }

    #[test]
    fn ratio_percent_saturates_on_tiny_denominators() {
        let tiny = Decimal::new(1, 28);
        assert_eq!(ratio_percent(MAX_AMOUNT, tiny), Decimal::MAX);
        assert_eq!(ratio_percent(-MAX_AMOUNT, tiny), Decimal::MIN);
    }

    #[test]
    fn ensure_at_most_names_field_and_bound() {
        ensure_at_most("quantity", MAX_AMOUNT, MAX_AMOUNT).expect("bound is inclusive");
        let error = ensure_at_most("quantity", Decimal::MAX, MAX_AMOUNT).expect_err("too large");
        assert!(matches!(error, ValidationError::AboveMaximum { ref field, .. } if field == "quantity"));
    }

    #[test]
    fn sum_of_cents_does_not_drift() {
        let tenths = std::iter::repeat(Decimal::new(10, 2)).take(3);
        assert_eq!(sum_rounded(tenths), Decimal::new(30, 2));
    }
}
