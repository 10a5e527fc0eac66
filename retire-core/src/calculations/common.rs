//! Shared money helpers for the projection calculations.
//!
//! All monetary amounts leave the engine rounded to cents. Rates and the
//! inflation index keep their full precision.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on the compounding index between years.
const INDEX_SCALE: u32 = 12;

/// Rounds a monetary value to cents using half-up rounding.
///
/// Values at exactly half a cent round away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use retire_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Drops fractions of a cent toward zero.
///
/// Used when splitting an amount so the parts never sum past the whole.
///
/// ```
/// use rust_decimal_macros::dec;
/// use retire_core::calculations::common::truncate_to_cents;
///
/// assert_eq!(truncate_to_cents(dec!(10.019)), dec!(10.01));
/// ```
pub fn truncate_to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Clamps a value at zero.
pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Advances a compounding index by one year at `rate`, saturating at
/// [`Decimal::MAX`].
///
/// ```
/// use rust_decimal_macros::dec;
/// use retire_core::calculations::common::compound;
///
/// assert_eq!(compound(dec!(1), dec!(0.03)), dec!(1.03));
/// assert_eq!(compound(dec!(1.03), dec!(0.03)), dec!(1.0609));
/// ```
pub fn compound(
    index: Decimal,
    rate: Decimal,
) -> Decimal {
    checked_compound(index, rate).unwrap_or(Decimal::MAX)
}

/// Like [`compound`], but `None` once the index no longer fits.
pub fn checked_compound(
    index: Decimal,
    rate: Decimal,
) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_add(rate)?;
    index.checked_mul(factor).map(|value| {
        value
            .round_dp_with_strategy(INDEX_SCALE, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
    })
}
