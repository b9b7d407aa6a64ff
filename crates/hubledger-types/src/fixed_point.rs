//! Fixed-point helpers for ratio arithmetic.
//!
//! Token amounts are integers in the asset's smallest unit, and every
//! product or quotient of amounts is taken over `U256` intermediates so any
//! `u128` amount stays exact. Ratios (exchange rate, utilization, fee
//! percentages) are `Decimal`s truncated to
//! [`RATIO_SCALE`](crate::constants::RATIO_SCALE) places. A ratio enters
//! amount arithmetic as its integer mantissa over `10^scale`, and every
//! conversion back to an amount rounds toward zero, so amounts paid out
//! never exceed their exact value.

use primitive_types::U256;
use rust_decimal::Decimal;

use crate::{HubError, Result, constants::RATIO_SCALE};

fn wide(value: u128) -> U256 {
    U256::from(value)
}

fn narrow(value: U256, context: &'static str) -> Result<u128> {
    if value.bits() > 128 {
        return Err(overflow(context));
    }
    Ok(value.low_u128())
}

/// `(mantissa, 10^scale)` of a non-negative ratio.
fn ratio_parts(ratio: Decimal, context: &'static str) -> Result<(U256, U256)> {
    let mantissa = u128::try_from(ratio.mantissa()).map_err(|_| overflow(context))?;
    Ok((wide(mantissa), U256::exp10(ratio.scale() as usize)))
}

/// `numerator / denominator`, truncated to the canonical scale.
///
/// # Errors
/// `ArithmeticOverflow` if `denominator` is zero or the quotient does not
/// fit a `Decimal`.
pub fn ratio(numerator: u128, denominator: u128) -> Result<Decimal> {
    if denominator == 0 {
        return Err(overflow("ratio"));
    }
    let scaled = wide(numerator) * U256::exp10(RATIO_SCALE as usize) / wide(denominator);
    let mantissa = i128::try_from(narrow(scaled, "ratio")?).map_err(|_| overflow("ratio"))?;
    Decimal::try_from_i128_with_scale(mantissa, RATIO_SCALE)
        .map(|r| r.normalize())
        .map_err(|_| overflow("ratio"))
}

/// `floor(value * ratio)`.
pub fn mul_floor(value: u128, ratio: Decimal) -> Result<u128> {
    let (mantissa, one) = ratio_parts(ratio, "mul_floor")?;
    narrow(wide(value) * mantissa / one, "mul_floor")
}

/// `floor(value / ratio)`.
pub fn div_floor(value: u128, ratio: Decimal) -> Result<u128> {
    let (mantissa, one) = ratio_parts(ratio, "div_floor")?;
    if mantissa.is_zero() {
        return Err(overflow("div_floor"));
    }
    narrow(wide(value) * one / mantissa, "div_floor")
}

/// `min(floor(value * rate * periods), value)`.
pub fn portion_floor(value: u128, rate: Decimal, periods: u64) -> Result<u128> {
    let (mantissa, one) = ratio_parts(rate, "portion")?;
    // A product too wide for U256 is far above `value`.
    let portion = wide(value)
        .checked_mul(mantissa)
        .and_then(|p| p.checked_mul(U256::from(periods)))
        .map_or(wide(value), |p| p / one);
    narrow(portion.min(wide(value)), "portion")
}

/// Whether `value` lies in `[0, 1]`.
#[must_use]
pub fn is_unit_interval(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}

fn overflow(context: &'static str) -> HubError {
    HubError::ArithmeticOverflow { context }
}
