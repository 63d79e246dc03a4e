//! Precise Fixed-Point Math
//!
//! 18-decimal fixed-point arithmetic with explicit rounding direction.
//! Products are taken in 256 bits so `quantity * unit` never overflows
//! before the division.

use crate::constants::precision::PRECISE_UNIT;
use crate::errors::{BasketError, BasketResult};

#[allow(clippy::assign_op_pattern)]
#[allow(clippy::ptr_offset_with_cast)]
#[allow(clippy::manual_range_contains)]
mod wide {
    uint::construct_uint! {
        /// 256-bit unsigned integer.
        pub struct U256(4);
    }
}

pub use wide::U256;

/// Rounding direction of a division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round toward zero
    Floor,
    /// Round away from zero
    Ceil,
}

/// Compute `a * b / c` with the given rounding
///
/// Ceiling is `floor((a * b + c - 1) / c)`, computed as quotient plus one
/// when the remainder is non-zero.
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> BasketResult<u128> {
    if c == 0 {
        return Err(BasketError::DivisionByZero);
    }

    let product = U256::from(a) * U256::from(b);
    let denominator = U256::from(c);
    let mut quotient = product / denominator;

    if rounding == Rounding::Ceil && !(product % denominator).is_zero() {
        quotient = quotient + U256::one();
    }

    if quotient > U256::from(u128::MAX) {
        return Err(BasketError::Overflow);
    }

    Ok(quotient.low_u128())
}

/// `floor(a * b / c)`
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> BasketResult<u128> {
    mul_div(a, b, c, Rounding::Floor)
}

/// `ceil(a * b / c)`
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> BasketResult<u128> {
    mul_div(a, b, c, Rounding::Ceil)
}

/// `floor(a * b / 1e18)`
pub fn precise_mul(a: u128, b: u128) -> BasketResult<u128> {
    mul_div(a, b, PRECISE_UNIT, Rounding::Floor)
}

/// `ceil(a * b / 1e18)`
pub fn precise_mul_ceil(a: u128, b: u128) -> BasketResult<u128> {
    mul_div(a, b, PRECISE_UNIT, Rounding::Ceil)
}

/// `a * b / 1e18` with the given rounding
pub fn precise_mul_rounded(a: u128, b: u128, rounding: Rounding) -> BasketResult<u128> {
    mul_div(a, b, PRECISE_UNIT, rounding)
}

/// `floor(a * 1e18 / b)`
pub fn precise_div(a: u128, b: u128) -> BasketResult<u128> {
    mul_div(a, PRECISE_UNIT, b, Rounding::Floor)
}

/// `ceil(a * 1e18 / b)`
pub fn precise_div_ceil(a: u128, b: u128) -> BasketResult<u128> {
    mul_div(a, PRECISE_UNIT, b, Rounding::Ceil)
}

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> BasketResult<u128> {
    a.checked_add(b).ok_or(BasketError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> BasketResult<u128> {
    a.checked_sub(b).ok_or(BasketError::Underflow)
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> BasketResult<u128> {
    a.checked_mul(b).ok_or(BasketError::Overflow)
}
