//! Validation Helpers
//!
//! Precondition checks shared by the issuance engine and its modules. Every
//! helper fails before any state mutation so a rejected call leaves no trace.
//!
//! ```rust,ignore
//! use basket_common::validation::{check, require_positive};
//!
//! check!(fee <= max_fee, BasketError::FeeExceedsMaximum { fee, maximum: max_fee });
//! require_positive(quantity, FlowDirection::Issue)?;
//! ```

use crate::{
    errors::{BasketError, BasketResult},
    types::{Address, FlowDirection, ZERO_ADDRESS},
};

// ============ Validation Macro ============

/// Check a condition and return an error if it fails.
///
/// ```rust,ignore
/// check!(quantity > 0, BasketError::ZeroAmount { direction });
/// ```
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

pub use check;

// ============ Common Validation Helpers ============

/// Require a basket quantity to be non-zero.
pub fn require_positive(quantity: u128, direction: FlowDirection) -> BasketResult<()> {
    check!(quantity > 0, BasketError::ZeroAmount { direction });
    Ok(())
}

/// Require the caller to be the basket manager.
pub fn require_manager(basket: Address, manager: Address, caller: Address) -> BasketResult<()> {
    check!(manager == caller, BasketError::ManagerOnly { basket });
    Ok(())
}

/// Require address to not be zero.
pub fn require_valid_address(address: Address, param: &'static str) -> BasketResult<()> {
    check!(address != ZERO_ADDRESS, BasketError::InvalidAddress { reason: param });
    Ok(())
}

/// Require a fee to stay within its bound.
pub fn require_fee_within(fee: u128, maximum: u128) -> BasketResult<()> {
    check!(fee <= maximum, BasketError::FeeExceedsMaximum { fee, maximum });
    Ok(())
}

/// Require a setter to actually change the stored value.
pub fn require_changed<T: PartialEq>(current: &T, new: &T, param: &'static str) -> BasketResult<()> {
    check!(current != new, BasketError::SameValue { param });
    Ok(())
}

/// Require sufficient balance for an operation.
pub fn require_sufficient_balance(available: u128, requested: u128) -> BasketResult<()> {
    check!(
        available >= requested,
        BasketError::InsufficientBalance { available, requested }
    );
    Ok(())
}

// ============ Tests ============
