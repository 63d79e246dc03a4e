//! Position Library
//!
//! Conversions between per-unit positions and total notional, default-unit
//! recomputation from actual balances, and the collateralization audit run
//! after every issuance and redemption.

use crate::errors::{BasketError, BasketResult};
use crate::ledger::Ledger;
use crate::math::{precise_div, precise_mul, safe_sub};
use crate::types::{BasketId, ComponentId};

/// Notional held for `supply` basket units at `unit`, rounded down
pub fn total_notional(supply: u128, unit: u128) -> BasketResult<u128> {
    precise_mul(supply, unit)
}

/// New default unit after a balance change from `pre_balance` to `post_balance`.
///
/// Tokens the basket held above `pre_unit * supply` before the change are
/// treated as unaccounted and kept out of the new unit.
pub fn calculate_default_edit_position_unit(
    supply: u128,
    pre_balance: u128,
    post_balance: u128,
    pre_unit: u128,
) -> BasketResult<u128> {
    if supply == 0 {
        return Ok(0);
    }
    let unaccounted = pre_balance.saturating_sub(total_notional(supply, pre_unit)?);
    let accounted = safe_sub(post_balance, unaccounted)?;
    precise_div(accounted, supply)
}

/// Rewrite a component's default unit from the basket's actual balance.
///
/// Returns `(new_unit, previous_unit)`.
pub fn edit_default_position_from_balance<L: Ledger + ?Sized>(
    ledger: &mut L,
    basket: &BasketId,
    component: &ComponentId,
    pre_balance: u128,
) -> BasketResult<(u128, u128)> {
    let supply = ledger.total_supply(basket)?;
    let previous_unit = ledger.default_position_unit(basket, component)?;
    let post_balance = ledger.balance_of(component, basket);

    let new_unit =
        calculate_default_edit_position_unit(supply, pre_balance, post_balance, previous_unit)?;
    ledger.edit_default_position(basket, component, new_unit)?;

    Ok((new_unit, previous_unit))
}

/// Rewrite a component's default unit as balance over supply, rounded down
pub fn sync_default_position<L: Ledger + ?Sized>(
    ledger: &mut L,
    basket: &BasketId,
    component: &ComponentId,
) -> BasketResult<u128> {
    let supply = ledger.total_supply(basket)?;
    if supply == 0 {
        return Ok(ledger.default_position_unit(basket, component)?);
    }
    let balance = ledger.balance_of(component, basket);
    let unit = precise_div(balance, supply)?;
    ledger.edit_default_position(basket, component, unit)?;
    Ok(unit)
}

/// Check that the basket holds at least its default notional of every component
pub fn verify_default_positions<L: Ledger + ?Sized>(
    ledger: &L,
    basket: &BasketId,
) -> BasketResult<()> {
    let supply = ledger.total_supply(basket)?;
    for component in ledger.components(basket)? {
        let unit = ledger.default_position_unit(basket, &component)?;
        let required = total_notional(supply, unit)?;
        let available = ledger.balance_of(&component, basket);
        if available < required {
            return Err(BasketError::PositionShortfall {
                component,
                required,
                available,
            });
        }
    }
    Ok(())
}
