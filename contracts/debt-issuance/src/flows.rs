//! Flow Calculator
//!
//! Computes, fresh from the ledger, how much of every token moves when a
//! fee-adjusted quantity of basket tokens is issued or redeemed.
//!
//! ## Rounding
//!
//! Equity the caller pays in is rounded up, equity paid out is rounded down.
//! Debt is rounded up in both directions. Each default and external unit is
//! rounded on its own, so a module's settlement is exactly its share of the
//! slot.

use std::vec::Vec;

use basket_common::{
    constants::precision::PRECISE_UNIT,
    errors::BasketResult,
    ledger::Ledger,
    math::{precise_mul_ceil, precise_mul_rounded, safe_add, safe_sub, Rounding},
    types::{
        BasketId, ComponentFlow, FeeBreakdown, FlowDirection, FlowRecord, ModuleSettlement,
        PositionUnit, SettlementKind,
    },
};

/// Resolve manager and protocol fees for `quantity`.
///
/// The fee is `ceil(quantity * fee_rate)`; the protocol keeps
/// `floor(fee * protocol_split)` and the manager the rest. The component
/// flows are computed on `quantity + fee` for issuance and
/// `quantity - fee` for redemption.
pub fn calculate_fees(
    quantity: u128,
    fee_rate: u128,
    protocol_split: u128,
    direction: FlowDirection,
) -> BasketResult<FeeBreakdown> {
    let total_fee = precise_mul_ceil(quantity, fee_rate)?;
    let protocol_fee = precise_mul_rounded(total_fee, protocol_split, Rounding::Floor)?;
    let manager_fee = safe_sub(total_fee, protocol_fee)?;

    let total_quantity = match direction {
        FlowDirection::Issue => safe_add(quantity, total_fee)?,
        FlowDirection::Redeem => safe_sub(quantity, total_fee)?,
    };

    Ok(FeeBreakdown {
        total_quantity,
        manager_fee,
        protocol_fee,
    })
}

struct Slot {
    flow: ComponentFlow,
    active: bool,
}

/// Compute the flows for `quantity` fee-adjusted basket units
pub fn compute_flows<L: Ledger + ?Sized>(
    ledger: &L,
    basket: &BasketId,
    quantity: u128,
    direction: FlowDirection,
) -> BasketResult<FlowRecord> {
    let components = ledger.components(basket)?;
    let mut slots: Vec<Slot> = components
        .iter()
        .map(|c| Slot { flow: ComponentFlow::new(*c), active: false })
        .collect();
    let mut settlements = Vec::new();

    for (index, component) in components.iter().enumerate() {
        let default_unit = ledger.default_position_unit(basket, component)?;
        if default_unit > 0 {
            let slot = &mut slots[index];
            slot.flow.equity = safe_add(slot.flow.equity, direction.equity_flow(quantity, default_unit)?)?;
            slot.active = true;
        }

        for module in ledger.external_position_modules(basket, component)? {
            let Some(position) = ledger.external_position(basket, component, &module)? else {
                continue;
            };

            match position.unit {
                PositionUnit::Equity(unit) if unit > 0 => {
                    let amount = direction.equity_flow(quantity, unit)?;
                    let slot = &mut slots[index];
                    slot.flow.equity = safe_add(slot.flow.equity, amount)?;
                    slot.active = true;
                    if amount > 0 {
                        settlements.push(ModuleSettlement {
                            module,
                            component: *component,
                            token: *component,
                            kind: SettlementKind::Equity,
                            amount,
                        });
                    }
                }
                PositionUnit::Debt { token, unit } if unit > 0 => {
                    let amount = direction.debt_flow(quantity, unit)?;
                    let slot_index = match slots.iter().position(|s| s.flow.component == token) {
                        Some(i) => i,
                        None => {
                            slots.push(Slot { flow: ComponentFlow::new(token), active: false });
                            slots.len() - 1
                        }
                    };
                    let slot = &mut slots[slot_index];
                    slot.flow.debt = safe_add(slot.flow.debt, amount)?;
                    slot.active = true;
                    if amount > 0 {
                        settlements.push(ModuleSettlement {
                            module,
                            component: *component,
                            token,
                            kind: SettlementKind::Debt,
                            amount,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    Ok(FlowRecord {
        direction,
        adjusted_quantity: quantity,
        flows: slots.into_iter().filter(|s| s.active).map(|s| s.flow).collect(),
        settlements,
    })
}
