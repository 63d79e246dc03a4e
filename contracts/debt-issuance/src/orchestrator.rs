//! Issuance/Redemption Orchestrator
//!
//! Drives one issuance or redemption through an explicit phase sequence.
//! Everything is read fresh from the ledger after the pre-hooks have run;
//! nothing is cached between calls. A failing step aborts the call: module
//! and hook state is restored through [`CapabilityRegistry::transact`] and
//! the surrounding ledger transaction discards every balance and position
//! change. Events are only emitted once all steps have succeeded.
//!
//! Issuance:
//! `Idle -> PreHooksRunning -> FlowsComputed -> EquityCollected ->
//!  ModuleHooksPosting -> SupplyMinted -> Idle`
//!
//! Redemption:
//! `Idle -> PreHooksRunning -> FlowsComputed -> SupplyBurned ->
//!  ModuleHooksPosting -> EquityReturned -> Idle`

use std::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use basket_common::{
    check,
    errors::{BasketError, BasketResult},
    events::IssuanceEvent,
    ledger::Ledger,
    position::verify_default_positions,
    types::{Address, BasketId, FeeBreakdown, FlowDirection, HexAddress, ModuleId},
    validation::require_positive,
};

use crate::controller::Controller;
use crate::flows::compute_flows;
use crate::hooks::CapabilityRegistry;
use crate::settings::IssuanceSettings;
use crate::DebtIssuanceModule;

// ============ Phases ============

/// Step of an issuance or redemption in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum IssuancePhase {
    Idle,
    PreHooksRunning,
    FlowsComputed,
    /// Issuance: equity pulled from the caller
    EquityCollected,
    /// Redemption: caller's basket tokens burned
    SupplyBurned,
    ModuleHooksPosting,
    /// Issuance: supply and fees minted
    SupplyMinted,
    /// Redemption: equity sent to the recipient
    EquityReturned,
}

impl IssuancePhase {
    /// The only phase that may follow this one
    pub fn successor(self, direction: FlowDirection) -> Option<Self> {
        use FlowDirection::{Issue, Redeem};
        use IssuancePhase::*;

        match (direction, self) {
            (_, Idle) => Some(PreHooksRunning),
            (_, PreHooksRunning) => Some(FlowsComputed),
            (Issue, FlowsComputed) => Some(EquityCollected),
            (Issue, EquityCollected) => Some(ModuleHooksPosting),
            (Issue, ModuleHooksPosting) => Some(SupplyMinted),
            (Issue, SupplyMinted) => Some(Idle),
            (Redeem, FlowsComputed) => Some(SupplyBurned),
            (Redeem, SupplyBurned) => Some(ModuleHooksPosting),
            (Redeem, ModuleHooksPosting) => Some(EquityReturned),
            (Redeem, EquityReturned) => Some(Idle),
            _ => None,
        }
    }
}

/// Tracks the phase of a single call
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    direction: FlowDirection,
    phase: IssuancePhase,
}

impl PhaseTracker {
    pub fn new(direction: FlowDirection) -> Self {
        Self {
            direction,
            phase: IssuancePhase::Idle,
        }
    }

    pub fn phase(&self) -> IssuancePhase {
        self.phase
    }

    /// Move to `next`; fails unless it is the successor of the current phase
    pub fn advance(&mut self, next: IssuancePhase) -> BasketResult<()> {
        check!(
            self.phase.successor(self.direction) == Some(next),
            BasketError::InvalidStateTransition
        );
        debug!(direction = ?self.direction, from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        Ok(())
    }
}

// ============ Issue / Redeem ============

impl<C: Controller> DebtIssuanceModule<C> {
    /// Issue `quantity` basket tokens to `to`, paid for by `caller`.
    ///
    /// The caller must have approved the engine for every equity flow.
    /// Debt tokens the modules borrow are forwarded to `to`.
    pub fn issue(
        &mut self,
        ledger: &mut dyn Ledger,
        capabilities: &mut CapabilityRegistry,
        basket: &BasketId,
        quantity: u128,
        caller: &Address,
        to: &Address,
    ) -> BasketResult<FeeBreakdown> {
        capabilities.transact(|caps| self.settle_issue(ledger, caps, basket, quantity, caller, to))
    }

    /// Redeem `quantity` of `caller`'s basket tokens, sending equity to `to`.
    ///
    /// The caller must have approved the engine for every debt flow.
    pub fn redeem(
        &mut self,
        ledger: &mut dyn Ledger,
        capabilities: &mut CapabilityRegistry,
        basket: &BasketId,
        quantity: u128,
        caller: &Address,
        to: &Address,
    ) -> BasketResult<FeeBreakdown> {
        capabilities.transact(|caps| self.settle_redeem(ledger, caps, basket, quantity, caller, to))
    }

    fn settle_issue(
        &mut self,
        ledger: &mut dyn Ledger,
        capabilities: &mut CapabilityRegistry,
        basket: &BasketId,
        quantity: u128,
        caller: &Address,
        to: &Address,
    ) -> BasketResult<FeeBreakdown> {
        let mut phase = PhaseTracker::new(FlowDirection::Issue);
        self.require_valid_basket(&*ledger, basket)?;
        require_positive(quantity, FlowDirection::Issue)?;
        let settings = self.settings_of(basket)?;
        let hooks: Vec<ModuleId> = self.module_issuance_hooks(basket).to_vec();

        phase.advance(IssuancePhase::PreHooksRunning)?;
        if let Some(hook) = settings.manager_issuance_hook {
            capabilities
                .hook_mut(&hook)?
                .invoke_pre_issue_hook(&*ledger, basket, quantity, caller, to)?;
        }
        for module in &hooks {
            capabilities
                .module_mut(module)?
                .module_issue_hook(ledger, basket, quantity)?;
        }

        phase.advance(IssuancePhase::FlowsComputed)?;
        let fees = self.calculate_total_fees(basket, quantity, FlowDirection::Issue)?;
        let record = compute_flows(&*ledger, basket, fees.total_quantity, FlowDirection::Issue)?;
        debug!(
            basket = %HexAddress(basket),
            adjusted_quantity = fees.total_quantity,
            slots = record.flows.len(),
            settlements = record.settlements.len(),
            "Issuance flows computed"
        );

        phase.advance(IssuancePhase::EquityCollected)?;
        for flow in record.flows.iter().filter(|f| f.equity > 0) {
            ledger.transfer_from(&flow.component, &self.id, caller, basket, flow.equity)?;
        }

        phase.advance(IssuancePhase::ModuleHooksPosting)?;
        for settlement in &record.settlements {
            capabilities
                .module_mut(&settlement.module)?
                .component_issue_hook(ledger, basket, settlement)?;
        }
        for flow in record.flows.iter().filter(|f| f.debt > 0) {
            ledger.invoke_transfer(basket, &flow.component, to, flow.debt)?;
        }

        phase.advance(IssuancePhase::SupplyMinted)?;
        ledger.mint(basket, to, quantity)?;
        self.mint_fees(ledger, basket, &settings, &fees)?;
        for module in &hooks {
            capabilities
                .module_mut(module)?
                .post_issue_hook(ledger, basket, quantity)?;
        }
        verify_default_positions(&*ledger, basket)?;

        phase.advance(IssuancePhase::Idle)?;
        info!(
            basket = %HexAddress(basket),
            to = %HexAddress(to),
            quantity,
            manager_fee = fees.manager_fee,
            protocol_fee = fees.protocol_fee,
            "Basket issued"
        );
        self.events.emit(IssuanceEvent::BasketIssued {
            basket: *basket,
            issuer: *caller,
            to: *to,
            hook: settings.manager_issuance_hook,
            quantity,
            manager_fee: fees.manager_fee,
            protocol_fee: fees.protocol_fee,
        });

        Ok(fees)
    }

    fn settle_redeem(
        &mut self,
        ledger: &mut dyn Ledger,
        capabilities: &mut CapabilityRegistry,
        basket: &BasketId,
        quantity: u128,
        caller: &Address,
        to: &Address,
    ) -> BasketResult<FeeBreakdown> {
        let mut phase = PhaseTracker::new(FlowDirection::Redeem);
        self.require_valid_basket(&*ledger, basket)?;
        require_positive(quantity, FlowDirection::Redeem)?;
        let settings = self.settings_of(basket)?;
        let hooks: Vec<ModuleId> = self.module_issuance_hooks(basket).to_vec();

        phase.advance(IssuancePhase::PreHooksRunning)?;
        for module in &hooks {
            capabilities
                .module_mut(module)?
                .module_redeem_hook(ledger, basket, quantity)?;
        }

        phase.advance(IssuancePhase::FlowsComputed)?;
        let fees = self.calculate_total_fees(basket, quantity, FlowDirection::Redeem)?;
        let record = compute_flows(&*ledger, basket, fees.total_quantity, FlowDirection::Redeem)?;
        debug!(
            basket = %HexAddress(basket),
            adjusted_quantity = fees.total_quantity,
            slots = record.flows.len(),
            settlements = record.settlements.len(),
            "Redemption flows computed"
        );

        phase.advance(IssuancePhase::SupplyBurned)?;
        ledger.burn(basket, caller, quantity)?;

        phase.advance(IssuancePhase::ModuleHooksPosting)?;
        for flow in record.flows.iter().filter(|f| f.debt > 0) {
            ledger.transfer_from(&flow.component, &self.id, caller, basket, flow.debt)?;
        }
        for settlement in &record.settlements {
            capabilities
                .module_mut(&settlement.module)?
                .component_redeem_hook(ledger, basket, settlement)?;
        }

        phase.advance(IssuancePhase::EquityReturned)?;
        for flow in record.flows.iter().filter(|f| f.equity > 0) {
            ledger.invoke_transfer(basket, &flow.component, to, flow.equity)?;
        }
        self.mint_fees(ledger, basket, &settings, &fees)?;
        for module in &hooks {
            capabilities
                .module_mut(module)?
                .post_redeem_hook(ledger, basket, quantity)?;
        }
        verify_default_positions(&*ledger, basket)?;

        phase.advance(IssuancePhase::Idle)?;
        info!(
            basket = %HexAddress(basket),
            to = %HexAddress(to),
            quantity,
            manager_fee = fees.manager_fee,
            protocol_fee = fees.protocol_fee,
            "Basket redeemed"
        );
        self.events.emit(IssuanceEvent::BasketRedeemed {
            basket: *basket,
            redeemer: *caller,
            to: *to,
            hook: settings.manager_issuance_hook,
            quantity,
            manager_fee: fees.manager_fee,
            protocol_fee: fees.protocol_fee,
        });

        Ok(fees)
    }

    /// Mint the manager and protocol fee shares
    fn mint_fees(
        &self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        settings: &IssuanceSettings,
        fees: &FeeBreakdown,
    ) -> BasketResult<()> {
        if fees.manager_fee > 0 {
            ledger.mint(basket, &settings.fee_recipient, fees.manager_fee)?;
        }
        if fees.protocol_fee > 0 {
            ledger.mint(basket, &self.controller.fee_recipient(), fees.protocol_fee)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_phase_sequence() {
        let mut tracker = PhaseTracker::new(FlowDirection::Issue);
        for next in [
            IssuancePhase::PreHooksRunning,
            IssuancePhase::FlowsComputed,
            IssuancePhase::EquityCollected,
            IssuancePhase::ModuleHooksPosting,
            IssuancePhase::SupplyMinted,
            IssuancePhase::Idle,
        ] {
            tracker.advance(next).unwrap();
        }
        assert_eq!(tracker.phase(), IssuancePhase::Idle);
    }

    #[test]
    fn test_redeem_phase_sequence() {
        let mut tracker = PhaseTracker::new(FlowDirection::Redeem);
        for next in [
            IssuancePhase::PreHooksRunning,
            IssuancePhase::FlowsComputed,
            IssuancePhase::SupplyBurned,
            IssuancePhase::ModuleHooksPosting,
            IssuancePhase::EquityReturned,
            IssuancePhase::Idle,
        ] {
            tracker.advance(next).unwrap();
        }
    }

    #[test]
    fn test_skipping_a_phase_fails() {
        let mut tracker = PhaseTracker::new(FlowDirection::Issue);
        tracker.advance(IssuancePhase::PreHooksRunning).unwrap();
        assert_eq!(
            tracker.advance(IssuancePhase::EquityCollected),
            Err(BasketError::InvalidStateTransition)
        );
        assert_eq!(tracker.phase(), IssuancePhase::PreHooksRunning);
    }

    #[test]
    fn test_redeem_cannot_collect_equity() {
        let mut tracker = PhaseTracker::new(FlowDirection::Redeem);
        tracker.advance(IssuancePhase::PreHooksRunning).unwrap();
        tracker.advance(IssuancePhase::FlowsComputed).unwrap();
        assert!(tracker.advance(IssuancePhase::EquityCollected).is_err());
    }
}
