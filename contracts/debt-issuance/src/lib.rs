//! Debt Issuance Module
//!
//! Issues and redeems basket tokens whose components carry both equity
//! (default and external) and debt positions. The engine keeps per-basket fee
//! settings and a registry of modules that must be called around every
//! issuance, and derives every flow fresh from the ledger.
//!
//! ## Core Operations
//!
//! - **Initialize**: Manager configures fees while the engine is pending
//! - **Issue**: Collect equity, let modules borrow, mint supply and fees
//! - **Redeem**: Burn supply, collect debt, let modules repay, return equity
//! - **Fee updates**: Manager changes fees within the initial maximum
//! - **Hook registration**: Initialized modules register and unregister
//! - **Remove**: Manager detaches the engine once no hooks remain
//!
//! ## Collaborators
//!
//! Positions and balances come from a [`Ledger`]. Protocol-wide settings come
//! from an injected [`Controller`]. Modules and manager hooks are resolved by
//! address through a [`CapabilityRegistry`].

use std::collections::BTreeMap;
use std::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod controller;
pub mod flows;
pub mod hooks;
pub mod orchestrator;
pub mod registry;
pub mod settings;


pub use controller::{Controller, StaticController};
pub use hooks::{
    CapabilityCheckpoint, CapabilityRegistry, ExternalPositionModule, ManagerIssuanceHook,
    SupplyCapIssuanceHook,
};
pub use orchestrator::{IssuancePhase, PhaseTracker};
pub use registry::HookRegistry;
pub use settings::IssuanceSettings;

use basket_common::{
    check,
    constants::fees::PROTOCOL_FEE_SPLIT_INDEX,
    errors::{BasketError, BasketResult},
    events::{EventLog, IssuanceEvent},
    ledger::Ledger,
    types::{
        Address, BasketId, ComponentId, FeeBreakdown, FlowDirection, FlowRecord, HexAddress,
        ModuleId, ModuleState,
    },
    validation::{require_changed, require_fee_within, require_manager, require_valid_address},
};

// ============ Actions ============

/// Entry points of the engine, for callers that dispatch on data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum IssuanceAction {
    Initialize { basket: BasketId, settings: IssuanceSettings },
    Issue { basket: BasketId, quantity: u128, to: Address },
    Redeem { basket: BasketId, quantity: u128, to: Address },
    UpdateIssueFee { basket: BasketId, fee: u128 },
    UpdateRedeemFee { basket: BasketId, fee: u128 },
    UpdateFeeRecipient { basket: BasketId, recipient: Address },
    /// Caller is the registering module
    RegisterHook { basket: BasketId },
    /// Caller is the unregistering module
    UnregisterHook { basket: BasketId },
    RemoveModule { basket: BasketId },
}

// ============ Engine ============

/// Issuance engine shared by every basket it is initialized on
pub struct DebtIssuanceModule<C: Controller> {
    id: ModuleId,
    controller: C,
    settings: BTreeMap<BasketId, IssuanceSettings>,
    registry: HookRegistry,
    events: EventLog,
}

impl<C: Controller> DebtIssuanceModule<C> {
    pub fn new(id: ModuleId, controller: C) -> Self {
        Self {
            id,
            controller,
            settings: BTreeMap::new(),
            registry: HookRegistry::new(),
            events: EventLog::new(),
        }
    }

    /// Address of the engine; callers approve it for equity and debt pulls
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Dispatch an action on behalf of `caller`
    pub fn execute(
        &mut self,
        ledger: &mut dyn Ledger,
        capabilities: &mut CapabilityRegistry,
        caller: &Address,
        action: &IssuanceAction,
    ) -> BasketResult<()> {
        match action {
            IssuanceAction::Initialize { basket, settings } => {
                self.initialize(ledger, basket, caller, *settings)
            }
            IssuanceAction::Issue { basket, quantity, to } => self
                .issue(ledger, capabilities, basket, *quantity, caller, to)
                .map(|_| ()),
            IssuanceAction::Redeem { basket, quantity, to } => self
                .redeem(ledger, capabilities, basket, *quantity, caller, to)
                .map(|_| ()),
            IssuanceAction::UpdateIssueFee { basket, fee } => {
                self.update_issue_fee(&*ledger, basket, caller, *fee)
            }
            IssuanceAction::UpdateRedeemFee { basket, fee } => {
                self.update_redeem_fee(&*ledger, basket, caller, *fee)
            }
            IssuanceAction::UpdateFeeRecipient { basket, recipient } => {
                self.update_fee_recipient(&*ledger, basket, caller, *recipient)
            }
            IssuanceAction::RegisterHook { basket } => {
                self.register_to_issuance_module(&*ledger, basket, caller)
            }
            IssuanceAction::UnregisterHook { basket } => {
                self.unregister_from_issuance_module(basket, caller)
            }
            IssuanceAction::RemoveModule { basket } => self.remove_module(ledger, basket, caller),
        }
    }

    // ============ Manager Configuration ============

    /// Initialize the engine on a basket (manager only, engine pending)
    pub fn initialize(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        settings: IssuanceSettings,
    ) -> BasketResult<()> {
        check!(
            self.controller.is_basket(basket),
            BasketError::InvalidBasket { basket: *basket }
        );
        check!(
            ledger.module_state(basket, &self.id) == ModuleState::Pending,
            BasketError::ModuleNotPending { basket: *basket, module: self.id }
        );
        require_manager(*basket, ledger.manager(basket)?, *caller)?;
        settings.validate()?;

        ledger.initialize_module(basket, &self.id)?;
        self.settings.insert(*basket, settings);

        info!(
            basket = %HexAddress(basket),
            max_manager_fee = settings.max_manager_fee,
            issue_fee = settings.manager_issue_fee,
            redeem_fee = settings.manager_redeem_fee,
            hook = settings.manager_issuance_hook.is_some(),
            "Issuance initialized"
        );
        Ok(())
    }

    /// Change the issuance fee (manager only)
    pub fn update_issue_fee(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        fee: u128,
    ) -> BasketResult<()> {
        let settings = self.manager_settings_mut(ledger, basket, caller)?;
        require_fee_within(fee, settings.max_manager_fee)?;
        require_changed(&settings.manager_issue_fee, &fee, "issue fee")?;
        settings.manager_issue_fee = fee;

        debug!(basket = %HexAddress(basket), fee, "Issue fee updated");
        self.events.emit(IssuanceEvent::IssueFeeUpdated { basket: *basket, fee });
        Ok(())
    }

    /// Change the redemption fee (manager only)
    pub fn update_redeem_fee(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        fee: u128,
    ) -> BasketResult<()> {
        let settings = self.manager_settings_mut(ledger, basket, caller)?;
        require_fee_within(fee, settings.max_manager_fee)?;
        require_changed(&settings.manager_redeem_fee, &fee, "redeem fee")?;
        settings.manager_redeem_fee = fee;

        debug!(basket = %HexAddress(basket), fee, "Redeem fee updated");
        self.events.emit(IssuanceEvent::RedeemFeeUpdated { basket: *basket, fee });
        Ok(())
    }

    /// Change the manager fee recipient (manager only)
    pub fn update_fee_recipient(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        recipient: Address,
    ) -> BasketResult<()> {
        let settings = self.manager_settings_mut(ledger, basket, caller)?;
        require_valid_address(recipient, "fee recipient must be non-zero")?;
        require_changed(&settings.fee_recipient, &recipient, "fee recipient")?;
        settings.fee_recipient = recipient;

        debug!(basket = %HexAddress(basket), recipient = %HexAddress(&recipient), "Fee recipient updated");
        self.events.emit(IssuanceEvent::FeeRecipientUpdated { basket: *basket, recipient });
        Ok(())
    }

    /// Detach the engine from a basket and discard its settings.
    ///
    /// Fails while any module is still registered as a hook.
    pub fn remove_module(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        caller: &Address,
    ) -> BasketResult<()> {
        require_manager(*basket, ledger.manager(basket)?, *caller)?;
        let count = self.registry.count(basket);
        check!(count == 0, BasketError::RegisteredModulesRemain { count });

        ledger.remove_module(basket, &self.id)?;
        self.settings.remove(basket);

        info!(basket = %HexAddress(basket), "Issuance module removed");
        Ok(())
    }

    // ============ Hook Registration ============

    /// Register `module` as an issuance hook; the module is the caller
    pub fn register_to_issuance_module(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        module: &ModuleId,
    ) -> BasketResult<()> {
        self.require_valid_basket(ledger, basket)?;
        check!(
            ledger.module_state(basket, module) == ModuleState::Initialized
                && self.controller.is_module(module),
            BasketError::ModuleNotInitialized { basket: *basket, module: *module }
        );
        self.registry.register(basket, module)?;

        info!(basket = %HexAddress(basket), module = %HexAddress(module), "Module registered");
        self.events.emit(IssuanceEvent::ModuleRegistered { basket: *basket, module: *module });
        Ok(())
    }

    /// Unregister `module`; the module is the caller
    pub fn unregister_from_issuance_module(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
    ) -> BasketResult<()> {
        self.registry.unregister(basket, module)?;

        info!(basket = %HexAddress(basket), module = %HexAddress(module), "Module unregistered");
        self.events.emit(IssuanceEvent::ModuleUnregistered { basket: *basket, module: *module });
        Ok(())
    }

    // ============ Views ============

    /// Tokens, equity and debt a caller moves to issue `quantity`
    pub fn get_required_component_issuance_units(
        &self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        quantity: u128,
    ) -> BasketResult<(Vec<ComponentId>, Vec<u128>, Vec<u128>)> {
        Ok(self.required_flows(ledger, basket, quantity, FlowDirection::Issue)?.into_parts())
    }

    /// Tokens, equity and debt that move to redeem `quantity`
    pub fn get_required_component_redemption_units(
        &self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        quantity: u128,
    ) -> BasketResult<(Vec<ComponentId>, Vec<u128>, Vec<u128>)> {
        Ok(self.required_flows(ledger, basket, quantity, FlowDirection::Redeem)?.into_parts())
    }

    /// Full flow record for `quantity`, fees applied
    pub fn required_flows(
        &self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        quantity: u128,
        direction: FlowDirection,
    ) -> BasketResult<FlowRecord> {
        let fees = self.calculate_total_fees(basket, quantity, direction)?;
        flows::compute_flows(ledger, basket, fees.total_quantity, direction)
    }

    /// Fee split and fee-adjusted quantity for `quantity`
    pub fn calculate_total_fees(
        &self,
        basket: &BasketId,
        quantity: u128,
        direction: FlowDirection,
    ) -> BasketResult<FeeBreakdown> {
        let settings = self.settings_of(basket)?;
        let protocol_split = self.controller.module_fee(&self.id, PROTOCOL_FEE_SPLIT_INDEX);
        flows::calculate_fees(quantity, settings.fee_for(direction), protocol_split, direction)
    }

    pub fn issuance_settings(&self, basket: &BasketId) -> Option<&IssuanceSettings> {
        self.settings.get(basket)
    }

    /// Registered hook modules in registration order
    pub fn module_issuance_hooks(&self, basket: &BasketId) -> &[ModuleId] {
        self.registry.hooks(basket)
    }

    pub fn is_module_issuance_hook(&self, basket: &BasketId, module: &ModuleId) -> bool {
        self.registry.is_registered(basket, module)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Drain collected events
    pub fn take_events(&mut self) -> Vec<IssuanceEvent> {
        std::mem::take(&mut self.events).into_events()
    }

    // ============ Internal ============

    fn require_valid_basket(&self, ledger: &dyn Ledger, basket: &BasketId) -> BasketResult<()> {
        check!(
            self.controller.is_basket(basket)
                && ledger.module_state(basket, &self.id) == ModuleState::Initialized
                && self.settings.contains_key(basket),
            BasketError::InvalidBasket { basket: *basket }
        );
        Ok(())
    }

    fn settings_of(&self, basket: &BasketId) -> BasketResult<IssuanceSettings> {
        self.settings
            .get(basket)
            .copied()
            .ok_or(BasketError::InvalidBasket { basket: *basket })
    }

    fn manager_settings_mut(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        caller: &Address,
    ) -> BasketResult<&mut IssuanceSettings> {
        self.require_valid_basket(ledger, basket)?;
        require_manager(*basket, ledger.manager(basket)?, *caller)?;
        self.settings
            .get_mut(basket)
            .ok_or(BasketError::InvalidBasket { basket: *basket })
    }
}
