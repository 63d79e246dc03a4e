//! Hook Capabilities
//!
//! External position modules and manager issuance hooks are resolved by
//! address through a [`CapabilityRegistry`]. Hooks receive the ledger but
//! never the engine, so they cannot call back into an issuance in flight.
//!
//! Capabilities that keep their own state expose it through `checkpoint` and
//! `restore`, so [`CapabilityRegistry::transact`] can roll it back together
//! with the ledger when an issuance or redemption fails.

use std::any::Any;
use std::collections::BTreeMap;
use std::vec::Vec;

use tracing::{debug, warn};

use basket_common::{
    check,
    errors::{BasketError, BasketResult},
    ledger::Ledger,
    math::safe_add,
    types::{Address, BasketId, HexAddress, ModuleId, ModuleSettlement},
    validation::require_manager,
};

// ============ Capability Traits ============

/// Module holding debt or external positions on basket tokens
pub trait ExternalPositionModule {
    /// Address the module is registered under
    fn id(&self) -> ModuleId;

    /// Called before issuance flows are computed
    fn module_issue_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        quantity: u128,
    ) -> BasketResult<()>;

    /// Called before redemption flows are computed
    fn module_redeem_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        quantity: u128,
    ) -> BasketResult<()>;

    /// Settle one external position during issuance.
    ///
    /// Equity settlements may take the amount from the basket; debt
    /// settlements must leave the amount of the debt token in the basket.
    fn component_issue_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        settlement: &ModuleSettlement,
    ) -> BasketResult<()>;

    /// Settle one external position during redemption.
    ///
    /// Equity settlements must return the amount to the basket; debt
    /// settlements retire the amount the basket has just received.
    fn component_redeem_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        settlement: &ModuleSettlement,
    ) -> BasketResult<()>;

    /// Called once supply reflects the issuance
    fn post_issue_hook(
        &mut self,
        _ledger: &mut dyn Ledger,
        _basket: &BasketId,
        _quantity: u128,
    ) -> BasketResult<()> {
        Ok(())
    }

    /// Called once supply reflects the redemption
    fn post_redeem_hook(
        &mut self,
        _ledger: &mut dyn Ledger,
        _basket: &BasketId,
        _quantity: u128,
    ) -> BasketResult<()> {
        Ok(())
    }

    /// Copy of the module's internal state; stateless modules keep the default
    fn checkpoint(&self) -> Box<dyn Any> {
        Box::new(())
    }

    /// Put back a state taken by [`ExternalPositionModule::checkpoint`]
    fn restore(&mut self, _checkpoint: Box<dyn Any>) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Manager-configured check run before every issuance
pub trait ManagerIssuanceHook {
    /// Reject the issuance by returning an error
    fn invoke_pre_issue_hook(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        quantity: u128,
        caller: &Address,
        to: &Address,
    ) -> BasketResult<()>;

    /// Copy of the hook's internal state; stateless hooks keep the default
    fn checkpoint(&self) -> Box<dyn Any> {
        Box::new(())
    }

    /// Put back a state taken by [`ManagerIssuanceHook::checkpoint`]
    fn restore(&mut self, _checkpoint: Box<dyn Any>) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ============ Capability Registry ============

/// Internal state of every bound capability at one point in time
pub struct CapabilityCheckpoint {
    modules: Vec<(ModuleId, Box<dyn Any>)>,
    hooks: Vec<(Address, Box<dyn Any>)>,
}

/// Address-keyed table of module and hook implementations
#[derive(Default)]
pub struct CapabilityRegistry {
    modules: BTreeMap<ModuleId, Box<dyn ExternalPositionModule>>,
    hooks: BTreeMap<Address, Box<dyn ManagerIssuanceHook>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a module under its own id; returns the id
    pub fn bind_module(&mut self, module: Box<dyn ExternalPositionModule>) -> ModuleId {
        let id = module.id();
        self.modules.insert(id, module);
        id
    }

    /// Bind a manager hook under an address
    pub fn bind_hook(&mut self, address: Address, hook: Box<dyn ManagerIssuanceHook>) {
        self.hooks.insert(address, hook);
    }

    pub fn module_mut(
        &mut self,
        module: &ModuleId,
    ) -> BasketResult<&mut (dyn ExternalPositionModule + 'static)> {
        self.modules
            .get_mut(module)
            .map(|m| &mut **m)
            .ok_or(BasketError::ModuleNotFound { module: *module })
    }

    pub fn hook_mut(
        &mut self,
        hook: &Address,
    ) -> BasketResult<&mut (dyn ManagerIssuanceHook + 'static)> {
        self.hooks
            .get_mut(hook)
            .map(|h| &mut **h)
            .ok_or(BasketError::HookNotFound { hook: *hook })
    }

    /// Concrete view of a bound module
    pub fn module_as<T: ExternalPositionModule + 'static>(
        &mut self,
        module: &ModuleId,
    ) -> Option<&mut T> {
        self.modules.get_mut(module)?.as_any_mut().downcast_mut::<T>()
    }

    /// Capture the state of every bound module and hook
    pub fn checkpoint(&self) -> CapabilityCheckpoint {
        CapabilityCheckpoint {
            modules: self.modules.iter().map(|(id, m)| (*id, m.checkpoint())).collect(),
            hooks: self.hooks.iter().map(|(address, h)| (*address, h.checkpoint())).collect(),
        }
    }

    /// Roll every captured module and hook back to its checkpointed state
    pub fn restore(&mut self, checkpoint: CapabilityCheckpoint) {
        for (id, state) in checkpoint.modules {
            if let Some(module) = self.modules.get_mut(&id) {
                module.restore(state);
            }
        }
        for (address, state) in checkpoint.hooks {
            if let Some(hook) = self.hooks.get_mut(&address) {
                hook.restore(state);
            }
        }
    }

    /// Run `f`, restoring every capability's state if it fails.
    ///
    /// Pair with the ledger's own transaction so a failed call leaves
    /// neither balances nor module books changed.
    pub fn transact<T, F>(&mut self, f: F) -> BasketResult<T>
    where
        F: FnOnce(&mut Self) -> BasketResult<T>,
    {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if result.is_err() {
            debug!("Restoring capability state after failed call");
            self.restore(checkpoint);
        }
        result
    }

    /// Concrete view of a bound hook
    pub fn hook_as<T: ManagerIssuanceHook + 'static>(&mut self, hook: &Address) -> Option<&mut T> {
        self.hooks.get_mut(hook)?.as_any_mut().downcast_mut::<T>()
    }
}

// ============ Supply Cap Hook ============

/// Rejects issuance that would push supply above a manager-set cap
#[derive(Debug, Clone, Default)]
pub struct SupplyCapIssuanceHook {
    caps: BTreeMap<BasketId, u128>,
}

impl SupplyCapIssuanceHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cap of a basket (manager only)
    pub fn set_cap(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        cap: u128,
    ) -> BasketResult<()> {
        require_manager(*basket, ledger.manager(basket)?, *caller)?;
        debug!(basket = %HexAddress(basket), cap, "Supply cap updated");
        self.caps.insert(*basket, cap);
        Ok(())
    }

    /// Cap of a basket; uncapped if never set
    pub fn cap(&self, basket: &BasketId) -> Option<u128> {
        self.caps.get(basket).copied()
    }
}

impl ManagerIssuanceHook for SupplyCapIssuanceHook {
    fn invoke_pre_issue_hook(
        &mut self,
        ledger: &dyn Ledger,
        basket: &BasketId,
        quantity: u128,
        _caller: &Address,
        _to: &Address,
    ) -> BasketResult<()> {
        let Some(cap) = self.cap(basket) else {
            return Ok(());
        };
        let requested = safe_add(ledger.total_supply(basket)?, quantity)?;
        if requested > cap {
            warn!(basket = %HexAddress(basket), cap, requested, "Issuance above supply cap");
        }
        check!(requested <= cap, BasketError::SupplyCapExceeded { cap, requested });
        Ok(())
    }

    fn checkpoint(&self) -> Box<dyn Any> {
        Box::new(self.caps.clone())
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(caps) = checkpoint.downcast::<BTreeMap<BasketId, u128>>() {
            self.caps = *caps;
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
