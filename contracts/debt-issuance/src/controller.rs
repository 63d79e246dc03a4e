//! Controller Interface
//!
//! Global protocol configuration the engine reads at call time: which
//! baskets and modules are enabled, per-module protocol fee slots and the
//! protocol fee recipient. Injected at construction, never a singleton.

use std::collections::{BTreeMap, BTreeSet};

use basket_common::{
    check,
    constants::fees::MAX_PROTOCOL_FEE_SPLIT,
    errors::{BasketError, BasketResult},
    types::{Address, BasketId, ModuleId},
    validation::require_valid_address,
};

/// Read-only protocol configuration
pub trait Controller {
    /// True if the basket is enabled on the protocol
    fn is_basket(&self, basket: &BasketId) -> bool;

    /// True if the module is enabled on the protocol
    fn is_module(&self, module: &ModuleId) -> bool;

    /// Fee slot of a module (fixed-point, 1e18 = 100%)
    fn module_fee(&self, module: &ModuleId, index: usize) -> u128;

    /// Recipient of protocol fees
    fn fee_recipient(&self) -> Address;
}

/// Controller configured up front
#[derive(Debug, Clone)]
pub struct StaticController {
    baskets: BTreeSet<BasketId>,
    modules: BTreeSet<ModuleId>,
    fees: BTreeMap<(ModuleId, usize), u128>,
    fee_recipient: Address,
}

impl StaticController {
    pub fn new(fee_recipient: Address) -> BasketResult<Self> {
        require_valid_address(fee_recipient, "protocol fee recipient must be non-zero")?;
        Ok(Self {
            baskets: BTreeSet::new(),
            modules: BTreeSet::new(),
            fees: BTreeMap::new(),
            fee_recipient,
        })
    }

    pub fn add_basket(&mut self, basket: BasketId) {
        self.baskets.insert(basket);
    }

    pub fn remove_basket(&mut self, basket: &BasketId) {
        self.baskets.remove(basket);
    }

    pub fn add_module(&mut self, module: ModuleId) {
        self.modules.insert(module);
    }

    /// Set a module fee slot; bounded by 100%
    pub fn set_module_fee(&mut self, module: ModuleId, index: usize, fee: u128) -> BasketResult<()> {
        check!(
            fee <= MAX_PROTOCOL_FEE_SPLIT,
            BasketError::FeeExceedsMaximum { fee, maximum: MAX_PROTOCOL_FEE_SPLIT }
        );
        self.fees.insert((module, index), fee);
        Ok(())
    }
}

impl Controller for StaticController {
    fn is_basket(&self, basket: &BasketId) -> bool {
        self.baskets.contains(basket)
    }

    fn is_module(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }

    fn module_fee(&self, module: &ModuleId, index: usize) -> u128 {
        self.fees.get(&(*module, index)).copied().unwrap_or(0)
    }

    fn fee_recipient(&self) -> Address {
        self.fee_recipient
    }
}
