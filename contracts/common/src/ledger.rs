//! Ledger Interfaces
//!
//! The capabilities the issuance engine consumes from its environment: the
//! basket token (position storage, module lifecycle, supply) and a token bank
//! holding component balances. The engine never stores balances itself; it
//! re-derives everything from these accessors on every call.

use crate::errors::BasketResult;
use crate::types::{
    Address, BasketId, ComponentId, ExternalPosition, ModuleId, ModuleState, PositionUnit,
};
use crate::Vec;

/// Position storage and supply primitives of basket tokens
pub trait BasketToken {
    /// True if the basket exists
    fn is_basket(&self, basket: &BasketId) -> bool;

    /// Manager of the basket
    fn manager(&self, basket: &BasketId) -> BasketResult<Address>;

    /// Lifecycle state of a module on the basket
    fn module_state(&self, basket: &BasketId, module: &ModuleId) -> ModuleState;

    /// Move a pending module to initialized
    fn initialize_module(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()>;

    /// Detach a module from the basket
    fn remove_module(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()>;

    /// Ordered component list
    fn components(&self, basket: &BasketId) -> BasketResult<Vec<ComponentId>>;

    /// Default (equity) unit of a component; zero if absent
    fn default_position_unit(&self, basket: &BasketId, component: &ComponentId)
        -> BasketResult<u128>;

    /// Modules holding an external position on a component, in insertion order
    fn external_position_modules(
        &self,
        basket: &BasketId,
        component: &ComponentId,
    ) -> BasketResult<Vec<ModuleId>>;

    /// External position of a module on a component
    fn external_position(
        &self,
        basket: &BasketId,
        component: &ComponentId,
        module: &ModuleId,
    ) -> BasketResult<Option<ExternalPosition>>;

    /// Signed external unit: equity positive, debt negative, zero if absent
    fn external_position_unit(
        &self,
        basket: &BasketId,
        component: &ComponentId,
        module: &ModuleId,
    ) -> BasketResult<i128> {
        match self.external_position(basket, component, module)? {
            Some(position) => position.unit.signed(),
            None => Ok(0),
        }
    }

    /// Total supply of the basket token
    fn total_supply(&self, basket: &BasketId) -> BasketResult<u128>;

    /// Set the default unit of a component, adding or dropping it as needed
    fn edit_default_position(
        &mut self,
        basket: &BasketId,
        component: &ComponentId,
        unit: u128,
    ) -> BasketResult<()>;

    /// Set a module's external position on a component; a zero unit removes it
    fn edit_external_position(
        &mut self,
        basket: &BasketId,
        component: &ComponentId,
        module: &ModuleId,
        unit: PositionUnit,
        data: Vec<u8>,
    ) -> BasketResult<()>;

    /// Mint basket tokens
    fn mint(&mut self, basket: &BasketId, to: &Address, quantity: u128) -> BasketResult<()>;

    /// Burn basket tokens
    fn burn(&mut self, basket: &BasketId, from: &Address, quantity: u128) -> BasketResult<()>;
}

/// Fungible token balances and allowances
pub trait TokenBank {
    /// Balance of `holder` in `token`
    fn balance_of(&self, token: &Address, holder: &Address) -> u128;

    /// Amount `spender` may move on behalf of `owner`
    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128;

    /// Move tokens held by `from`
    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> BasketResult<()>;

    /// Set the allowance of `spender` over `owner`'s tokens
    fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> BasketResult<()>;

    /// Move tokens on behalf of `from`, consuming `spender`'s allowance
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> BasketResult<()>;
}

/// Everything an issuance call touches, plus transfers executed as the basket
pub trait Ledger: BasketToken + TokenBank {
    /// Transfer tokens held by the basket
    fn invoke_transfer(
        &mut self,
        basket: &BasketId,
        token: &Address,
        to: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.transfer(token, basket, to, amount)
    }

    /// Approve a spender over tokens held by the basket
    fn invoke_approve(
        &mut self,
        basket: &BasketId,
        token: &Address,
        spender: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        self.approve(token, basket, spender, amount)
    }
}

impl<T: BasketToken + TokenBank> Ledger for T {}
