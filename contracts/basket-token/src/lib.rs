//! Basket Token Ledger
//!
//! In-memory basket token store: per-basket component positions, module
//! lifecycle, supply and holder balances, plus a fungible token bank for the
//! component tokens themselves. Basket token balances live in the same bank
//! keyed by the basket id, so a basket is also an ordinary token.
//!
//! Calls that must be atomic run inside [`BasketStore::transact`], which
//! restores the previous state when the closure fails.

use std::collections::BTreeMap;
use std::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use basket_common::{
    check,
    constants::domains,
    errors::{BasketError, BasketResult},
    ledger::{BasketToken, TokenBank},
    types::{
        derive_address, Address, BasketId, ComponentId, ComponentPosition, ExternalPosition,
        ModuleId, ModuleState, PositionUnit,
    },
};

// ============ Basket Record ============

/// State of one basket token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BasketRecord {
    /// Account allowed to configure the basket
    pub manager: Address,
    /// Ticker symbol
    pub symbol: String,
    /// Positions in component order
    pub components: Vec<ComponentPosition>,
    /// Lifecycle state per module
    pub modules: BTreeMap<ModuleId, ModuleState>,
    /// Outstanding supply
    pub total_supply: u128,
}

impl BasketRecord {
    fn position(&self, component: &ComponentId) -> Option<&ComponentPosition> {
        self.components.iter().find(|p| &p.component == component)
    }

    fn position_index(&self, component: &ComponentId) -> Option<usize> {
        self.components.iter().position(|p| &p.component == component)
    }

    /// Index of the component, appending an empty position if absent
    fn position_index_or_insert(&mut self, component: &ComponentId) -> usize {
        match self.position_index(component) {
            Some(index) => index,
            None => {
                self.components.push(ComponentPosition::new(*component, 0));
                self.components.len() - 1
            }
        }
    }

    fn prune(&mut self, index: usize) {
        if self.components[index].is_empty() {
            self.components.remove(index);
        }
    }
}

// ============ Store ============

/// Basket tokens and the token bank they settle against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BasketStore {
    baskets: BTreeMap<BasketId, BasketRecord>,
    /// (token, holder) -> balance
    balances: BTreeMap<(Address, Address), u128>,
    /// (token, owner, spender) -> allowance
    allowances: BTreeMap<(Address, Address, Address), u128>,
}

impl BasketStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a basket with initial default positions; returns its id
    pub fn create_basket(
        &mut self,
        manager: Address,
        symbol: &str,
        components: &[(ComponentId, u128)],
    ) -> BasketResult<BasketId> {
        let mut seed = Vec::with_capacity(32 + symbol.len());
        seed.extend_from_slice(&manager);
        seed.extend_from_slice(symbol.as_bytes());
        let basket = derive_address(domains::BASKET, &seed);

        check!(
            !self.baskets.contains_key(&basket),
            BasketError::BasketAlreadyExists { basket }
        );
        check!(
            !symbol.is_empty(),
            BasketError::InvalidInput { param: "symbol", reason: "Symbol must not be empty" }
        );

        let mut positions: Vec<ComponentPosition> = Vec::with_capacity(components.len());
        for (component, unit) in components {
            check!(
                positions.iter().all(|p| &p.component != component),
                BasketError::InvalidInput { param: "components", reason: "Duplicate component" }
            );
            check!(
                *unit > 0,
                BasketError::InvalidInput { param: "components", reason: "Unit must be positive" }
            );
            positions.push(ComponentPosition::new(*component, *unit));
        }

        self.baskets.insert(
            basket,
            BasketRecord {
                manager,
                symbol: symbol.to_string(),
                components: positions,
                modules: BTreeMap::new(),
                total_supply: 0,
            },
        );

        Ok(basket)
    }

    /// Add a module to a basket in the pending state (manager only)
    pub fn add_module(
        &mut self,
        basket: &BasketId,
        caller: &Address,
        module: &ModuleId,
    ) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        check!(record.manager == *caller, BasketError::ManagerOnly { basket: *basket });
        check!(
            !record.modules.contains_key(module),
            BasketError::InvalidStateTransition
        );
        record.modules.insert(*module, ModuleState::Pending);
        Ok(())
    }

    /// Credit component tokens to a holder
    pub fn mint_token(&mut self, token: &Address, to: &Address, amount: u128) -> BasketResult<()> {
        self.credit(token, to, amount)
    }

    /// Read-only view of a basket
    pub fn basket(&self, basket: &BasketId) -> Option<&BasketRecord> {
        self.baskets.get(basket)
    }

    /// Run `f` atomically: on error every change it made is discarded
    pub fn transact<T, F>(&mut self, f: F) -> BasketResult<T>
    where
        F: FnOnce(&mut Self) -> BasketResult<T>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    // ============ Internal ============

    fn record(&self, basket: &BasketId) -> BasketResult<&BasketRecord> {
        self.baskets
            .get(basket)
            .ok_or(BasketError::InvalidBasket { basket: *basket })
    }

    fn record_mut(&mut self, basket: &BasketId) -> BasketResult<&mut BasketRecord> {
        self.baskets
            .get_mut(basket)
            .ok_or(BasketError::InvalidBasket { basket: *basket })
    }

    fn credit(&mut self, token: &Address, holder: &Address, amount: u128) -> BasketResult<()> {
        let balance = self.balances.entry((*token, *holder)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(BasketError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, token: &Address, holder: &Address, amount: u128) -> BasketResult<()> {
        let available = self.balance_of(token, holder);
        check!(
            available >= amount,
            BasketError::InsufficientBalance { available, requested: amount }
        );
        if available == amount {
            self.balances.remove(&(*token, *holder));
        } else {
            self.balances.insert((*token, *holder), available - amount);
        }
        Ok(())
    }
}

// ============ Basket Token Capability ============

impl BasketToken for BasketStore {
    fn is_basket(&self, basket: &BasketId) -> bool {
        self.baskets.contains_key(basket)
    }

    fn manager(&self, basket: &BasketId) -> BasketResult<Address> {
        Ok(self.record(basket)?.manager)
    }

    fn module_state(&self, basket: &BasketId, module: &ModuleId) -> ModuleState {
        self.baskets
            .get(basket)
            .and_then(|record| record.modules.get(module).copied())
            .unwrap_or_default()
    }

    fn initialize_module(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        match record.modules.get_mut(module) {
            Some(state) if *state == ModuleState::Pending => {
                *state = ModuleState::Initialized;
                Ok(())
            }
            _ => Err(BasketError::ModuleNotPending { basket: *basket, module: *module }),
        }
    }

    fn remove_module(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        check!(
            record.modules.get(module) == Some(&ModuleState::Initialized),
            BasketError::ModuleNotInitialized { basket: *basket, module: *module }
        );
        record.modules.remove(module);
        Ok(())
    }

    fn components(&self, basket: &BasketId) -> BasketResult<Vec<ComponentId>> {
        Ok(self.record(basket)?.components.iter().map(|p| p.component).collect())
    }

    fn default_position_unit(
        &self,
        basket: &BasketId,
        component: &ComponentId,
    ) -> BasketResult<u128> {
        Ok(self
            .record(basket)?
            .position(component)
            .map_or(0, |p| p.default_unit))
    }

    fn external_position_modules(
        &self,
        basket: &BasketId,
        component: &ComponentId,
    ) -> BasketResult<Vec<ModuleId>> {
        Ok(self
            .record(basket)?
            .position(component)
            .map(|p| p.external.iter().map(|e| e.module).collect())
            .unwrap_or_default())
    }

    fn external_position(
        &self,
        basket: &BasketId,
        component: &ComponentId,
        module: &ModuleId,
    ) -> BasketResult<Option<ExternalPosition>> {
        Ok(self
            .record(basket)?
            .position(component)
            .and_then(|p| p.external_position(module))
            .cloned())
    }

    fn total_supply(&self, basket: &BasketId) -> BasketResult<u128> {
        Ok(self.record(basket)?.total_supply)
    }

    fn edit_default_position(
        &mut self,
        basket: &BasketId,
        component: &ComponentId,
        unit: u128,
    ) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        match record.position_index(component) {
            Some(index) => {
                record.components[index].default_unit = unit;
                record.prune(index);
            }
            None if unit > 0 => record.components.push(ComponentPosition::new(*component, unit)),
            None => {}
        }
        Ok(())
    }

    fn edit_external_position(
        &mut self,
        basket: &BasketId,
        component: &ComponentId,
        module: &ModuleId,
        unit: PositionUnit,
        data: Vec<u8>,
    ) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        check!(
            record.modules.get(module) == Some(&ModuleState::Initialized),
            BasketError::ModuleNotInitialized { basket: *basket, module: *module }
        );

        if unit.is_zero() {
            if let Some(index) = record.position_index(component) {
                record.components[index].external.retain(|e| &e.module != module);
                record.prune(index);
            }
            return Ok(());
        }

        let index = record.position_index_or_insert(component);
        let external = &mut record.components[index].external;
        match external.iter_mut().find(|e| &e.module == module) {
            Some(position) => {
                position.unit = unit;
                position.data = data;
            }
            None => external.push(ExternalPosition { module: *module, unit, data }),
        }
        Ok(())
    }

    fn mint(&mut self, basket: &BasketId, to: &Address, quantity: u128) -> BasketResult<()> {
        let record = self.record_mut(basket)?;
        record.total_supply = record
            .total_supply
            .checked_add(quantity)
            .ok_or(BasketError::Overflow)?;
        self.credit(basket, to, quantity)
    }

    fn burn(&mut self, basket: &BasketId, from: &Address, quantity: u128) -> BasketResult<()> {
        self.record(basket)?;
        self.debit(basket, from, quantity)?;
        let record = self.record_mut(basket)?;
        record.total_supply = record
            .total_supply
            .checked_sub(quantity)
            .ok_or(BasketError::Underflow)?;
        Ok(())
    }
}

// ============ Token Bank Capability ============

impl TokenBank for BasketStore {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        if amount == 0 {
            self.allowances.remove(&(*token, *owner, *spender));
        } else {
            self.allowances.insert((*token, *owner, *spender), amount);
        }
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        let available = self.allowance(token, from, spender);
        check!(
            available >= amount,
            BasketError::InsufficientAllowance { available, requested: amount }
        );
        self.transfer(token, from, to, amount)?;
        // Unlimited approvals are never consumed
        if available != u128::MAX {
            self.approve(token, from, spender, available - amount)?;
        }
        Ok(())
    }
}

// ============ Tests ============
