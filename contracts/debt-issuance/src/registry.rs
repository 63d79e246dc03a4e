//! Module Issuance Hook Registry
//!
//! Per-basket, insertion-ordered set of modules that hold debt or external
//! positions and must be called around every issuance and redemption.

use std::collections::BTreeMap;
use std::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use basket_common::{
    check,
    errors::{BasketError, BasketResult},
    types::{BasketId, ModuleId},
};

/// Registered hook modules per basket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct HookRegistry {
    hooks: BTreeMap<BasketId, Vec<ModuleId>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module; fails if it is already registered
    pub fn register(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()> {
        let hooks = self.hooks.entry(*basket).or_default();
        check!(
            !hooks.contains(module),
            BasketError::AlreadyRegistered { module: *module }
        );
        hooks.push(*module);
        Ok(())
    }

    /// Remove a module, keeping the order of the rest
    pub fn unregister(&mut self, basket: &BasketId, module: &ModuleId) -> BasketResult<()> {
        let hooks = self
            .hooks
            .get_mut(basket)
            .ok_or(BasketError::NotRegistered { module: *module })?;
        let index = hooks
            .iter()
            .position(|m| m == module)
            .ok_or(BasketError::NotRegistered { module: *module })?;
        hooks.remove(index);
        if hooks.is_empty() {
            self.hooks.remove(basket);
        }
        Ok(())
    }

    /// Modules in registration order
    pub fn hooks(&self, basket: &BasketId) -> &[ModuleId] {
        self.hooks.get(basket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_registered(&self, basket: &BasketId, module: &ModuleId) -> bool {
        self.hooks(basket).contains(module)
    }

    /// Number of modules registered on a basket
    pub fn count(&self, basket: &BasketId) -> usize {
        self.hooks(basket).len()
    }
}
