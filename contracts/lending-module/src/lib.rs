//! Lending Leverage Module
//!
//! External position module that borrows from a [`LendingMarket`] on behalf
//! of basket tokens. The basket's outstanding debt is mirrored as a `Debt`
//! position on the collateral component, denominated in the market's debt
//! token, so issuers take on their share of the debt and redeemers repay it.
//!
//! ## Operations
//!
//! - **Initialize**: Manager attaches the module and registers it as an
//!   issuance hook
//! - **Borrow / Repay**: Manager levers or delevers the basket
//! - **Sync**: Accrue interest and rewrite the per-unit debt
//! - **Liquidate**: Anyone repays an unhealthy basket's debt for collateral
//! - **Remove**: Manager detaches the module once the debt is repaid
//!
//! During issuance the module borrows each issuer's debt share into the
//! basket; during redemption it repays the share the redeemer paid in. The
//! market book is checkpointed with the rest of the capabilities, so a
//! failed issuance or redemption also rolls back what was borrowed or repaid.

use std::any::Any;
use std::collections::BTreeSet;
use std::vec::Vec;

use tracing::{debug, info, warn};

pub mod market;

#[cfg(test)]
mod integration_tests;

pub use market::{LendingMarket, Liquidation, MarketConfig};

use basket_common::{
    check,
    errors::{BasketError, BasketResult},
    ledger::Ledger,
    math::precise_div_ceil,
    position::edit_default_position_from_balance,
    types::{Address, BasketId, HexAddress, ModuleId, ModuleSettlement, ModuleState, PositionUnit, SettlementKind},
    validation::require_manager,
};
use basket_debt_issuance::{Controller, DebtIssuanceModule, ExternalPositionModule};

/// Leverage module over a single lending market
pub struct LeverageModule {
    id: ModuleId,
    market: LendingMarket,
    baskets: BTreeSet<BasketId>,
}

impl LeverageModule {
    pub fn new(id: ModuleId, market: LendingMarket) -> Self {
        Self {
            id,
            market,
            baskets: BTreeSet::new(),
        }
    }

    pub fn market(&self) -> &LendingMarket {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut LendingMarket {
        &mut self.market
    }

    /// Outstanding debt of a basket, interest accrued so far included
    pub fn debt_of(&self, basket: &BasketId) -> BasketResult<u128> {
        self.market.debt_of(basket)
    }

    // ============ Lifecycle ============

    /// Initialize on a basket and register with the issuance engine (manager only)
    pub fn initialize<C: Controller>(
        &mut self,
        ledger: &mut dyn Ledger,
        engine: &mut DebtIssuanceModule<C>,
        basket: &BasketId,
        caller: &Address,
    ) -> BasketResult<()> {
        require_manager(*basket, ledger.manager(basket)?, *caller)?;
        ledger.initialize_module(basket, &self.id)?;
        engine.register_to_issuance_module(&*ledger, basket, &self.id)?;
        self.baskets.insert(*basket);

        info!(basket = %HexAddress(basket), module = %HexAddress(&self.id), "Leverage module initialized");
        Ok(())
    }

    /// Unregister and detach from a basket; all debt must be repaid first
    pub fn remove<C: Controller>(
        &mut self,
        ledger: &mut dyn Ledger,
        engine: &mut DebtIssuanceModule<C>,
        basket: &BasketId,
        caller: &Address,
    ) -> BasketResult<()> {
        self.require_manager(&*ledger, basket, caller)?;
        self.market.accrue()?;
        let remaining = self.market.debt_of(basket)?;
        check!(remaining == 0, BasketError::OutstandingDebt { remaining });

        engine.unregister_from_issuance_module(basket, &self.id)?;
        let config = *self.market.config();
        ledger.edit_external_position(
            basket,
            &config.collateral,
            &self.id,
            PositionUnit::Debt { token: config.debt_token, unit: 0 },
            Vec::new(),
        )?;
        ledger.remove_module(basket, &self.id)?;
        self.baskets.remove(basket);

        info!(basket = %HexAddress(basket), "Leverage module removed");
        Ok(())
    }

    // ============ Manager Operations ============

    /// Borrow into the basket; the borrowed tokens become default units
    pub fn borrow(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        self.require_manager(&*ledger, basket, caller)?;
        check!(
            ledger.total_supply(basket)? > 0,
            BasketError::InvalidInput { param: "basket", reason: "Basket has no supply" }
        );

        self.atomically(|module| {
            module.market.accrue()?;
            let debt_token = module.market.config().debt_token;
            let pre_balance = ledger.balance_of(&debt_token, basket);
            module.market.borrow(ledger, basket, amount)?;
            let (unit, _) = edit_default_position_from_balance(ledger, basket, &debt_token, pre_balance)?;
            let debt_unit = module.sync_debt(ledger, basket)?;

            info!(basket = %HexAddress(basket), amount, default_unit = unit, debt_unit, "Levered");
            Ok(())
        })
    }

    /// Repay from the basket's own debt token holdings
    pub fn repay(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        caller: &Address,
        amount: u128,
    ) -> BasketResult<u128> {
        self.require_manager(&*ledger, basket, caller)?;

        self.atomically(|module| {
            module.market.accrue()?;
            let debt_token = module.market.config().debt_token;
            let pre_balance = ledger.balance_of(&debt_token, basket);
            let repaid = module.market.repay(ledger, basket, basket, amount)?;
            let (unit, _) = edit_default_position_from_balance(ledger, basket, &debt_token, pre_balance)?;
            let debt_unit = module.sync_debt(ledger, basket)?;

            info!(basket = %HexAddress(basket), repaid, default_unit = unit, debt_unit, "Delevered");
            Ok(repaid)
        })
    }

    // ============ Keeper Operations ============

    /// Accrue interest and rewrite the basket's per-unit debt
    pub fn sync(&mut self, ledger: &mut dyn Ledger, basket: &BasketId) -> BasketResult<u128> {
        self.require_initialized(&*ledger, basket)?;
        self.market.accrue()?;
        self.sync_debt(ledger, basket)
    }

    /// Repay an unhealthy basket's debt and seize collateral with a bonus.
    ///
    /// Both the collateral default unit and the debt unit are rewritten from
    /// what the basket holds and owes afterwards.
    pub fn liquidate(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        liquidator: &Address,
        amount: u128,
    ) -> BasketResult<Liquidation> {
        self.require_initialized(&*ledger, basket)?;

        self.atomically(|module| {
            module.market.accrue()?;
            let collateral = module.market.config().collateral;
            let pre_balance = ledger.balance_of(&collateral, basket);
            let result = module.market.liquidate(ledger, liquidator, basket, amount)?;
            let (unit, previous) = edit_default_position_from_balance(ledger, basket, &collateral, pre_balance)?;
            module.sync_debt(ledger, basket)?;

            warn!(
                basket = %HexAddress(basket),
                liquidator = %HexAddress(liquidator),
                repaid = result.repaid,
                seized = result.seized,
                from_unit = previous,
                to_unit = unit,
                "Basket liquidated"
            );
            Ok(result)
        })
    }

    // ============ Internal ============

    /// Run `f`, putting the market book back if it fails
    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> BasketResult<T>) -> BasketResult<T> {
        let checkpoint = ExternalPositionModule::checkpoint(self);
        let result = f(self);
        if result.is_err() {
            ExternalPositionModule::restore(self, checkpoint);
        }
        result
    }

    /// Debt unit is `ceil(debt / supply)`; a zero unit drops the position
    fn sync_debt(&self, ledger: &mut dyn Ledger, basket: &BasketId) -> BasketResult<u128> {
        let config = self.market.config();
        let debt = self.market.debt_of(basket)?;
        let supply = ledger.total_supply(basket)?;

        let unit = match (debt, supply) {
            (0, _) => 0,
            // Debt without supply cannot be expressed per unit
            (_, 0) => return Ok(0),
            _ => precise_div_ceil(debt, supply)?,
        };
        ledger.edit_external_position(
            basket,
            &config.collateral,
            &self.id,
            PositionUnit::Debt { token: config.debt_token, unit },
            Vec::new(),
        )?;

        debug!(basket = %HexAddress(basket), debt, supply, unit, "Debt unit synced");
        Ok(unit)
    }

    fn require_initialized(&self, ledger: &dyn Ledger, basket: &BasketId) -> BasketResult<()> {
        check!(
            self.baskets.contains(basket)
                && ledger.module_state(basket, &self.id) == ModuleState::Initialized,
            BasketError::ModuleNotInitialized { basket: *basket, module: self.id }
        );
        Ok(())
    }

    fn require_manager(&self, ledger: &dyn Ledger, basket: &BasketId, caller: &Address) -> BasketResult<()> {
        self.require_initialized(ledger, basket)?;
        require_manager(*basket, ledger.manager(basket)?, *caller)
    }

    fn require_debt(&self, settlement: &ModuleSettlement) -> BasketResult<()> {
        check!(
            settlement.kind == SettlementKind::Debt && settlement.token == self.market.config().debt_token,
            BasketError::InvalidInput { param: "settlement", reason: "Leverage module only settles debt" }
        );
        Ok(())
    }
}

impl ExternalPositionModule for LeverageModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn module_issue_hook(&mut self, ledger: &mut dyn Ledger, basket: &BasketId, _quantity: u128) -> BasketResult<()> {
        self.sync(ledger, basket).map(|_| ())
    }

    fn module_redeem_hook(&mut self, ledger: &mut dyn Ledger, basket: &BasketId, _quantity: u128) -> BasketResult<()> {
        self.sync(ledger, basket).map(|_| ())
    }

    /// Borrow the issuer's debt share into the basket
    fn component_issue_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        settlement: &ModuleSettlement,
    ) -> BasketResult<()> {
        self.require_debt(settlement)?;
        self.market.borrow(ledger, basket, settlement.amount)
    }

    /// Repay the debt share the redeemer paid into the basket
    fn component_redeem_hook(
        &mut self,
        ledger: &mut dyn Ledger,
        basket: &BasketId,
        settlement: &ModuleSettlement,
    ) -> BasketResult<()> {
        self.require_debt(settlement)?;
        self.market.repay(ledger, basket, basket, settlement.amount)?;
        Ok(())
    }

    fn post_issue_hook(&mut self, ledger: &mut dyn Ledger, basket: &BasketId, _quantity: u128) -> BasketResult<()> {
        self.sync_debt(ledger, basket).map(|_| ())
    }

    fn post_redeem_hook(&mut self, ledger: &mut dyn Ledger, basket: &BasketId, _quantity: u128) -> BasketResult<()> {
        self.sync_debt(ledger, basket).map(|_| ())
    }

    fn checkpoint(&self) -> Box<dyn Any> {
        Box::new((self.market.clone(), self.baskets.clone()))
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(state) = checkpoint.downcast::<(LendingMarket, BTreeSet<BasketId>)>() {
            let (market, baskets) = *state;
            debug!(module = %HexAddress(&self.id), "Market book restored");
            self.market = market;
            self.baskets = baskets;
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
