//! Lending Market
//!
//! Minimal single-asset lending market. Debt is recorded in scaled units
//! against a borrow index that grows with elapsed interest periods; the
//! actual debt of a borrower is `scaled * index`, rounded up. Liquidity and
//! repayments sit at the market's own address in the token bank.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use basket_common::{
    check,
    constants::precision::PRECISE_UNIT,
    errors::{BasketError, BasketResult},
    ledger::Ledger,
    math::{precise_div, precise_div_ceil, precise_mul, precise_mul_ceil, safe_add, safe_mul, safe_sub},
    types::{Address, ComponentId, HexAddress},
    validation::require_valid_address,
};

/// Static parameters of a market (fixed-point, 1e18 = 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MarketConfig {
    /// Token accepted as collateral
    pub collateral: ComponentId,
    /// Token lent out
    pub debt_token: Address,
    /// Simple interest charged per elapsed period
    pub rate_per_period: u128,
    /// Debt tokens per whole collateral token
    pub collateral_price: u128,
    /// Share of collateral value that may be borrowed before liquidation
    pub liquidation_threshold: u128,
    /// Extra collateral paid to liquidators
    pub liquidation_bonus: u128,
}

impl MarketConfig {
    pub fn validate(&self) -> BasketResult<()> {
        require_valid_address(self.collateral, "collateral must be non-zero")?;
        require_valid_address(self.debt_token, "debt token must be non-zero")?;
        check!(
            self.collateral != self.debt_token,
            BasketError::InvalidInput { param: "debt_token", reason: "Must differ from collateral" }
        );
        check!(
            self.collateral_price > 0,
            BasketError::InvalidInput { param: "collateral_price", reason: "Price must be positive" }
        );
        check!(
            self.liquidation_threshold > 0 && self.liquidation_threshold <= PRECISE_UNIT,
            BasketError::InvalidInput { param: "liquidation_threshold", reason: "Must be in (0, 1]" }
        );
        Ok(())
    }
}

/// Result of a liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liquidation {
    pub repaid: u128,
    pub seized: u128,
}

/// In-memory lending market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LendingMarket {
    address: Address,
    config: MarketConfig,
    borrow_index: u128,
    pending_periods: u64,
    scaled_debt: BTreeMap<Address, u128>,
}

impl LendingMarket {
    pub fn new(address: Address, config: MarketConfig) -> BasketResult<Self> {
        require_valid_address(address, "market address must be non-zero")?;
        config.validate()?;
        Ok(Self {
            address,
            config,
            borrow_index: PRECISE_UNIT,
            pending_periods: 0,
            scaled_debt: BTreeMap::new(),
        })
    }

    /// Address holding the market's liquidity
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn borrow_index(&self) -> u128 {
        self.borrow_index
    }

    /// Let interest periods pass; folded into the index by [`Self::accrue`]
    pub fn elapse(&mut self, periods: u64) {
        self.pending_periods = self.pending_periods.saturating_add(periods);
    }

    /// Fold elapsed periods into the borrow index; returns the new index
    pub fn accrue(&mut self) -> BasketResult<u128> {
        if self.pending_periods == 0 {
            return Ok(self.borrow_index);
        }
        let interest = safe_mul(self.config.rate_per_period, u128::from(self.pending_periods))?;
        let index = precise_mul_ceil(self.borrow_index, safe_add(PRECISE_UNIT, interest)?)?;

        debug!(
            periods = self.pending_periods,
            from = self.borrow_index,
            to = index,
            "Borrow index accrued"
        );
        self.borrow_index = index;
        self.pending_periods = 0;
        Ok(index)
    }

    pub fn set_price(&mut self, price: u128) -> BasketResult<()> {
        check!(
            price > 0,
            BasketError::InvalidInput { param: "collateral_price", reason: "Price must be positive" }
        );
        self.config.collateral_price = price;
        Ok(())
    }

    /// Current debt of a borrower, rounded up
    pub fn debt_of(&self, borrower: &Address) -> BasketResult<u128> {
        match self.scaled_debt.get(borrower) {
            Some(scaled) => precise_mul_ceil(*scaled, self.borrow_index),
            None => Ok(0),
        }
    }

    /// Lend `amount` of the debt token to `borrower`
    pub fn borrow(
        &mut self,
        ledger: &mut dyn Ledger,
        borrower: &Address,
        amount: u128,
    ) -> BasketResult<()> {
        require_amount(amount)?;
        let available = ledger.balance_of(&self.config.debt_token, &self.address);
        check!(
            available >= amount,
            BasketError::InsufficientLiquidity { available, requested: amount }
        );

        let scaled = precise_div_ceil(amount, self.borrow_index)?;
        ledger.transfer(&self.config.debt_token, &self.address, borrower, amount)?;
        let entry = self.scaled_debt.entry(*borrower).or_insert(0);
        *entry = safe_add(*entry, scaled)?;

        debug!(borrower = %HexAddress(borrower), amount, "Borrowed");
        Ok(())
    }

    /// Repay up to `amount` of `borrower`'s debt from `payer`; returns the amount repaid
    pub fn repay(
        &mut self,
        ledger: &mut dyn Ledger,
        payer: &Address,
        borrower: &Address,
        amount: u128,
    ) -> BasketResult<u128> {
        let debt = self.debt_of(borrower)?;
        let repaid = amount.min(debt);
        if repaid == 0 {
            return Ok(0);
        }

        ledger.transfer(&self.config.debt_token, payer, &self.address, repaid)?;
        if repaid == debt {
            self.scaled_debt.remove(borrower);
        } else {
            let burned = precise_div(repaid, self.borrow_index)?;
            let entry = self.scaled_debt.entry(*borrower).or_insert(0);
            *entry = safe_sub(*entry, burned)?;
        }

        debug!(borrower = %HexAddress(borrower), repaid, "Repaid");
        Ok(repaid)
    }

    /// Largest debt `collateral` supports before liquidation
    pub fn borrow_limit(&self, collateral: u128) -> BasketResult<u128> {
        let value = precise_mul(collateral, self.config.collateral_price)?;
        precise_mul(value, self.config.liquidation_threshold)
    }

    /// True if the borrower's debt exceeds its borrow limit
    pub fn is_liquidatable(&self, ledger: &dyn Ledger, borrower: &Address) -> BasketResult<bool> {
        let collateral = ledger.balance_of(&self.config.collateral, borrower);
        Ok(self.debt_of(borrower)? > self.borrow_limit(collateral)?)
    }

    /// Collateral paid out for repaying `repaid` debt, bonus included
    pub fn seize_amount(&self, repaid: u128) -> BasketResult<u128> {
        let base = precise_div(repaid, self.config.collateral_price)?;
        precise_mul(base, safe_add(PRECISE_UNIT, self.config.liquidation_bonus)?)
    }

    /// Repay debt of an unhealthy borrower and seize its collateral.
    ///
    /// Collateral is moved straight out of the borrower's balance, capped at
    /// what it holds.
    pub fn liquidate(
        &mut self,
        ledger: &mut dyn Ledger,
        liquidator: &Address,
        borrower: &Address,
        amount: u128,
    ) -> BasketResult<Liquidation> {
        require_amount(amount)?;
        check!(self.is_liquidatable(&*ledger, borrower)?, BasketError::NotLiquidatable);

        let repaid = self.repay(ledger, liquidator, borrower, amount)?;
        let held = ledger.balance_of(&self.config.collateral, borrower);
        let seized = self.seize_amount(repaid)?.min(held);
        ledger.transfer(&self.config.collateral, borrower, liquidator, seized)?;

        Ok(Liquidation { repaid, seized })
    }
}

fn require_amount(amount: u128) -> BasketResult<()> {
    check!(
        amount > 0,
        BasketError::InvalidInput { param: "amount", reason: "Amount must be positive" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_common::ledger::TokenBank;
    use basket_token::BasketStore;

    const ONE: u128 = PRECISE_UNIT;
    const MARKET: Address = [50u8; 32];
    const BORROWER: Address = [2u8; 32];
    const LIQUIDATOR: Address = [3u8; 32];
    const WETH: Address = [10u8; 32];
    const USDC: Address = [11u8; 32];

    fn config() -> MarketConfig {
        MarketConfig {
            collateral: WETH,
            debt_token: USDC,
            rate_per_period: ONE / 100,
            collateral_price: 2_000 * ONE,
            liquidation_threshold: 8 * ONE / 10,
            liquidation_bonus: ONE / 20,
        }
    }

    fn setup() -> (BasketStore, LendingMarket) {
        let mut store = BasketStore::new();
        store.mint_token(&USDC, &MARKET, 100_000 * ONE).unwrap();
        store.mint_token(&WETH, &BORROWER, 10 * ONE).unwrap();
        (store, LendingMarket::new(MARKET, config()).unwrap())
    }

    #[test]
    fn test_invalid_config() {
        let mut bad = config();
        bad.liquidation_threshold = 2 * ONE;
        assert!(LendingMarket::new(MARKET, bad).is_err());

        let mut bad = config();
        bad.debt_token = WETH;
        assert!(LendingMarket::new(MARKET, bad).is_err());

        assert!(matches!(
            LendingMarket::new([0u8; 32], config()),
            Err(BasketError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_borrow_and_repay() {
        let (mut store, mut market) = setup();
        market.borrow(&mut store, &BORROWER, 5_000 * ONE).unwrap();
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 5_000 * ONE);
        assert_eq!(store.balance_of(&USDC, &BORROWER), 5_000 * ONE);

        let repaid = market.repay(&mut store, &BORROWER, &BORROWER, 2_000 * ONE).unwrap();
        assert_eq!(repaid, 2_000 * ONE);
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 3_000 * ONE);

        // Overpayment is capped at the outstanding debt
        let repaid = market.repay(&mut store, &BORROWER, &BORROWER, 10_000 * ONE).unwrap();
        assert_eq!(repaid, 3_000 * ONE);
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 0);
        assert_eq!(store.balance_of(&USDC, &MARKET), 100_000 * ONE);
    }

    #[test]
    fn test_borrow_beyond_liquidity() {
        let (mut store, mut market) = setup();
        assert_eq!(
            market.borrow(&mut store, &BORROWER, 200_000 * ONE),
            Err(BasketError::InsufficientLiquidity {
                available: 100_000 * ONE,
                requested: 200_000 * ONE,
            })
        );
    }

    #[test]
    fn test_interest_accrual() {
        let (mut store, mut market) = setup();
        market.borrow(&mut store, &BORROWER, 1_000 * ONE).unwrap();

        // Elapsed periods only count once accrued
        market.elapse(3);
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 1_000 * ONE);
        assert_eq!(market.accrue().unwrap(), 103 * ONE / 100);
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 1_030 * ONE);

        // Nothing pending
        assert_eq!(market.accrue().unwrap(), 103 * ONE / 100);
    }

    #[test]
    fn test_liquidation() {
        let (mut store, mut market) = setup();
        market.borrow(&mut store, &BORROWER, 10_000 * ONE).unwrap();
        store.mint_token(&USDC, &LIQUIDATOR, 1_000 * ONE).unwrap();

        // 10 WETH at 2000 supports 16000
        assert!(!market.is_liquidatable(&store, &BORROWER).unwrap());
        assert_eq!(
            market.liquidate(&mut store, &LIQUIDATOR, &BORROWER, 1_000 * ONE),
            Err(BasketError::NotLiquidatable)
        );

        // 10 WETH at 1000 supports 8000
        market.set_price(1_000 * ONE).unwrap();
        let result = market
            .liquidate(&mut store, &LIQUIDATOR, &BORROWER, 1_000 * ONE)
            .unwrap();
        assert_eq!(result.repaid, 1_000 * ONE);
        assert_eq!(result.seized, 105 * ONE / 100);
        assert_eq!(store.balance_of(&WETH, &LIQUIDATOR), 105 * ONE / 100);
        assert_eq!(market.debt_of(&BORROWER).unwrap(), 9_000 * ONE);
    }
}
