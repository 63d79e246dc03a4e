//! Integration Tests
//!
//! Levered baskets issued and redeemed through the debt issuance engine,
//! with interest accrual and liquidation happening between calls.

#[cfg(test)]
mod tests {
    use crate::*;

    use std::any::Any;

    use basket_common::{
        constants::domains,
        ledger::{BasketToken, TokenBank},
        math::{precise_div, precise_mul},
        types::{derive_address, FeeBreakdown},
    };
    use basket_debt_issuance::{CapabilityRegistry, IssuanceSettings, StaticController};
    use basket_token::BasketStore;
    use proptest::prelude::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    const MANAGER: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];
    const LIQUIDATOR: Address = [5u8; 32];
    const FEE_RECIPIENT: Address = [4u8; 32];
    const PROTOCOL: Address = [9u8; 32];
    const MARKET: Address = [50u8; 32];

    const WETH: Address = [10u8; 32];
    const USDC: Address = [11u8; 32];

    fn engine_id() -> ModuleId {
        derive_address(domains::MODULE, b"debt-issuance")
    }

    fn lever_id() -> ModuleId {
        derive_address(domains::MODULE, b"leverage")
    }

    fn market_config() -> MarketConfig {
        MarketConfig {
            collateral: WETH,
            debt_token: USDC,
            rate_per_period: ONE / 100,
            collateral_price: 2_000 * ONE,
            liquidation_threshold: 8 * ONE / 10,
            liquidation_bonus: ONE / 20,
        }
    }

    // ============================================================================
    // Test Environment
    // ============================================================================

    struct Env {
        store: BasketStore,
        engine: DebtIssuanceModule<StaticController>,
        caps: CapabilityRegistry,
        basket: BasketId,
    }

    impl Env {
        /// One WETH per token, engine and leverage module initialized, 10 tokens issued to Alice
        fn new() -> Self {
            let mut store = BasketStore::new();
            let basket = store.create_basket(MANAGER, "LEV", &[(WETH, ONE)]).unwrap();
            store.add_module(&basket, &MANAGER, &engine_id()).unwrap();
            store.add_module(&basket, &MANAGER, &lever_id()).unwrap();
            store.mint_token(&USDC, &MARKET, 1_000_000 * ONE).unwrap();

            let mut controller = StaticController::new(PROTOCOL).unwrap();
            controller.add_basket(basket);
            controller.add_module(engine_id());
            controller.add_module(lever_id());

            let mut engine = DebtIssuanceModule::new(engine_id(), controller);
            engine
                .initialize(
                    &mut store,
                    &basket,
                    &MANAGER,
                    IssuanceSettings::new(ONE / 10, 0, 0, FEE_RECIPIENT),
                )
                .unwrap();

            let market = LendingMarket::new(MARKET, market_config()).unwrap();
            let mut module = LeverageModule::new(lever_id(), market);
            module.initialize(&mut store, &mut engine, &basket, &MANAGER).unwrap();

            let mut caps = CapabilityRegistry::new();
            caps.bind_module(Box::new(module));

            let mut env = Self { store, engine, caps, basket };
            env.fund(&ALICE, &WETH, 100 * ONE);
            env.issue(&ALICE, 10 * ONE, &ALICE).unwrap();
            env
        }

        fn fund(&mut self, holder: &Address, token: &Address, amount: u128) {
            self.store.mint_token(token, holder, amount).unwrap();
            self.store.approve(token, holder, &engine_id(), u128::MAX).unwrap();
        }

        fn lever(&mut self) -> &mut LeverageModule {
            self.caps.module_as::<LeverageModule>(&lever_id()).unwrap()
        }

        fn borrow(&mut self, amount: u128) -> BasketResult<()> {
            let basket = self.basket;
            let Env { store, caps, .. } = self;
            let module = caps.module_as::<LeverageModule>(&lever_id()).unwrap();
            store.transact(|ledger| module.borrow(ledger, &basket, &MANAGER, amount))
        }

        fn issue(&mut self, caller: &Address, quantity: u128, to: &Address) -> BasketResult<FeeBreakdown> {
            let basket = self.basket;
            let Env { store, engine, caps, .. } = self;
            store.transact(|ledger| engine.issue(ledger, caps, &basket, quantity, caller, to))
        }

        fn redeem(&mut self, caller: &Address, quantity: u128, to: &Address) -> BasketResult<FeeBreakdown> {
            let basket = self.basket;
            let Env { store, engine, caps, .. } = self;
            store.transact(|ledger| engine.redeem(ledger, caps, &basket, quantity, caller, to))
        }

        fn debt(&mut self) -> u128 {
            let basket = self.basket;
            self.lever().debt_of(&basket).unwrap()
        }

        fn debt_unit(&self) -> i128 {
            self.store
                .external_position_unit(&self.basket, &WETH, &lever_id())
                .unwrap()
        }

        fn default_unit(&self, component: &Address) -> u128 {
            self.store.default_position_unit(&self.basket, component).unwrap()
        }

        fn balance(&self, token: &Address, holder: &Address) -> u128 {
            self.store.balance_of(token, holder)
        }
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    #[test]
    fn test_initialize_registers_hook() {
        let env = Env::new();
        assert_eq!(env.engine.module_issuance_hooks(&env.basket), &[lever_id()]);
        assert_eq!(
            env.store.module_state(&env.basket, &lever_id()),
            ModuleState::Initialized
        );
        // No debt, no position
        assert_eq!(env.debt_unit(), 0);
    }

    #[test]
    fn test_initialize_manager_only() {
        let mut store = BasketStore::new();
        let basket = store.create_basket(MANAGER, "LEV", &[(WETH, ONE)]).unwrap();
        store.add_module(&basket, &MANAGER, &lever_id()).unwrap();
        let mut controller = StaticController::new(PROTOCOL).unwrap();
        controller.add_basket(basket);
        let mut engine = DebtIssuanceModule::new(engine_id(), controller);
        let mut module = LeverageModule::new(lever_id(), LendingMarket::new(MARKET, market_config()).unwrap());

        assert_eq!(
            module.initialize(&mut store, &mut engine, &basket, &ALICE),
            Err(BasketError::ManagerOnly { basket })
        );
        // Engine not initialized on the basket
        assert_eq!(
            module.initialize(&mut store, &mut engine, &basket, &MANAGER),
            Err(BasketError::InvalidBasket { basket })
        );
    }

    #[test]
    fn test_borrow_sets_positions() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();

        assert_eq!(env.balance(&USDC, &env.basket), 5_000 * ONE);
        assert_eq!(env.default_unit(&USDC), 500 * ONE);
        assert_eq!(env.debt_unit(), -(500 * ONE as i128));
        assert_eq!(env.debt(), 5_000 * ONE);

        let basket = env.basket;
        let module = env.caps.module_as::<LeverageModule>(&lever_id()).unwrap();
        assert_eq!(
            module.borrow(&mut env.store, &basket, &ALICE, ONE),
            Err(BasketError::ManagerOnly { basket })
        );
    }

    #[test]
    fn test_remove_requires_repaid_debt() {
        let mut env = Env::new();
        env.borrow(1_000 * ONE).unwrap();
        let basket = env.basket;

        {
            let Env { store, engine, caps, .. } = &mut env;
            let module = caps.module_as::<LeverageModule>(&lever_id()).unwrap();
            assert_eq!(
                module.remove(store, engine, &basket, &MANAGER),
                Err(BasketError::OutstandingDebt { remaining: 1_000 * ONE })
            );

            assert_eq!(module.repay(store, &basket, &MANAGER, 1_000 * ONE).unwrap(), 1_000 * ONE);
            module.remove(store, engine, &basket, &MANAGER).unwrap();
        }

        assert_eq!(env.default_unit(&USDC), 0);
        assert_eq!(env.store.module_state(&basket, &lever_id()), ModuleState::None);
        assert!(env.engine.module_issuance_hooks(&basket).is_empty());
        assert_eq!(env.store.components(&basket).unwrap(), vec![WETH]);

        // Engine can now be detached too
        env.engine.remove_module(&mut env.store, &basket, &MANAGER).unwrap();
    }

    // ============================================================================
    // Issue / Redeem
    // ============================================================================

    #[test]
    fn test_issue_borrows_debt_share() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.fund(&BOB, &WETH, 10 * ONE);
        env.fund(&BOB, &USDC, 500 * ONE);

        // 1. Quote: USDC is both held and owed per unit
        let (components, equity, debt) = env
            .engine
            .get_required_component_issuance_units(&env.store, &env.basket, ONE)
            .unwrap();
        assert_eq!(components, vec![WETH, USDC]);
        assert_eq!(equity, vec![ONE, 500 * ONE]);
        assert_eq!(debt, vec![0, 500 * ONE]);

        // 2. Issue
        env.issue(&BOB, ONE, &BOB).unwrap();

        // 3. Bob's USDC is paid in and borrowed back out
        assert_eq!(env.balance(&USDC, &BOB), 500 * ONE);
        assert_eq!(env.balance(&WETH, &BOB), 9 * ONE);
        assert_eq!(env.balance(&env.basket, &BOB), ONE);
        assert_eq!(env.debt(), 5_500 * ONE);
        assert_eq!(env.debt_unit(), -(500 * ONE as i128));
        assert_eq!(env.balance(&USDC, &env.basket), 5_500 * ONE);
    }

    #[test]
    fn test_redeem_repays_debt_share() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.fund(&BOB, &WETH, 10 * ONE);
        env.fund(&BOB, &USDC, 500 * ONE);
        env.issue(&BOB, ONE, &BOB).unwrap();

        env.redeem(&BOB, ONE, &BOB).unwrap();

        assert_eq!(env.balance(&env.basket, &BOB), 0);
        assert_eq!(env.balance(&WETH, &BOB), 10 * ONE);
        assert_eq!(env.balance(&USDC, &BOB), 500 * ONE);
        assert_eq!(env.debt(), 5_000 * ONE);
        assert_eq!(env.balance(&USDC, &MARKET), 995_000 * ONE);
    }

    #[test]
    fn test_interest_accrues_before_flows() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.fund(&BOB, &WETH, 10 * ONE);
        env.fund(&BOB, &USDC, 1_000 * ONE);

        // One period at 1%: 5000 -> 5050 owed, 505 per token
        env.lever().market_mut().elapse(1);
        let (_, _, stale) = env
            .engine
            .get_required_component_issuance_units(&env.store, &env.basket, ONE)
            .unwrap();
        assert_eq!(stale, vec![0, 500 * ONE]);

        env.issue(&BOB, ONE, &BOB).unwrap();

        // Paid 500 USDC of equity, borrowed 505 back
        assert_eq!(env.balance(&USDC, &BOB), 1_005 * ONE);
        assert_eq!(env.debt(), 5_555 * ONE);
        assert_eq!(env.debt_unit(), -(505 * ONE as i128));
    }

    #[test]
    fn test_redeem_without_debt_payment_reverts() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.store.approve(&USDC, &ALICE, &engine_id(), u128::MAX).unwrap();
        let before = env.store.clone();
        let debt = env.debt();

        // Alice never received USDC, so the debt pull fails
        assert!(matches!(
            env.redeem(&ALICE, ONE, &ALICE),
            Err(BasketError::InsufficientBalance { .. })
        ));
        assert_eq!(env.store, before);
        assert_eq!(env.debt(), debt);
    }

    /// Module that fails once supply has been minted
    struct RejectAfterMint;

    const REJECTER: ModuleId = [60u8; 32];

    impl ExternalPositionModule for RejectAfterMint {
        fn id(&self) -> ModuleId {
            REJECTER
        }

        fn module_issue_hook(&mut self, _ledger: &mut dyn Ledger, _basket: &BasketId, _quantity: u128) -> BasketResult<()> {
            Ok(())
        }

        fn module_redeem_hook(&mut self, _ledger: &mut dyn Ledger, _basket: &BasketId, _quantity: u128) -> BasketResult<()> {
            Ok(())
        }

        fn component_issue_hook(
            &mut self,
            _ledger: &mut dyn Ledger,
            _basket: &BasketId,
            _settlement: &ModuleSettlement,
        ) -> BasketResult<()> {
            Ok(())
        }

        fn component_redeem_hook(
            &mut self,
            _ledger: &mut dyn Ledger,
            _basket: &BasketId,
            _settlement: &ModuleSettlement,
        ) -> BasketResult<()> {
            Ok(())
        }

        fn post_issue_hook(&mut self, _ledger: &mut dyn Ledger, _basket: &BasketId, _quantity: u128) -> BasketResult<()> {
            Err(BasketError::HookRejected { hook: REJECTER, reason: "issuance paused" })
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_later_hook_failure_rolls_back_borrow() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.fund(&BOB, &WETH, 10 * ONE);
        env.fund(&BOB, &USDC, 500 * ONE);

        // Registered after the leverage module, so it fails after the borrow
        let basket = env.basket;
        env.engine.controller_mut().add_module(REJECTER);
        env.store.add_module(&basket, &MANAGER, &REJECTER).unwrap();
        env.store.initialize_module(&basket, &REJECTER).unwrap();
        env.caps.bind_module(Box::new(RejectAfterMint));
        env.engine
            .register_to_issuance_module(&env.store, &basket, &REJECTER)
            .unwrap();
        assert_eq!(env.engine.module_issuance_hooks(&basket), &[lever_id(), REJECTER]);

        env.lever().market_mut().elapse(1);
        let before = env.store.clone();
        let market_before = env.lever().market().clone();

        assert_eq!(
            env.issue(&BOB, ONE, &BOB),
            Err(BasketError::HookRejected { hook: REJECTER, reason: "issuance paused" })
        );
        assert_eq!(env.store, before);
        assert_eq!(env.lever().market(), &market_before);
        assert_eq!(env.balance(&USDC, &MARKET), 995_000 * ONE);

        // Once the failing module is gone the same issuance settles normally
        env.engine.unregister_from_issuance_module(&basket, &REJECTER).unwrap();
        env.issue(&BOB, ONE, &BOB).unwrap();
        assert_eq!(env.debt(), 5_555 * ONE);
        assert_eq!(env.balance(&USDC, &MARKET), 994_495 * ONE);
    }

    // ============================================================================
    // Liquidation
    // ============================================================================

    #[test]
    fn test_liquidation_resyncs_positions() {
        let mut env = Env::new();
        env.borrow(5_000 * ONE).unwrap();
        env.store.mint_token(&USDC, &LIQUIDATOR, 1_000 * ONE).unwrap();
        let basket = env.basket;

        // 10 WETH at 2000 with an 80% threshold supports 16000
        {
            let Env { store, caps, .. } = &mut env;
            let module = caps.module_as::<LeverageModule>(&lever_id()).unwrap();
            assert_eq!(
                module.liquidate(store, &basket, &LIQUIDATOR, 1_000 * ONE),
                Err(BasketError::NotLiquidatable)
            );
        }

        // 10 WETH at 600 supports 4800
        env.lever().market_mut().set_price(600 * ONE).unwrap();
        let result = {
            let Env { store, caps, .. } = &mut env;
            let module = caps.module_as::<LeverageModule>(&lever_id()).unwrap();
            store
                .transact(|ledger| module.liquidate(ledger, &basket, &LIQUIDATOR, 1_000 * ONE))
                .unwrap()
        };

        let expected_seized = precise_mul(precise_div(1_000 * ONE, 600 * ONE).unwrap(), ONE + ONE / 20).unwrap();
        assert_eq!(result.repaid, 1_000 * ONE);
        assert_eq!(result.seized, expected_seized);
        assert_eq!(env.balance(&WETH, &LIQUIDATOR), expected_seized);

        // Units now match what the basket actually holds and owes
        let remaining = 10 * ONE - expected_seized;
        assert_eq!(env.default_unit(&WETH), precise_div(remaining, 10 * ONE).unwrap());
        assert_eq!(env.debt_unit(), -(400 * ONE as i128));

        // Issuance after the liquidation uses the new units
        env.fund(&BOB, &WETH, 10 * ONE);
        env.fund(&BOB, &USDC, 500 * ONE);
        let (_, equity, debt) = env
            .engine
            .get_required_component_issuance_units(&env.store, &basket, ONE)
            .unwrap();
        assert_eq!(equity, vec![env.default_unit(&WETH), 500 * ONE]);
        assert_eq!(debt, vec![0, 400 * ONE]);
        env.issue(&BOB, ONE, &BOB).unwrap();
    }

    // ============================================================================
    // Properties
    // ============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_issue_redeem_round_trip_never_leaks_debt(
            borrowed in 1u128..10_000,
            quantity in 1u128..5_000,
        ) {
            let mut env = Env::new();
            env.borrow(borrowed * ONE).unwrap();
            let debt_before = env.debt();

            let quantity = quantity * ONE / 1_000;
            env.fund(&BOB, &WETH, 10 * ONE);
            env.fund(&BOB, &USDC, 10_000 * ONE);
            env.issue(&BOB, quantity, &BOB).unwrap();
            env.redeem(&BOB, quantity, &BOB).unwrap();

            // Redeemers repay at least what issuers borrowed
            prop_assert!(env.debt() <= debt_before);
            prop_assert!(env.balance(&WETH, &BOB) <= 10 * ONE);
            prop_assert!(env.balance(&USDC, &BOB) <= 10_000 * ONE);
        }
    }
}
