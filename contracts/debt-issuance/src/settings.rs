//! Fee Settings
//!
//! Per-basket issuance configuration, written once by the manager on
//! initialization and afterwards only through the bounded fee setters.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use basket_common::{
    check,
    constants::fees::MAX_MANAGER_FEE_CEILING,
    errors::{BasketError, BasketResult},
    types::{Address, FlowDirection},
    validation::{require_fee_within, require_valid_address},
};

/// Issuance configuration of one basket token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct IssuanceSettings {
    /// Upper bound for both manager fees; fixed at initialization
    pub max_manager_fee: u128,
    /// Fee charged on issuance (1e18 = 100%)
    pub manager_issue_fee: u128,
    /// Fee charged on redemption (1e18 = 100%)
    pub manager_redeem_fee: u128,
    /// Receives the manager's share of fees
    pub fee_recipient: Address,
    /// Hook invoked before every issuance
    pub manager_issuance_hook: Option<Address>,
}

impl IssuanceSettings {
    /// Settings without a manager issuance hook
    pub fn new(
        max_manager_fee: u128,
        manager_issue_fee: u128,
        manager_redeem_fee: u128,
        fee_recipient: Address,
    ) -> Self {
        Self {
            max_manager_fee,
            manager_issue_fee,
            manager_redeem_fee,
            fee_recipient,
            manager_issuance_hook: None,
        }
    }

    /// Attach a manager issuance hook
    pub fn with_hook(mut self, hook: Address) -> Self {
        self.manager_issuance_hook = Some(hook);
        self
    }

    /// Check the settings are internally consistent
    pub fn validate(&self) -> BasketResult<()> {
        check!(
            self.max_manager_fee <= MAX_MANAGER_FEE_CEILING,
            BasketError::FeeExceedsMaximum {
                fee: self.max_manager_fee,
                maximum: MAX_MANAGER_FEE_CEILING,
            }
        );
        require_fee_within(self.manager_issue_fee, self.max_manager_fee)?;
        require_fee_within(self.manager_redeem_fee, self.max_manager_fee)?;
        require_valid_address(self.fee_recipient, "fee recipient must be non-zero")?;
        Ok(())
    }

    /// Manager fee for a direction
    pub fn fee_for(&self, direction: FlowDirection) -> u128 {
        match direction {
            FlowDirection::Issue => self.manager_issue_fee,
            FlowDirection::Redeem => self.manager_redeem_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_validate() {
        let settings = IssuanceSettings::new(ONE / 10, ONE / 100, ONE / 200, [1u8; 32]);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.fee_for(FlowDirection::Issue), ONE / 100);
        assert_eq!(settings.fee_for(FlowDirection::Redeem), ONE / 200);
    }

    #[test]
    fn test_validate_fee_above_max() {
        let settings = IssuanceSettings::new(ONE / 10, ONE / 5, 0, [1u8; 32]);
        assert_eq!(
            settings.validate(),
            Err(BasketError::FeeExceedsMaximum { fee: ONE / 5, maximum: ONE / 10 })
        );
    }

    #[test]
    fn test_validate_max_above_ceiling() {
        let settings = IssuanceSettings::new(2 * ONE, 0, 0, [1u8; 32]);
        assert!(matches!(settings.validate(), Err(BasketError::FeeExceedsMaximum { .. })));
    }

    #[test]
    fn test_validate_zero_recipient() {
        let settings = IssuanceSettings::new(ONE, 0, 0, [0u8; 32]).with_hook([3u8; 32]);
        assert!(matches!(settings.validate(), Err(BasketError::InvalidAddress { .. })));
        assert_eq!(settings.manager_issuance_hook, Some([3u8; 32]));
    }
}
