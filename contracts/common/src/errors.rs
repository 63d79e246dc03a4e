//! Error Types for Basket Issuance
//!
//! Typed errors carrying the offending values. Precondition violations are
//! raised before any state mutation; collaborator failures are passed through
//! unchanged.

use core::fmt;

use crate::types::{Address, FlowDirection, HexAddress as Hex};

/// Result type alias for basket operations
pub type BasketResult<T> = Result<T, BasketError>;

/// Main error enum for all basket issuance errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasketError {
    // ============ Basket Errors ============
    /// Basket is unknown or the engine is not initialized on it
    InvalidBasket { basket: Address },

    /// Engine is not in the pending state on the basket
    ModuleNotPending { basket: Address, module: Address },

    /// Module is not initialized on the basket
    ModuleNotInitialized { basket: Address, module: Address },

    /// Basket already exists
    BasketAlreadyExists { basket: Address },

    // ============ Amount Errors ============
    /// Zero quantity not allowed
    ZeroAmount { direction: FlowDirection },

    /// Insufficient token balance for a transfer or burn
    InsufficientBalance { available: u128, requested: u128 },

    /// Insufficient allowance for a delegated transfer
    InsufficientAllowance { available: u128, requested: u128 },

    /// Total supply would exceed a configured cap
    SupplyCapExceeded { cap: u128, requested: u128 },

    // ============ Authorization Errors ============
    /// Caller is not the expected account
    Unauthorized { expected: Address, actual: Address },

    /// Only the basket manager can perform this action
    ManagerOnly { basket: Address },

    // ============ Fee Errors ============
    /// Fee exceeds the configured maximum
    FeeExceedsMaximum { fee: u128, maximum: u128 },

    /// New value equals the current value
    SameValue { param: &'static str },

    // ============ Hook Registry Errors ============
    /// Module is already registered as an issuance hook
    AlreadyRegistered { module: Address },

    /// Module is not registered as an issuance hook
    NotRegistered { module: Address },

    /// Engine cannot be removed while modules are registered
    RegisteredModulesRemain { count: usize },

    /// No capability is bound to the module address
    ModuleNotFound { module: Address },

    /// No capability is bound to the hook address
    HookNotFound { hook: Address },

    /// A hook refused the operation
    HookRejected { hook: Address, reason: &'static str },

    // ============ Position Errors ============
    /// Component is not part of the basket
    ComponentNotFound { component: Address },

    /// Basket balance does not cover its default position
    PositionShortfall {
        component: Address,
        required: u128,
        available: u128,
    },

    /// Module still carries debt on the basket
    OutstandingDebt { remaining: u128 },

    /// Lending market cannot fund the borrow
    InsufficientLiquidity { available: u128, requested: u128 },

    /// Position is healthy and cannot be liquidated
    NotLiquidatable,

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Input Validation Errors ============
    /// Invalid input parameter
    InvalidInput { param: &'static str, reason: &'static str },

    /// Invalid address (e.g., zero address)
    InvalidAddress { reason: &'static str },

    // ============ State Errors ============
    /// Invalid state transition
    InvalidStateTransition,
}

impl BasketError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBasket { .. } => "E001_INVALID_BASKET",
            Self::ModuleNotPending { .. } => "E002_MODULE_NOT_PENDING",
            Self::ModuleNotInitialized { .. } => "E003_MODULE_NOT_INIT",
            Self::BasketAlreadyExists { .. } => "E004_BASKET_EXISTS",
            Self::ZeroAmount { .. } => "E010_ZERO_AMOUNT",
            Self::InsufficientBalance { .. } => "E011_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "E012_INSUFFICIENT_ALLOWANCE",
            Self::SupplyCapExceeded { .. } => "E013_SUPPLY_CAP",
            Self::Unauthorized { .. } => "E020_UNAUTHORIZED",
            Self::ManagerOnly { .. } => "E021_MANAGER_ONLY",
            Self::FeeExceedsMaximum { .. } => "E030_FEE_EXCEEDS_MAX",
            Self::SameValue { .. } => "E031_SAME_VALUE",
            Self::AlreadyRegistered { .. } => "E040_ALREADY_REGISTERED",
            Self::NotRegistered { .. } => "E041_NOT_REGISTERED",
            Self::RegisteredModulesRemain { .. } => "E042_MODULES_REMAIN",
            Self::ModuleNotFound { .. } => "E043_MODULE_NOT_FOUND",
            Self::HookNotFound { .. } => "E044_HOOK_NOT_FOUND",
            Self::HookRejected { .. } => "E045_HOOK_REJECTED",
            Self::ComponentNotFound { .. } => "E050_COMPONENT_NOT_FOUND",
            Self::PositionShortfall { .. } => "E051_POSITION_SHORTFALL",
            Self::OutstandingDebt { .. } => "E052_OUTSTANDING_DEBT",
            Self::InsufficientLiquidity { .. } => "E053_INSUFFICIENT_LIQUIDITY",
            Self::NotLiquidatable => "E054_NOT_LIQUIDATABLE",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvalidInput { .. } => "E090_INVALID_INPUT",
            Self::InvalidAddress { .. } => "E091_INVALID_ADDRESS",
            Self::InvalidStateTransition => "E100_INVALID_STATE",
        }
    }

    /// Returns true if this error is recoverable (user can fix it)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } // Get more funds
                | Self::InsufficientAllowance { .. } // Approve more
                | Self::SupplyCapExceeded { .. } // Issue less
        )
    }
}

impl fmt::Display for BasketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBasket { .. } => {
                f.write_str("Must be a valid and initialized basket token")
            }
            Self::ModuleNotPending { module, .. } => {
                write!(f, "Module {} must be pending", Hex(module))
            }
            Self::ModuleNotInitialized { module, .. } => {
                write!(f, "Module {} must be initialized", Hex(module))
            }
            Self::BasketAlreadyExists { basket } => {
                write!(f, "Basket {} already exists", Hex(basket))
            }
            Self::ZeroAmount { direction: FlowDirection::Issue } => {
                f.write_str("Issue quantity must be > 0")
            }
            Self::ZeroAmount { direction: FlowDirection::Redeem } => {
                f.write_str("Redeem quantity must be > 0")
            }
            Self::InsufficientBalance { available, requested } => {
                write!(f, "Insufficient balance: {} < {}", available, requested)
            }
            Self::InsufficientAllowance { available, requested } => {
                write!(f, "Insufficient allowance: {} < {}", available, requested)
            }
            Self::SupplyCapExceeded { cap, requested } => {
                write!(f, "Supply cap exceeded: {} > {}", requested, cap)
            }
            Self::Unauthorized { expected, actual } => {
                write!(f, "Unauthorized: expected {}, got {}", Hex(expected), Hex(actual))
            }
            Self::ManagerOnly { .. } => f.write_str("Must be the basket manager"),
            Self::FeeExceedsMaximum { fee, maximum } => {
                write!(f, "Fee must not exceed maximum fee: {} > {}", fee, maximum)
            }
            Self::SameValue { param } => write!(f, "Same {} value", param),
            Self::AlreadyRegistered { .. } => f.write_str("Module already registered."),
            Self::NotRegistered { .. } => f.write_str("Module not registered."),
            Self::RegisteredModulesRemain { .. } => {
                f.write_str("Registered modules must be removed.")
            }
            Self::ModuleNotFound { module } => {
                write!(f, "No module bound at {}", Hex(module))
            }
            Self::HookNotFound { hook } => write!(f, "No hook bound at {}", Hex(hook)),
            Self::HookRejected { reason, .. } => write!(f, "Hook rejected: {}", reason),
            Self::ComponentNotFound { component } => {
                write!(f, "Component {} not in basket", Hex(component))
            }
            Self::PositionShortfall { component, required, available } => write!(
                f,
                "Component {} undercollateralized: {} < {}",
                Hex(component),
                available,
                required
            ),
            Self::OutstandingDebt { remaining } => {
                write!(f, "Debt must be repaid: {} outstanding", remaining)
            }
            Self::InsufficientLiquidity { available, requested } => {
                write!(f, "Insufficient liquidity: {} < {}", available, requested)
            }
            Self::NotLiquidatable => f.write_str("Position is not liquidatable"),
            Self::Overflow => f.write_str("Arithmetic overflow"),
            Self::Underflow => f.write_str("Arithmetic underflow"),
            Self::DivisionByZero => f.write_str("Division by zero"),
            Self::InvalidInput { param, reason } => write!(f, "Invalid {}: {}", param, reason),
            Self::InvalidAddress { reason } => write!(f, "Invalid address: {}", reason),
            Self::InvalidStateTransition => f.write_str("Invalid state transition"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BasketError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            BasketError::InvalidBasket { basket: [0u8; 32] },
            BasketError::ZeroAmount { direction: FlowDirection::Issue },
            BasketError::FeeExceedsMaximum { fee: 2, maximum: 1 },
            BasketError::RegisteredModulesRemain { count: 1 },
            BasketError::PositionShortfall {
                component: [1u8; 32],
                required: 2,
                available: 1,
            },
            BasketError::Overflow,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_revert_messages() {
        assert_eq!(
            BasketError::InvalidBasket { basket: [9u8; 32] }.to_string(),
            "Must be a valid and initialized basket token"
        );
        assert_eq!(
            BasketError::ZeroAmount { direction: FlowDirection::Issue }.to_string(),
            "Issue quantity must be > 0"
        );
        assert_eq!(
            BasketError::ZeroAmount { direction: FlowDirection::Redeem }.to_string(),
            "Redeem quantity must be > 0"
        );
        assert_eq!(
            BasketError::RegisteredModulesRemain { count: 2 }.to_string(),
            "Registered modules must be removed."
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(BasketError::InsufficientAllowance { available: 0, requested: 1 }.is_recoverable());
        assert!(!BasketError::RegisteredModulesRemain { count: 1 }.is_recoverable());
    }
}
