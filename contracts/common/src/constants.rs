//! Protocol Constants
//!
//! Fixed-point precision, fee bounds, and controller indices shared by the
//! issuance engine and its modules.

/// Basket token metadata
pub mod token {
    /// Decimal places of every basket token
    pub const DECIMALS: u8 = 18;
    /// One whole basket token in base units
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Precision constants
pub mod precision {
    /// Fixed-point unit (1e18 = 1.0 = 100%)
    pub const PRECISE_UNIT: u128 = 1_000_000_000_000_000_000;

    /// Decimal places of the fixed-point unit
    pub const PRECISE_DECIMALS: u8 = 18;
}

/// Fee Configuration (fixed-point, 1e18 = 100%)
pub mod fees {
    use super::precision::PRECISE_UNIT;

    /// Upper bound for any manager's `max_manager_fee` (100%)
    pub const MAX_MANAGER_FEE_CEILING: u128 = PRECISE_UNIT;

    /// Controller fee slot holding the protocol's share of issuance fees
    pub const PROTOCOL_FEE_SPLIT_INDEX: usize = 0;

    /// Upper bound for the protocol's share of a manager fee (100%)
    pub const MAX_PROTOCOL_FEE_SPLIT: u128 = PRECISE_UNIT;
}

/// Address derivation domains
pub mod domains {
    /// Domain tag for basket token addresses
    pub const BASKET: &[u8] = b"basket.token";
    /// Domain tag for module addresses
    pub const MODULE: &[u8] = b"basket.module";
    /// Domain tag for hook addresses
    pub const HOOK: &[u8] = b"basket.hook";
}
