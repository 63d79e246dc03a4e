//! Basket Common Library
//!
//! Shared types, constants, and utilities for the basket issuance contracts.
//! Every crate in the workspace reads and writes positions through the
//! interfaces defined here.
//!
//! ## Contents
//!
//! - **Precise Math**: 18-decimal fixed-point multiply/divide with explicit
//!   floor or ceiling rounding
//! - **Types**: Position units, flow records, fee breakdowns, module states
//! - **Ledger Interfaces**: The basket token and token bank capabilities the
//!   issuance engine consumes
//! - **Position Library**: Default-unit recomputation from actual balances and
//!   collateralization audits
//! - **Events**: Issuance, redemption, and fee configuration events
//! - **Validation**: `check!` and common precondition helpers
//!
//! ## Rounding
//!
//! Flows paid BY the caller round up; flows paid TO the caller round down.
//! Debt flows round up in both directions.
//!
//! This crate is `no_std` compatible for WASM compilation when built
//! without the default `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export Vec for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::vec::Vec;
#[cfg(feature = "std")]
pub use std::vec::Vec;

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod validation;
pub mod ledger;
pub mod position;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use ledger::*;
