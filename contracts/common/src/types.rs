//! Core Types for Basket Issuance
//!
//! Position units, flow records and fee breakdowns shared by the issuance
//! engine, the basket token ledger and external position modules.

use crate::errors::{BasketError, BasketResult};
use crate::math::{precise_mul_rounded, Rounding};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use core::fmt;
use sha2::{Digest, Sha256};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for basket token identifiers
pub type BasketId = Address;

/// Type alias for component token identifiers
pub type ComponentId = Address;

/// Type alias for module identifiers
pub type ModuleId = Address;

/// The null address
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Derive a deterministic address from a domain tag and seed bytes
pub fn derive_address(domain: &[u8], seed: &[u8]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(seed);
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

/// Short hex rendering of an address for logs and messages
#[derive(Debug, Clone, Copy)]
pub struct HexAddress<'a>(pub &'a Address);

impl fmt::Display for HexAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("..")
    }
}

// ============ Module State ============

/// Lifecycle of a module on a basket token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum ModuleState {
    /// Module was never added (or has been removed)
    #[default]
    None,
    /// Manager added the module; it has not initialized yet
    Pending,
    /// Module initialized and may edit positions
    Initialized,
}

// ============ Positions ============

/// Per-unit quantity held through an external module.
///
/// `Equity` is bonus collateral of the component itself and behaves like
/// additional default units. `Debt` is an obligation denominated in `token`,
/// which may differ from the component the position is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum PositionUnit {
    /// Additional equity units of the component
    Equity(u128),
    /// Debt units owed in `token`
    Debt { token: ComponentId, unit: u128 },
}

impl PositionUnit {
    /// Raw magnitude of the unit
    pub fn magnitude(&self) -> u128 {
        match self {
            Self::Equity(unit) => *unit,
            Self::Debt { unit, .. } => *unit,
        }
    }

    /// True when the position carries nothing
    pub fn is_zero(&self) -> bool {
        self.magnitude() == 0
    }

    /// Signed view: equity positive, debt negative
    pub fn signed(&self) -> BasketResult<i128> {
        let magnitude = i128::try_from(self.magnitude()).map_err(|_| BasketError::Overflow)?;
        Ok(match self {
            Self::Equity(_) => magnitude,
            Self::Debt { .. } => -magnitude,
        })
    }
}

/// External position of one module on one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExternalPosition {
    /// Module owning the position
    pub module: ModuleId,
    /// Per-unit quantity
    pub unit: PositionUnit,
    /// Opaque module data
    pub data: Vec<u8>,
}

/// Full position of one component in a basket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ComponentPosition {
    /// Component token
    pub component: ComponentId,
    /// Default (equity) units held directly by the basket
    pub default_unit: u128,
    /// External positions in module registration order
    pub external: Vec<ExternalPosition>,
}

impl ComponentPosition {
    /// Create a component position with only a default unit
    pub fn new(component: ComponentId, default_unit: u128) -> Self {
        Self {
            component,
            default_unit,
            external: Vec::new(),
        }
    }

    /// True when neither a default nor an external position remains
    pub fn is_empty(&self) -> bool {
        self.default_unit == 0 && self.external.is_empty()
    }

    /// External position of a module, if any
    pub fn external_position(&self, module: &ModuleId) -> Option<&ExternalPosition> {
        self.external.iter().find(|p| &p.module == module)
    }
}

// ============ Flows ============

/// Direction of a flow computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum FlowDirection {
    /// Basket tokens are minted; equity flows in
    Issue,
    /// Basket tokens are burned; equity flows out
    Redeem,
}

impl FlowDirection {
    /// Rounding for equity: paid by the caller on issue, to the caller on redeem
    pub fn equity_rounding(&self) -> Rounding {
        match self {
            Self::Issue => Rounding::Ceil,
            Self::Redeem => Rounding::Floor,
        }
    }

    /// Rounding for debt: always up
    pub fn debt_rounding(&self) -> Rounding {
        Rounding::Ceil
    }

    /// Equity notional for `quantity` basket units at `unit`
    pub fn equity_flow(&self, quantity: u128, unit: u128) -> BasketResult<u128> {
        precise_mul_rounded(quantity, unit, self.equity_rounding())
    }

    /// Debt notional for `quantity` basket units at `unit`
    pub fn debt_flow(&self, quantity: u128, unit: u128) -> BasketResult<u128> {
        precise_mul_rounded(quantity, unit, self.debt_rounding())
    }
}

/// What a module settles for one of its external positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum SettlementKind {
    /// Bonus equity that entered or leaves through the basket
    Equity,
    /// Debt the module borrows (issue) or retires (redeem)
    Debt,
}

/// One module's share of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ModuleSettlement {
    /// Module responsible for the movement
    pub module: ModuleId,
    /// Component the external position is attached to
    pub component: ComponentId,
    /// Token that moves
    pub token: ComponentId,
    /// Settlement kind
    pub kind: SettlementKind,
    /// Notional to move
    pub amount: u128,
}

/// Flow of one token slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ComponentFlow {
    /// Token of the slot
    pub component: ComponentId,
    /// Equity notional moved by the basket itself
    pub equity: u128,
    /// Debt notional moved by modules
    pub debt: u128,
}

impl ComponentFlow {
    /// Empty flow for a token
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            equity: 0,
            debt: 0,
        }
    }

    /// True when nothing moves
    pub fn is_empty(&self) -> bool {
        self.equity == 0 && self.debt == 0
    }
}

/// Flows for one issuance or redemption, computed fresh from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FlowRecord {
    /// Direction of the computation
    pub direction: FlowDirection,
    /// Fee-adjusted basket quantity the flows are computed on
    pub adjusted_quantity: u128,
    /// One slot per moving token, in component order then appended debt tokens
    pub flows: Vec<ComponentFlow>,
    /// Per-module settlements in component then module order
    pub settlements: Vec<ModuleSettlement>,
}

impl FlowRecord {
    /// Token of every slot
    pub fn components(&self) -> Vec<ComponentId> {
        self.flows.iter().map(|f| f.component).collect()
    }

    /// Equity notional of every slot
    pub fn equity_flows(&self) -> Vec<u128> {
        self.flows.iter().map(|f| f.equity).collect()
    }

    /// Debt notional of every slot
    pub fn debt_flows(&self) -> Vec<u128> {
        self.flows.iter().map(|f| f.debt).collect()
    }

    /// Slot of a token, if it moves
    pub fn flow_of(&self, component: &ComponentId) -> Option<&ComponentFlow> {
        self.flows.iter().find(|f| &f.component == component)
    }

    /// Settlements owned by a module
    pub fn settlements_for<'a>(
        &'a self,
        module: &'a ModuleId,
    ) -> impl Iterator<Item = &'a ModuleSettlement> + 'a {
        self.settlements.iter().filter(move |s| &s.module == module)
    }

    /// Parallel (components, equity, debt) arrays
    pub fn into_parts(self) -> (Vec<ComponentId>, Vec<u128>, Vec<u128>) {
        let components = self.components();
        let equity = self.equity_flows();
        let debt = self.debt_flows();
        (components, equity, debt)
    }
}

// ============ Fees ============

/// Fee resolution for one issuance or redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FeeBreakdown {
    /// Basket quantity the component flows are computed on
    pub total_quantity: u128,
    /// Fee minted to the manager's fee recipient
    pub manager_fee: u128,
    /// Fee minted to the protocol's fee recipient
    pub protocol_fee: u128,
}

impl FeeBreakdown {
    /// Manager plus protocol fee
    pub fn total_fee(&self) -> u128 {
        self.manager_fee.saturating_add(self.protocol_fee)
    }
}
