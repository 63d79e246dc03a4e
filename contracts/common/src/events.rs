//! Issuance Events
//!
//! Events are emitted only after a call has fully succeeded and can be
//! indexed off-chain to reconstruct supply, fee and configuration history.

use crate::types::{Address, BasketId, ModuleId};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Supply Events (0x01 - 0x1F)
    BasketIssued = 0x01,
    BasketRedeemed = 0x02,

    // Fee Configuration Events (0x20 - 0x3F)
    FeeRecipientUpdated = 0x20,
    IssueFeeUpdated = 0x21,
    RedeemFeeUpdated = 0x22,

    // Registry Events (0x40 - 0x5F)
    ModuleRegistered = 0x40,
    ModuleUnregistered = 0x41,
}

/// Main event enum containing all issuance engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum IssuanceEvent {
    // ============ Supply Events ============

    /// Emitted when basket tokens are issued
    BasketIssued {
        basket: BasketId,
        issuer: Address,
        to: Address,
        hook: Option<Address>,
        quantity: u128,
        manager_fee: u128,
        protocol_fee: u128,
    },

    /// Emitted when basket tokens are redeemed
    BasketRedeemed {
        basket: BasketId,
        redeemer: Address,
        to: Address,
        hook: Option<Address>,
        quantity: u128,
        manager_fee: u128,
        protocol_fee: u128,
    },

    // ============ Fee Configuration Events ============

    /// Emitted when the manager fee recipient changes
    FeeRecipientUpdated { basket: BasketId, recipient: Address },

    /// Emitted when the manager issue fee changes
    IssueFeeUpdated { basket: BasketId, fee: u128 },

    /// Emitted when the manager redeem fee changes
    RedeemFeeUpdated { basket: BasketId, fee: u128 },

    // ============ Registry Events ============

    /// Emitted when a module registers as an issuance hook
    ModuleRegistered { basket: BasketId, module: ModuleId },

    /// Emitted when a module unregisters
    ModuleUnregistered { basket: BasketId, module: ModuleId },
}

impl IssuanceEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::BasketIssued { .. } => EventType::BasketIssued,
            Self::BasketRedeemed { .. } => EventType::BasketRedeemed,
            Self::FeeRecipientUpdated { .. } => EventType::FeeRecipientUpdated,
            Self::IssueFeeUpdated { .. } => EventType::IssueFeeUpdated,
            Self::RedeemFeeUpdated { .. } => EventType::RedeemFeeUpdated,
            Self::ModuleRegistered { .. } => EventType::ModuleRegistered,
            Self::ModuleUnregistered { .. } => EventType::ModuleUnregistered,
        }
    }

    /// Basket token the event refers to
    pub fn basket(&self) -> BasketId {
        match self {
            Self::BasketIssued { basket, .. }
            | Self::BasketRedeemed { basket, .. }
            | Self::FeeRecipientUpdated { basket, .. }
            | Self::IssueFeeUpdated { basket, .. }
            | Self::RedeemFeeUpdated { basket, .. }
            | Self::ModuleRegistered { basket, .. }
            | Self::ModuleUnregistered { basket, .. } => *basket,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<IssuanceEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: IssuanceEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[IssuanceEvent] {
        &self.events
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<IssuanceEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&IssuanceEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<&IssuanceEvent> {
        self.events.last()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_event_type() {
        let event = IssuanceEvent::BasketIssued {
            basket: [1u8; 32],
            issuer: [2u8; 32],
            to: [3u8; 32],
            hook: None,
            quantity: ONE,
            manager_fee: ONE / 200,
            protocol_fee: 0,
        };

        assert_eq!(event.event_type(), EventType::BasketIssued);
        assert_eq!(event.basket(), [1u8; 32]);
    }

    #[test]
    fn test_event_serialization() {
        let event = IssuanceEvent::BasketRedeemed {
            basket: [1u8; 32],
            redeemer: [2u8; 32],
            to: [3u8; 32],
            hook: Some([4u8; 32]),
            quantity: ONE,
            manager_fee: 7,
            protocol_fee: 3,
        };

        let bytes = event.to_bytes();
        let restored = IssuanceEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, restored);
        assert!(IssuanceEvent::from_bytes(&[0xff]).is_none());
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();

        log.emit(IssuanceEvent::IssueFeeUpdated {
            basket: [1u8; 32],
            fee: ONE / 100,
        });
        log.emit(IssuanceEvent::ModuleRegistered {
            basket: [1u8; 32],
            module: [4u8; 32],
        });

        assert_eq!(log.len(), 2);
        assert!(log.has_events());
        assert_eq!(log.filter_by_type(EventType::ModuleRegistered).len(), 1);
        assert_eq!(log.last().unwrap().event_type(), EventType::ModuleRegistered);

        log.clear();
        assert!(log.is_empty());
    }
}
