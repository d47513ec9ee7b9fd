//! # Execution Invariants
//!
//! Predicates that must hold for every finalized transaction. The
//! Executive asserts them in debug builds; tests use them to validate
//! whole scenarios instead of re-deriving the arithmetic inline.

use crate::domain::entities::{LogEntry, Transaction};
use crate::domain::value_objects::U256;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// A transaction can never consume more gas than its limit, and a faulted
/// one consumes exactly its limit.
#[must_use]
pub fn check_gas_bound_invariant(gas_used: u64, excepted: bool, tx: &Transaction) -> bool {
    if excepted {
        gas_used == tx.gas
    } else {
        gas_used <= tx.gas
    }
}

/// The refund is capped at half the gas consumed before it was applied,
/// which is equivalent to never refunding more than what remains charged.
#[must_use]
pub fn check_refund_cap_invariant(gas_used: u64, gas_refunded: u64) -> bool {
    gas_refunded <= gas_used
}

/// A faulted frame leaves no observable side effects behind: its logs
/// were discarded along with its state mutations.
#[must_use]
pub fn check_fault_discards_effects_invariant(excepted: bool, logs: &[LogEntry]) -> bool {
    !excepted || logs.is_empty()
}

/// A sender's nonce advances by exactly one per accepted transaction.
#[must_use]
pub fn check_nonce_advance_invariant(nonce_before: u64, nonce_after: u64) -> bool {
    nonce_after == nonce_before + 1
}

/// The amount locked from the sender before execution begins: the value
/// plus the full gas budget at the gas price.
#[must_use]
pub fn upfront_cost(tx: &Transaction) -> U256 {
    let gas_cost = U256::from(tx.gas).saturating_mul(tx.gas_price);
    tx.value.saturating_add(gas_cost)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Address, Bytes};

    fn tx(gas: u64, gas_price: u64, value: u64) -> Transaction {
        Transaction {
            gas,
            gas_price: U256::from(gas_price),
            value: U256::from(value),
            ..Transaction::default()
        }
    }

    #[test]
    fn test_gas_bound() {
        let t = tx(30_000, 1, 0);
        assert!(check_gas_bound_invariant(21_000, false, &t));
        assert!(check_gas_bound_invariant(30_000, true, &t));
        assert!(!check_gas_bound_invariant(21_000, true, &t));
        assert!(!check_gas_bound_invariant(30_001, false, &t));
    }

    #[test]
    fn test_refund_cap() {
        // consumed 26_006, half is 13_003: charge and refund end up equal
        assert!(check_refund_cap_invariant(13_003, 13_003));
        assert!(!check_refund_cap_invariant(13_002, 13_003));
    }

    #[test]
    fn test_fault_discards_effects() {
        assert!(check_fault_discards_effects_invariant(true, &[]));
        assert!(check_fault_discards_effects_invariant(false, &[]));

        let log = LogEntry::new(Address::ZERO, vec![], Bytes::new());
        assert!(check_fault_discards_effects_invariant(false, &[log.clone()]));
        assert!(!check_fault_discards_effects_invariant(true, &[log]));
    }

    #[test]
    fn test_upfront_cost() {
        let t = tx(30_000, 2, 100);
        assert_eq!(upfront_cost(&t), U256::from(60_100));
    }

    #[test]
    fn test_nonce_advance() {
        assert!(check_nonce_advance_invariant(0, 1));
        assert!(!check_nonce_advance_invariant(1, 1));
        assert!(!check_nonce_advance_invariant(0, 2));
    }
}
