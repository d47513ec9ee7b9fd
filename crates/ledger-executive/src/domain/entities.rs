//! # Core Domain Entities
//!
//! The transaction, account, and block-context records the Executive
//! operates over. Accounts are owned by the ledger store; the Executive
//! mutates them only through the store's operations.

use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// TRANSACTION
// =============================================================================

/// An immutable, already-authenticated transaction.
///
/// The sender is recovered from the signature upstream of this crate;
/// the Executive consumes the record read-only. A missing receiver marks
/// a contract creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address (recovered from the signature upstream).
    pub sender: Address,
    /// Receiver address; `None` means contract creation.
    pub receiver: Option<Address>,
    /// Value transferred to the receiver (or endowment for a creation).
    pub value: U256,
    /// Gas budget the sender pre-pays for.
    pub gas: u64,
    /// Price per unit of gas.
    pub gas_price: U256,
    /// Sender nonce this transaction was signed against.
    pub nonce: u64,
    /// Payload: call input data, or initialization code for a creation.
    pub data: Bytes,
}

impl Transaction {
    /// Returns true if this transaction creates a contract.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        self.receiver.is_none()
    }

    /// Decodes a transaction from its wire bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(raw)
    }

    /// Encodes the transaction to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}

// =============================================================================
// ACCOUNT
// =============================================================================

/// A mutable account record in the ledger store.
///
/// Code, once set, is immutable for the lifetime of the address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account balance. Never negative; enforced by the store's debit path.
    pub balance: U256,
    /// Nonce, incremented exactly once per accepted transaction.
    pub nonce: u64,
    /// Contract code, absent for plain accounts.
    pub code: Option<Bytes>,
    /// Persistent key/value storage.
    pub storage: HashMap<U256, U256>,
}

impl Account {
    /// Creates a plain account with the given balance.
    #[must_use]
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Returns true if this account carries contract code.
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

// =============================================================================
// BLOCK CONTEXT
// =============================================================================

/// Per-block context consulted during execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block number.
    pub number: u64,
    /// Address credited with transaction fees.
    pub author: Address,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Gas already consumed by earlier transactions in this block.
    pub gas_used: u64,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            author: Address::ZERO,
            gas_limit: 30_000_000,
            gas_used: 0,
        }
    }
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// A log emitted by executing code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Address of the frame that emitted the log.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Non-indexed data.
    pub data: Bytes,
}

impl LogEntry {
    /// Creates a new log entry.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
