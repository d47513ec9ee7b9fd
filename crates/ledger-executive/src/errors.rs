//! # Error Types
//!
//! All error types for transaction execution, split by recovery semantics:
//! validation errors reject the transaction outright, VM faults forfeit a
//! frame's gas but let the transaction finalize, and state errors surface
//! store-level violations.

use crate::domain::value_objects::{Address, U256};
use thiserror::Error;

// =============================================================================
// VALIDATION ERRORS
// =============================================================================

/// Errors raised during transaction setup, before any state mutation.
///
/// A transaction rejected with one of these never appears as included:
/// no balance, nonce, or code changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Transaction could not be decoded from its wire bytes.
    #[error("undecodable transaction: {0}")]
    Undecodable(String),

    /// Transaction nonce does not match the sender's recorded nonce.
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce {
        /// Sender's current recorded nonce.
        expected: u64,
        /// Nonce carried by the transaction.
        got: u64,
    },

    /// Gas limit below the intrinsic cost of the payload.
    #[error("not enough gas to pay for the transaction: require > {required}, got {got}")]
    OutOfGas {
        /// Intrinsic gas floor.
        required: u64,
        /// Gas limit supplied.
        got: u64,
    },

    /// Sender balance cannot cover value + gas limit x gas price.
    #[error("not enough cash: require > {required}, got {got}")]
    NotEnoughCash {
        /// Total upfront cost.
        required: U256,
        /// Sender balance.
        got: U256,
    },

    /// Block gas budget would be exceeded by this transaction.
    #[error("block gas limit reached: require < {available}, got {got}")]
    BlockGasLimitReached {
        /// Gas remaining in the block budget.
        available: u64,
        /// Gas limit supplied.
        got: u64,
    },
}

// =============================================================================
// VM FAULTS
// =============================================================================

/// Faults detected while driving the interpreter.
///
/// All variants except [`VmFault::StepLimitReached`] forfeit the frame's
/// entire gas and revert the frame's accumulated sub-state; the enclosing
/// transaction still finalizes. `StepLimitReached` is a control signal for
/// external single-stepping, not a fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmFault {
    /// Mid-execution gas exhaustion.
    #[error("out of gas")]
    OutOfGas,

    /// Pop from an empty stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// Push beyond the stack bound.
    #[error("stack overflow")]
    StackOverflow,

    /// Jump to a destination that is not a jump marker.
    #[error("bad jump destination: {0}")]
    BadJumpDestination(usize),

    /// Undefined instruction byte.
    #[error("bad instruction: 0x{0:02X}")]
    BadInstruction(u8),

    /// Step budget of this drive call exhausted; not a fault.
    ///
    /// Execution can be resumed with another drive call.
    #[error("step limit reached")]
    StepLimitReached,
}

impl VmFault {
    /// Returns true if this is the resumable step-limit signal rather than
    /// a real fault.
    #[must_use]
    pub fn is_step_limit(&self) -> bool {
        matches!(self, Self::StepLimitReached)
    }
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from ledger store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Debit would drive a balance negative.
    #[error("insufficient balance on {address:?}: require {required}, got {got}")]
    InsufficientBalance {
        /// Account being debited.
        address: Address,
        /// Amount requested.
        required: U256,
        /// Balance available.
        got: U256,
    },
}

// =============================================================================
// TESTS
// =============================================================================
