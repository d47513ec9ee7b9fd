//! # Ledger Executive - Transaction Execution Engine
//!
//! Executes one transaction against a mutable ledger state: validation,
//! upfront charging, dispatch to a native contract, an interpreted frame,
//! or a plain transfer, and final settlement of gas, fees, and
//! self-destructions.
//!
//! ## Execution Phases
//!
//! | Phase | Location | Purpose |
//! |-------|----------|---------|
//! | Setup | `executive.rs` - `Executive::setup()` | Validate and charge the sender |
//! | Dispatch | `executive.rs` - `call()` / `create()` | Route to native, interpreted, or transfer |
//! | Drive | `executive.rs` - `Executive::go()` | Run the interpreter to conclusion or fault |
//! | Finalize | `executive.rs` - `Executive::finalize()` | Refund, payouts, code install, suicides |
//!
//! ## Failure Semantics
//!
//! Validation failures reject the transaction with the state untouched.
//! Runtime faults never reject: the frame's gas is forfeited and its
//! mutations rolled back, but the transaction is included and charged.
//! Value transferred into a frame before it ran is not undone.
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Domain | `domain/` | Transactions, accounts, derivations, invariants |
//! | State | `state/` | Journaled account store with checkpoint/rollback |
//! | Natives | `precompiles/` | Contracts at reserved low addresses |
//! | Interpreter | `vm/` | Gas-metered stack machine behind the `Vm` seam |
//! | Frames | `ext.rs` | Per-frame view of the store, nested call routing |
//!
//! ## Usage Example
//!
//! ```
//! use ledger_executive::prelude::*;
//!
//! let sender = Address::new([1u8; 20]);
//! let mut state = LedgerState::default();
//! state.add_balance(sender, U256::from(1_000_000));
//!
//! let tx = Transaction {
//!     sender,
//!     receiver: Some(Address::new([2u8; 20])),
//!     value: U256::from(100),
//!     gas: 30_000,
//!     gas_price: U256::one(),
//!     nonce: 0,
//!     data: Bytes::new(),
//! };
//!
//! let config = ExecutiveConfig::default();
//! let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
//! assert!(!result.excepted);
//! assert_eq!(state.balance(Address::new([2u8; 20])), U256::from(100));
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

// =============================================================================
// MODULES
// =============================================================================

pub mod domain;
pub mod errors;
pub mod executive;
pub mod ext;
pub mod precompiles;
pub mod state;
pub mod vm;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{Account, BlockContext, LogEntry, Transaction};

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, Hash, U256};

    // Domain services
    pub use crate::domain::services::{contract_address, intrinsic_gas, keccak256};

    // Invariants
    pub use crate::domain::invariants::{
        check_fault_discards_effects_invariant, check_gas_bound_invariant,
        check_nonce_advance_invariant, check_refund_cap_invariant, upfront_cost,
    };

    // State
    pub use crate::state::{Checkpoint, LedgerState};

    // Native contracts
    pub use crate::precompiles::{default_registry, NativeContract, IDENTITY_INDEX, SHA256_INDEX};

    // Interpreter
    pub use crate::vm::{costs, Interpreter, OnOp, Opcode, TraceStep, Vm};

    // Frames
    pub use crate::ext::{CallFrame, Externalities, FrameParams, SubCallOutcome, SubState};

    // Executive
    pub use crate::executive::{
        simple_trace, Dispatch, ExecutionResult, Executive, ExecutiveConfig,
    };

    // Errors
    pub use crate::errors::{StateError, ValidationError, VmFault};
}
