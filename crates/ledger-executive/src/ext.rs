//! # Execution Context Adapter
//!
//! Bridges the interpreter to the ledger state for one call frame. The
//! adapter exposes the frame's identity (address, sender, origin, value,
//! gas price, input, code, depth), accumulates the frame's sub-state
//! (logs, refund counter, self-destruct set), and routes nested calls and
//! creations through fresh depth-bounded Executive frames sharing the
//! same store.

use crate::domain::entities::LogEntry;
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::executive::{Dispatch, Executive, ExecutiveConfig};
use crate::state::LedgerState;
use std::collections::BTreeSet;
use tracing::debug;

// =============================================================================
// SUB-STATE
// =============================================================================

/// Side effects accumulated by one frame: emitted logs, the refund
/// counter, and addresses marked for self-destruction.
///
/// Discarded wholesale when the frame faults; merged into the parent
/// frame's sub-state when a nested frame concludes.
#[derive(Clone, Debug, Default)]
pub struct SubState {
    /// Logs emitted, in order.
    pub logs: Vec<LogEntry>,
    /// Gas credits accumulated (e.g. from storage clearing).
    pub refunds: u64,
    /// Addresses marked for destruction, applied only at finalization.
    pub suicides: BTreeSet<Address>,
}

impl SubState {
    /// Absorbs a concluded child frame's side effects.
    pub fn merge(&mut self, other: SubState) {
        self.logs.extend(other.logs);
        self.refunds += other.refunds;
        self.suicides.extend(other.suicides);
    }

    /// Discards everything accumulated.
    pub fn clear(&mut self) {
        self.logs.clear();
        self.refunds = 0;
        self.suicides.clear();
    }
}

// =============================================================================
// FRAME PARAMETERS
// =============================================================================

/// Construction parameters of one call frame.
#[derive(Clone, Debug)]
pub struct FrameParams {
    /// Account the frame executes as.
    pub address: Address,
    /// Immediate caller of the frame.
    pub sender: Address,
    /// Original transaction sender.
    pub origin: Address,
    /// Value transferred into the frame.
    pub value: U256,
    /// Gas price of the enclosing transaction.
    pub gas_price: U256,
    /// Input data.
    pub data: Bytes,
    /// Code being executed.
    pub code: Bytes,
    /// Call depth; zero for the transaction-level frame.
    pub depth: u16,
}

// =============================================================================
// EXTERNALITIES TRAIT
// =============================================================================

/// Outcome of a nested message call made from executing code.
#[derive(Clone, Debug)]
pub struct SubCallOutcome {
    /// Whether the nested call concluded without fault.
    pub success: bool,
    /// Gas left over from the forwarded budget.
    pub gas_left: u64,
    /// Output bytes of the nested call.
    pub output: Bytes,
}

/// What executing code may observe and do through its frame.
pub trait Externalities {
    /// Account the frame executes as.
    fn address(&self) -> Address;
    /// Immediate caller.
    fn sender(&self) -> Address;
    /// Original transaction sender.
    fn origin(&self) -> Address;
    /// Value transferred into the frame.
    fn value(&self) -> U256;
    /// Gas price of the enclosing transaction.
    fn gas_price(&self) -> U256;
    /// Input data of the frame.
    fn data(&self) -> &[u8];
    /// Code the frame executes.
    fn code(&self) -> &[u8];
    /// Call depth of the frame.
    fn depth(&self) -> u16;

    /// Balance of any address.
    fn balance(&self, address: Address) -> U256;
    /// Storage slot of the frame's account.
    fn storage_at(&self, key: U256) -> U256;
    /// Writes a storage slot of the frame's account.
    fn set_storage(&mut self, key: U256, value: U256);
    /// Emits a log.
    fn log(&mut self, topics: Vec<Hash>, data: Bytes);
    /// Accumulates a gas refund credit.
    fn add_refund(&mut self, amount: u64);
    /// Marks the frame's account for destruction at finalization and
    /// transfers its balance to the beneficiary.
    fn suicide(&mut self, beneficiary: Address);

    /// Message call into another account through a nested frame.
    fn call(&mut self, gas: u64, to: Address, value: U256, input: &[u8]) -> SubCallOutcome;
    /// Contract creation through a nested frame; returns the new address
    /// on success and the leftover gas.
    fn create(&mut self, endowment: U256, gas: u64, init: &[u8]) -> (Option<Address>, u64);
}

// =============================================================================
// CALL FRAME
// =============================================================================

/// The adapter for one frame, holding the exclusive store reference for
/// the duration of the drive.
pub struct CallFrame<'a> {
    state: &'a mut LedgerState,
    config: &'a ExecutiveConfig,
    params: &'a FrameParams,
    /// Side effects accumulated so far.
    pub sub: SubState,
}

impl<'a> CallFrame<'a> {
    /// Builds the adapter over the store for one frame.
    pub fn new(
        state: &'a mut LedgerState,
        config: &'a ExecutiveConfig,
        params: &'a FrameParams,
        sub: SubState,
    ) -> Self {
        Self {
            state,
            config,
            params,
            sub,
        }
    }

    /// Takes back the accumulated sub-state.
    #[must_use]
    pub fn into_substate(self) -> SubState {
        self.sub
    }
}

impl Externalities for CallFrame<'_> {
    fn address(&self) -> Address {
        self.params.address
    }

    fn sender(&self) -> Address {
        self.params.sender
    }

    fn origin(&self) -> Address {
        self.params.origin
    }

    fn value(&self) -> U256 {
        self.params.value
    }

    fn gas_price(&self) -> U256 {
        self.params.gas_price
    }

    fn data(&self) -> &[u8] {
        self.params.data.as_slice()
    }

    fn code(&self) -> &[u8] {
        self.params.code.as_slice()
    }

    fn depth(&self) -> u16 {
        self.params.depth
    }

    fn balance(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    fn storage_at(&self, key: U256) -> U256 {
        self.state.storage_at(self.params.address, key)
    }

    fn set_storage(&mut self, key: U256, value: U256) {
        self.state.set_storage(self.params.address, key, value);
    }

    fn log(&mut self, topics: Vec<Hash>, data: Bytes) {
        self.sub.logs.push(LogEntry::new(self.params.address, topics, data));
    }

    fn add_refund(&mut self, amount: u64) {
        self.sub.refunds += amount;
    }

    fn suicide(&mut self, beneficiary: Address) {
        let balance = self.state.balance(self.params.address);
        self.state.add_balance(beneficiary, balance);
        self.sub.suicides.insert(self.params.address);
    }

    fn call(&mut self, gas: u64, to: Address, value: U256, input: &[u8]) -> SubCallOutcome {
        if self.params.depth + 1 > self.config.max_call_depth {
            debug!(depth = self.params.depth, "call depth limit hit");
            return SubCallOutcome {
                success: false,
                gas_left: gas,
                output: Bytes::new(),
            };
        }
        if self.state.sub_balance(self.params.address, value).is_err() {
            return SubCallOutcome {
                success: false,
                gas_left: gas,
                output: Bytes::new(),
            };
        }

        let mut nested = Executive::nested(self.state, self.config, self.params.depth + 1);
        let dispatch = nested.call(
            to,
            to,
            self.params.address,
            value,
            self.params.gas_price,
            input,
            gas,
            self.params.origin,
        );
        let success = match dispatch {
            Dispatch::Done { success } => success,
            Dispatch::Pending => {
                nested.go(None);
                !nested.excepted()
            }
        };

        let gas_left = nested.end_gas();
        let output = nested.take_output();
        self.sub.merge(nested.take_substate());
        SubCallOutcome {
            success,
            gas_left,
            output,
        }
    }

    fn create(&mut self, endowment: U256, gas: u64, init: &[u8]) -> (Option<Address>, u64) {
        if self.params.depth + 1 > self.config.max_call_depth {
            debug!(depth = self.params.depth, "create depth limit hit");
            return (None, gas);
        }
        if self.state.sub_balance(self.params.address, endowment).is_err() {
            return (None, gas);
        }

        // Creations consume a nonce of the creating account.
        self.state.note_sending(self.params.address);

        let mut nested = Executive::nested(self.state, self.config, self.params.depth + 1);
        let _ = nested.create(
            self.params.address,
            endowment,
            self.params.gas_price,
            gas,
            init,
            self.params.origin,
        );
        nested.go(None);

        let gas_left = nested.end_gas();
        let address = nested.new_address();
        let success = !nested.excepted();
        let output = nested.take_output();
        let nested_sub = nested.take_substate();

        // Nested creations conclude here: install the produced code unless
        // the new account destroyed itself during initialization.
        if let Some(created) = address {
            if success && !nested_sub.suicides.contains(&created) && !output.is_empty() {
                self.state.set_code(created, output);
            }
        }
        self.sub.merge(nested_sub);

        if success {
            (address, gas_left)
        } else {
            (None, gas_left)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
