//! # Transaction Executive
//!
//! Drives one transaction against the ledger state through four phases:
//!
//! 1. **setup** — validate the transaction against the current state and,
//!    only once every check passes, charge the sender upfront and dispatch
//!    as a call or a creation.
//! 2. **call / create** — route to a native contract, an interpreted
//!    frame, or a plain value transfer; creations derive and materialize
//!    the new account immediately.
//! 3. **go** — drive the interpreter to completion or fault. A fault
//!    forfeits the frame's gas and rolls the frame's mutations back, but
//!    never rejects the transaction.
//! 4. **finalize** — apply the gas refund, install created code, pay the
//!    sender back for unused gas, credit fees to the block author, and
//!    erase self-destructed accounts.
//!
//! Nested frames reuse the same type at increased depth over the shared
//! store; only the transaction-level instance carries a transaction and
//! performs finalization.

use crate::domain::entities::{LogEntry, Transaction};
use crate::domain::invariants;
use crate::domain::services;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::ValidationError;
use crate::ext::{CallFrame, FrameParams, SubState};
use crate::state::{Checkpoint, LedgerState};
use crate::vm::{costs, Interpreter, OnOp, TraceStep, Vm};
use std::mem;
use tracing::debug;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Execution parameters that hold for a whole transaction.
#[derive(Clone, Debug)]
pub struct ExecutiveConfig {
    /// Maximum nested call depth; frames beyond it fail without running.
    pub max_call_depth: u16,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
        }
    }
}

// =============================================================================
// DISPATCH OUTCOME
// =============================================================================

/// How a call or creation dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Concluded without an interpreted frame: a native contract ran, a
    /// plain transfer completed, or the dispatch failed outright.
    Done {
        /// Whether the dispatch concluded cleanly.
        success: bool,
    },
    /// An interpreted frame is staged; drive it with [`Executive::go`].
    Pending,
}

// =============================================================================
// EXECUTION RESULT
// =============================================================================

/// Summary of a finalized transaction.
#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    /// Whether execution faulted. The transaction is still included and
    /// charged; only the frame's effects were reverted.
    pub excepted: bool,
    /// Address of the created contract, for creation transactions.
    pub new_address: Option<Address>,
    /// Call output, or the installed code for a creation.
    pub output: Bytes,
    /// Logs emitted across all frames, in order.
    pub logs: Vec<LogEntry>,
    /// Gas consumed after refunds; what the sender ultimately paid for.
    pub gas_used: u64,
    /// Gas credited back from the refund counter.
    pub gas_refunded: u64,
}

// =============================================================================
// EXECUTIVE
// =============================================================================

/// One execution frame over an exclusively borrowed ledger state.
pub struct Executive<'a> {
    state: &'a mut LedgerState,
    config: &'a ExecutiveConfig,
    depth: u16,
    tx: Option<Transaction>,
    is_creation: bool,
    new_address: Option<Address>,
    end_gas: u64,
    output: Bytes,
    excepted: bool,
    vm: Option<Box<dyn Vm>>,
    frame: Option<FrameParams>,
    sub: SubState,
    frame_checkpoint: Option<Checkpoint>,
}

impl<'a> Executive<'a> {
    /// Creates the transaction-level frame.
    pub fn new(state: &'a mut LedgerState, config: &'a ExecutiveConfig) -> Self {
        Self::nested(state, config, 0)
    }

    /// Creates a frame at the given call depth over the shared store.
    pub fn nested(state: &'a mut LedgerState, config: &'a ExecutiveConfig, depth: u16) -> Self {
        Self {
            state,
            config,
            depth,
            tx: None,
            is_creation: false,
            new_address: None,
            end_gas: 0,
            output: Bytes::new(),
            excepted: false,
            vm: None,
            frame: None,
            sub: SubState::default(),
            frame_checkpoint: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Whether the frame faulted.
    #[must_use]
    pub fn excepted(&self) -> bool {
        self.excepted
    }

    /// Gas remaining after the frame concluded.
    #[must_use]
    pub fn end_gas(&self) -> u64 {
        self.end_gas
    }

    /// Gas the transaction has consumed so far.
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.tx.as_ref().map_or(0, |tx| tx.gas - self.end_gas)
    }

    /// Address of the contract a creation dispatch derived.
    #[must_use]
    pub fn new_address(&self) -> Option<Address> {
        self.new_address
    }

    /// Takes the frame's output bytes.
    pub fn take_output(&mut self) -> Bytes {
        mem::take(&mut self.output)
    }

    /// Takes the frame's accumulated sub-state.
    pub fn take_substate(&mut self) -> SubState {
        mem::take(&mut self.sub)
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Decodes a transaction from wire bytes and sets it up.
    ///
    /// # Errors
    ///
    /// `Undecodable` for malformed bytes, otherwise as [`Self::setup`].
    pub fn setup_raw(&mut self, raw: &[u8]) -> Result<Dispatch, ValidationError> {
        let tx = Transaction::decode(raw)
            .map_err(|err| ValidationError::Undecodable(err.to_string()))?;
        self.setup(&tx)
    }

    /// Validates the transaction and, if accepted, charges the sender and
    /// dispatches execution.
    ///
    /// Checks run in a fixed order against the untouched state: nonce,
    /// intrinsic gas, upfront cost, block gas budget. A rejected
    /// transaction leaves the state byte-for-byte unchanged.
    ///
    /// # Errors
    ///
    /// One [`ValidationError`] per failed check; the first failure wins.
    pub fn setup(&mut self, tx: &Transaction) -> Result<Dispatch, ValidationError> {
        let sender = tx.sender;

        let expected = self.state.nonce(sender);
        if tx.nonce != expected {
            debug!(%sender, expected, got = tx.nonce, "rejecting: invalid nonce");
            return Err(ValidationError::InvalidNonce {
                expected,
                got: tx.nonce,
            });
        }

        let required = services::intrinsic_gas(tx.data.as_slice());
        if tx.gas < required {
            debug!(%sender, required, got = tx.gas, "rejecting: below intrinsic gas");
            return Err(ValidationError::OutOfGas {
                required,
                got: tx.gas,
            });
        }

        let gas_cost = U256::from(tx.gas).saturating_mul(tx.gas_price);
        let total_cost = tx.value.saturating_add(gas_cost);
        let balance = self.state.balance(sender);
        if balance < total_cost {
            debug!(%sender, %total_cost, %balance, "rejecting: not enough cash");
            return Err(ValidationError::NotEnoughCash {
                required: total_cost,
                got: balance,
            });
        }

        let block = self.state.block();
        let available = block.gas_limit.saturating_sub(block.gas_used);
        if tx.gas > available {
            debug!(available, got = tx.gas, "rejecting: block gas limit reached");
            return Err(ValidationError::BlockGasLimitReached {
                available,
                got: tx.gas,
            });
        }

        // All checks passed; the transaction is included from here on.
        debug!(%sender, gas = tx.gas, creation = tx.is_creation(), "executing transaction");
        self.state.note_sending(sender);
        self.state
            .sub_balance(sender, total_cost)
            .expect("sender balance verified during validation");
        self.tx = Some(tx.clone());

        let gas = tx.gas - required;
        let dispatch = if let Some(receiver) = tx.receiver {
            self.call(
                receiver,
                receiver,
                sender,
                tx.value,
                tx.gas_price,
                tx.data.as_slice(),
                gas,
                sender,
            )
        } else {
            self.create(sender, tx.value, tx.gas_price, gas, tx.data.as_slice(), sender)
        };
        Ok(dispatch)
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Dispatches a message call.
    ///
    /// The value lands on the receiving account before anything runs and
    /// is not undone by a later fault of the frame. Routing order: native
    /// contract at the code address, interpreted frame if the code address
    /// carries code, plain transfer otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn call(
        &mut self,
        receive: Address,
        code_address: Address,
        sender: Address,
        value: U256,
        gas_price: U256,
        data: &[u8],
        gas: u64,
        origin: Address,
    ) -> Dispatch {
        self.end_gas = gas;

        self.state.add_balance(receive, value);
        self.frame_checkpoint = Some(self.state.checkpoint());

        if let Some(native) = self.state.native(code_address) {
            let required = native.gas(data);
            if required > gas {
                debug!(%code_address, required, gas, "native contract cannot be paid");
                self.excepted = true;
                self.end_gas = 0;
                return Dispatch::Done { success: false };
            }
            self.output = native.exec(data);
            self.end_gas = gas - required;
            return Dispatch::Done { success: true };
        }

        if let Some(code) = self.state.code(code_address) {
            self.frame = Some(FrameParams {
                address: receive,
                sender,
                origin,
                value,
                gas_price,
                data: Bytes::from_slice(data),
                code,
                depth: self.depth,
            });
            self.vm = Some(Box::new(Interpreter::new(gas)));
            return Dispatch::Pending;
        }

        // No code at the target: the transfer above is the whole effect.
        Dispatch::Done { success: true }
    }

    /// Dispatches a contract creation.
    ///
    /// The new address derives from the creator and the nonce already
    /// consumed for this creation. The account materializes immediately,
    /// keeping any balance the address previously held plus the endowment;
    /// a later fault of the initialization frame does not remove it.
    pub fn create(
        &mut self,
        sender: Address,
        endowment: U256,
        gas_price: U256,
        gas: u64,
        init: &[u8],
        origin: Address,
    ) -> Dispatch {
        self.is_creation = true;
        self.end_gas = gas;

        let nonce = self.state.nonce(sender).saturating_sub(1);
        let created = services::contract_address(sender, nonce);
        self.new_address = Some(created);

        let prior = self.state.balance(created);
        self.state
            .create_account(created, prior.saturating_add(endowment));
        self.frame_checkpoint = Some(self.state.checkpoint());

        if init.is_empty() {
            return Dispatch::Done { success: true };
        }

        self.frame = Some(FrameParams {
            address: created,
            sender,
            origin,
            value: endowment,
            gas_price,
            data: Bytes::new(),
            code: Bytes::from_slice(init),
            depth: self.depth,
        });
        self.vm = Some(Box::new(Interpreter::new(gas)));
        Dispatch::Pending
    }

    // -------------------------------------------------------------------------
    // Drive
    // -------------------------------------------------------------------------

    /// Drives the staged frame to conclusion. Returns true once the frame
    /// has concluded (or there was nothing to drive).
    pub fn go(&mut self, on_op: OnOp<'_>) -> bool {
        self.drive(on_op, None)
    }

    /// Drives the staged frame for at most `steps` instructions. Returns
    /// false if the step budget ran out with the frame still resumable.
    pub fn go_steps(&mut self, on_op: OnOp<'_>, steps: u64) -> bool {
        self.drive(on_op, Some(steps))
    }

    fn drive(&mut self, on_op: OnOp<'_>, step_limit: Option<u64>) -> bool {
        let config = self.config;
        let (Some(vm), Some(params)) = (self.vm.as_mut(), self.frame.as_ref()) else {
            return true;
        };

        let sub = mem::take(&mut self.sub);
        let mut frame = CallFrame::new(&mut *self.state, config, params, sub);
        let outcome = vm.run(&mut frame, on_op, step_limit);
        self.sub = frame.into_substate();
        let gas_left = vm.gas();

        match outcome {
            // Not concluded; everything outside the interpreter stays as it
            // was before this drive call.
            Err(fault) if fault.is_step_limit() => false,
            Ok(output) => {
                self.vm = None;
                self.frame = None;
                if self.is_creation {
                    // Installing the produced code costs per byte; if the
                    // frame cannot pay, the code is discarded rather than
                    // the creation faulting.
                    let deposit = output.len() as u64 * costs::CREATE_DATA;
                    if gas_left >= deposit {
                        self.end_gas = gas_left - deposit;
                        self.output = output;
                    } else {
                        debug!(deposit, gas_left, "code deposit unaffordable, discarding");
                        self.end_gas = gas_left;
                        self.output = Bytes::new();
                    }
                } else {
                    self.end_gas = gas_left;
                    self.output = output;
                }
                true
            }
            Err(fault) => {
                debug!(%fault, depth = self.depth, "frame faulted");
                self.vm = None;
                self.frame = None;
                self.excepted = true;
                self.end_gas = 0;
                self.output = Bytes::new();
                self.sub.clear();
                if let Some(checkpoint) = self.frame_checkpoint.take() {
                    self.state.rollback(checkpoint);
                }
                true
            }
        }
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    /// Settles the transaction: refund, code installation, sender and
    /// author payouts, block gas accounting, and self-destructions.
    pub fn finalize(&mut self) -> ExecutionResult {
        let mut refunded = 0;
        if let Some(tx) = self.tx.clone() {
            // Half of the consumed gas is refundable at most.
            let consumed = tx.gas - self.end_gas;
            refunded = (consumed / 2).min(self.sub.refunds);
            self.end_gas += refunded;

            if self.is_creation && !self.excepted {
                if let Some(created) = self.new_address {
                    if !self.sub.suicides.contains(&created) && !self.output.is_empty() {
                        self.state.set_code(created, self.output.clone());
                    }
                }
            }

            self.state.add_balance(
                tx.sender,
                U256::from(self.end_gas).saturating_mul(tx.gas_price),
            );

            let gas_used = tx.gas - self.end_gas;
            let fees = U256::from(gas_used).saturating_mul(tx.gas_price);
            let author = self.state.block().author;
            self.state.add_balance(author, fees);
            self.state.block_mut().gas_used += gas_used;

            debug_assert!(invariants::check_gas_bound_invariant(
                gas_used,
                self.excepted,
                &tx
            ));
            debug_assert!(invariants::check_refund_cap_invariant(gas_used, refunded));
            debug!(gas_used, refunded, excepted = self.excepted, "finalized transaction");
        }

        let sub = mem::take(&mut self.sub);
        debug_assert!(invariants::check_fault_discards_effects_invariant(
            self.excepted,
            &sub.logs
        ));
        for address in &sub.suicides {
            self.state.kill_account(*address);
        }

        // The transaction is settled: no checkpoint can outlive it, so the
        // undo log is dead weight for a store reused across transactions.
        if self.depth == 0 {
            self.state.commit();
        }

        ExecutionResult {
            excepted: self.excepted,
            new_address: self.new_address,
            output: mem::take(&mut self.output),
            logs: sub.logs,
            gas_used: self.tx.as_ref().map_or(0, |tx| tx.gas - self.end_gas),
            gas_refunded: refunded,
        }
    }

    /// Runs a transaction through all phases in one call.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the transaction was rejected; the
    /// state is untouched in that case.
    pub fn transact(&mut self, tx: &Transaction) -> Result<ExecutionResult, ValidationError> {
        self.setup(tx)?;
        self.go(None);
        Ok(self.finalize())
    }
}

// =============================================================================
// TRACING
// =============================================================================

/// An instruction observer that emits one debug event per step.
#[must_use]
pub fn simple_trace() -> impl FnMut(&TraceStep<'_>) {
    |step: &TraceStep<'_>| {
        debug!(
            steps = step.steps,
            op = step.opcode.name(),
            gas_remaining = step.gas_remaining,
            gas_cost = step.gas_cost,
            mem_size = step.new_mem_size,
            depth = step.depth,
            stack = ?step.stack,
            "vm step"
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::{intrinsic_gas, TX_GAS};
    use crate::precompiles::IDENTITY_INDEX;

    /// Runtime that returns the 32-byte word 42.
    const RETURN_42: [u8; 10] = [0x60, 0x2A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn funded_state(sender: Address, balance: u64) -> LedgerState {
        let mut state = LedgerState::default();
        state.add_balance(sender, U256::from(balance));
        state
    }

    fn call_tx(sender: Address, receiver: Address, value: u64, gas: u64) -> Transaction {
        Transaction {
            sender,
            receiver: Some(receiver),
            value: U256::from(value),
            gas,
            gas_price: U256::one(),
            nonce: 0,
            data: Bytes::new(),
        }
    }

    /// Init code that deploys [`RETURN_42`]: write the runtime into the
    /// first memory word, return its 10 bytes.
    fn deploy_init() -> Vec<u8> {
        let mut word = [0u8; 32];
        word[..RETURN_42.len()].copy_from_slice(&RETURN_42);

        let mut init = vec![0x7F]; // PUSH32
        init.extend_from_slice(&word);
        init.extend_from_slice(&[0x60, 0x00, 0x52]); // PUSH1 0, MSTORE
        init.extend_from_slice(&[0x60, 0x0A, 0x60, 0x00, 0xF3]); // RETURN 0..10
        init
    }

    // -------------------------------------------------------------------------
    // Setup validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_setup_rejects_invalid_nonce() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let mut tx = call_tx(sender, addr(2), 0, 30_000);
        tx.nonce = 5;

        let err = Executive::new(&mut state, &config).setup(&tx).unwrap_err();
        assert_eq!(err, ValidationError::InvalidNonce { expected: 0, got: 5 });
        assert_eq!(state.nonce(sender), 0);
        assert_eq!(state.balance(sender), U256::from(1_000_000));
    }

    #[test]
    fn test_setup_rejects_below_intrinsic_gas() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, addr(2), 0, TX_GAS - 1);
        let err = Executive::new(&mut state, &config).setup(&tx).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfGas {
                required: TX_GAS,
                got: TX_GAS - 1,
            }
        );
    }

    #[test]
    fn test_setup_rejects_not_enough_cash() {
        let sender = addr(1);
        let mut state = funded_state(sender, 100);
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, addr(2), 0, 21_000);
        let err = Executive::new(&mut state, &config).setup(&tx).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotEnoughCash {
                required: U256::from(21_000),
                got: U256::from(100),
            }
        );
        assert_eq!(state.balance(sender), U256::from(100));
    }

    #[test]
    fn test_setup_rejects_block_gas_limit() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        state.block_mut().gas_limit = 30_000;
        state.block_mut().gas_used = 20_000;
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, addr(2), 0, 21_000);
        let err = Executive::new(&mut state, &config).setup(&tx).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BlockGasLimitReached {
                available: 10_000,
                got: 21_000,
            }
        );
    }

    #[test]
    fn test_setup_checks_nonce_before_cash() {
        // Both the nonce and the balance are wrong; the nonce wins.
        let sender = addr(1);
        let mut state = funded_state(sender, 1);
        let config = ExecutiveConfig::default();

        let mut tx = call_tx(sender, addr(2), 0, 30_000);
        tx.nonce = 9;

        let err = Executive::new(&mut state, &config).setup(&tx).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNonce { .. }));
    }

    #[test]
    fn test_setup_raw_rejects_garbage() {
        let mut state = LedgerState::default();
        let config = ExecutiveConfig::default();

        let err = Executive::new(&mut state, &config)
            .setup_raw(&[0xFF, 0xFF])
            .unwrap_err();
        assert!(matches!(err, ValidationError::Undecodable(_)));
    }

    #[test]
    fn test_setup_raw_accepts_wire_bytes() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let raw = call_tx(sender, addr(2), 10, 30_000).encode().unwrap();
        let mut exec = Executive::new(&mut state, &config);
        let dispatch = exec.setup_raw(&raw).unwrap();
        assert_eq!(dispatch, Dispatch::Done { success: true });
    }

    // -------------------------------------------------------------------------
    // Plain transfers
    // -------------------------------------------------------------------------

    #[test]
    fn test_plain_transfer_settles_everyone() {
        let sender = addr(1);
        let author = addr(0xEE);
        let mut state = funded_state(sender, 1_000_000);
        state.block_mut().author = author;
        let config = ExecutiveConfig::default();

        let mut tx = call_tx(sender, addr(2), 100, 30_000);
        tx.gas_price = U256::from(2);

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(!result.excepted);
        assert_eq!(result.gas_used, TX_GAS);

        // Sender paid value plus gas actually used at the gas price.
        assert_eq!(
            state.balance(sender),
            U256::from(1_000_000u64 - 100 - TX_GAS * 2)
        );
        assert_eq!(state.balance(addr(2)), U256::from(100));
        assert_eq!(state.balance(author), U256::from(TX_GAS * 2));
        assert_eq!(state.nonce(sender), 1);
        assert_eq!(state.block().gas_used, TX_GAS);
    }

    // -------------------------------------------------------------------------
    // Native contracts
    // -------------------------------------------------------------------------

    #[test]
    fn test_identity_native_call() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let mut tx = call_tx(sender, Address::from_low_u64(IDENTITY_INDEX), 0, 25_000);
        tx.data = Bytes::from_slice(&[1, 2, 3]);

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(!result.excepted);
        assert_eq!(result.output.as_slice(), &[1, 2, 3]);
        // Intrinsic cost plus the identity charge (15 base + 3 per word).
        assert_eq!(result.gas_used, intrinsic_gas(&[1, 2, 3]) + 18);
    }

    #[test]
    fn test_native_out_of_gas_still_transfers_value() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let native = Address::from_low_u64(IDENTITY_INDEX);
        let mut tx = call_tx(sender, native, 50, 0);
        tx.data = Bytes::from_slice(&[1, 2, 3]);
        tx.gas = intrinsic_gas(tx.data.as_slice()) + 10; // identity needs 18

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(result.excepted);
        // All gas forfeited.
        assert_eq!(result.gas_used, tx.gas);
        // The value landed before the native charge and stays.
        assert_eq!(state.balance(native), U256::from(50));
    }

    // -------------------------------------------------------------------------
    // Interpreted calls
    // -------------------------------------------------------------------------

    #[test]
    fn test_interpreted_call_returns_output() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_code(contract, Bytes::from_slice(&RETURN_42));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let mut exec = Executive::new(&mut state, &config);
        assert_eq!(exec.setup(&tx).unwrap(), Dispatch::Pending);
        assert!(exec.go(None));
        let result = exec.finalize();

        assert!(!result.excepted);
        assert_eq!(result.output.len(), 32);
        assert_eq!(
            U256::from_big_endian(result.output.as_slice()),
            U256::from(42)
        );
        // Runtime costs 18 gas on top of the intrinsic charge.
        assert_eq!(result.gas_used, TX_GAS + 18);
    }

    #[test]
    fn test_call_fault_forfeits_gas_but_keeps_value() {
        let sender = addr(1);
        let contract = addr(2);
        let author = addr(0xEE);
        let mut state = funded_state(sender, 1_000_000);
        state.block_mut().author = author;
        state.set_code(contract, Bytes::from_slice(&[0xFE]));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 7, 30_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(result.excepted);
        assert_eq!(result.gas_used, 30_000);
        assert!(result.logs.is_empty());
        // The value transfer precedes the frame and survives its fault.
        assert_eq!(state.balance(contract), U256::from(7));
        assert_eq!(state.balance(author), U256::from(30_000));
        assert_eq!(state.nonce(sender), 1);
    }

    #[test]
    fn test_call_fault_rolls_back_storage() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        // Writes a slot, then hits an undefined instruction.
        state.set_code(contract, Bytes::from_slice(&[0x60, 0x01, 0x60, 0x05, 0x55, 0xFE]));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 60_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(result.excepted);
        assert!(state.storage_at(contract, U256::from(5)).is_zero());
    }

    #[test]
    fn test_logs_survive_into_result() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        // PUSH1 topic, PUSH1 size=0, PUSH1 offset=0, LOG1, STOP
        state.set_code(
            contract,
            Bytes::from_slice(&[0x60, 0x07, 0x60, 0x00, 0x60, 0x00, 0xA1, 0x00]),
        );
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 60_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(!result.excepted);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.logs[0].address, contract);
    }

    #[test]
    fn test_storage_clear_refund_capped_at_half() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_storage(contract, U256::from(5), U256::from(9));
        // PUSH1 0, PUSH1 5, SSTORE, STOP -- clears the slot
        state.set_code(contract, Bytes::from_slice(&[0x60, 0x00, 0x60, 0x05, 0x55, 0x00]));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(!result.excepted);
        // Consumed before refund: 21_000 + 3 + 3 + 5_000 = 26_006. The
        // 15_000 clear refund is capped at half of that.
        assert_eq!(result.gas_refunded, 13_003);
        assert_eq!(result.gas_used, 13_003);
        assert!(state.storage_at(contract, U256::from(5)).is_zero());
    }

    #[test]
    fn test_selfdestruct_erases_account_at_finalize() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.add_balance(contract, U256::from(500));
        // PUSH1 9, SELFDESTRUCT
        state.set_code(contract, Bytes::from_slice(&[0x60, 0x09, 0xFF]));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 10, 30_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(!result.excepted);
        assert!(state.account(contract).is_none());
        assert_eq!(state.balance(Address::from_low_u64(9)), U256::from(510));
    }

    // -------------------------------------------------------------------------
    // Creations
    // -------------------------------------------------------------------------

    #[test]
    fn test_creation_installs_code() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let init = deploy_init();
        let tx = Transaction {
            sender,
            receiver: None,
            value: U256::from(33),
            gas: 60_000,
            gas_price: U256::one(),
            nonce: 0,
            data: Bytes::from_slice(&init),
        };

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(!result.excepted);

        let created = services::contract_address(sender, 0);
        assert_eq!(result.new_address, Some(created));
        assert_eq!(
            state.code(created),
            Some(Bytes::from_slice(&RETURN_42))
        );
        assert_eq!(state.balance(created), U256::from(33));
        assert_eq!(state.nonce(sender), 1);
        // Intrinsic, 18 for the init run, 200 per installed byte.
        assert_eq!(
            result.gas_used,
            intrinsic_gas(&init) + 18 + RETURN_42.len() as u64 * costs::CREATE_DATA
        );
    }

    #[test]
    fn test_creation_unaffordable_deposit_discards_code() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let init = deploy_init();
        let tx = Transaction {
            sender,
            receiver: None,
            value: U256::zero(),
            // Enough to run init (18) but not the 2_000 deposit.
            gas: intrinsic_gas(&init) + 500,
            gas_price: U256::one(),
            nonce: 0,
            data: Bytes::from_slice(&init),
        };

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(!result.excepted);
        assert!(result.output.is_empty());

        let created = services::contract_address(sender, 0);
        assert!(state.account(created).is_some());
        assert_eq!(state.code(created), None);
    }

    #[test]
    fn test_creation_failed_init_keeps_endowed_account() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let tx = Transaction {
            sender,
            receiver: None,
            value: U256::from(30),
            gas: 60_000,
            gas_price: U256::one(),
            nonce: 0,
            data: Bytes::from_slice(&[0xFE]),
        };

        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(result.excepted);
        assert_eq!(result.gas_used, 60_000);

        // The account materialized before the frame ran and stays, endowed.
        let created = services::contract_address(sender, 0);
        assert_eq!(state.balance(created), U256::from(30));
        assert_eq!(state.code(created), None);
    }

    #[test]
    fn test_creation_with_empty_init_concludes_immediately() {
        let sender = addr(1);
        let mut state = funded_state(sender, 1_000_000);
        let config = ExecutiveConfig::default();

        let tx = Transaction {
            sender,
            receiver: None,
            value: U256::from(5),
            gas: 30_000,
            gas_price: U256::one(),
            nonce: 0,
            data: Bytes::new(),
        };

        let mut exec = Executive::new(&mut state, &config);
        assert_eq!(exec.setup(&tx).unwrap(), Dispatch::Done { success: true });
        assert!(exec.go(None));
        let result = exec.finalize();

        assert!(!result.excepted);
        assert_eq!(result.gas_used, TX_GAS);
        let created = services::contract_address(sender, 0);
        assert_eq!(state.balance(created), U256::from(5));
    }

    #[test]
    fn test_settled_transactions_leave_no_journal_entries() {
        // A block processor reuses one store across a whole block; the
        // undo log must not accumulate across settled transactions.
        let sender = addr(1);
        let mut state = funded_state(sender, 100_000_000);
        let config = ExecutiveConfig::default();

        for nonce in 0..100 {
            let mut tx = call_tx(sender, addr(2), 1, 30_000);
            tx.nonce = nonce;
            let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
            assert!(!result.excepted);
        }

        assert_eq!(state.journal_len(), 0);
        assert_eq!(state.balance(addr(2)), U256::from(100));
        assert_eq!(state.nonce(sender), 100);
    }

    #[test]
    fn test_faulted_transaction_also_settles_journal() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_code(contract, Bytes::from_slice(&[0xFE]));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(result.excepted);
        assert_eq!(state.journal_len(), 0);
    }

    // -------------------------------------------------------------------------
    // Step-limited driving
    // -------------------------------------------------------------------------

    #[test]
    fn test_step_limited_drive_resumes() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_code(contract, Bytes::from_slice(&RETURN_42));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let mut exec = Executive::new(&mut state, &config);
        assert_eq!(exec.setup(&tx).unwrap(), Dispatch::Pending);

        // Two instructions at a time until the frame concludes.
        let mut rounds = 0;
        while !exec.go_steps(None, 2) {
            rounds += 1;
            assert!(rounds < 100, "frame did not conclude");
        }
        assert!(!exec.excepted());

        let result = exec.finalize();
        assert_eq!(result.gas_used, TX_GAS + 18);
        assert_eq!(
            U256::from_big_endian(result.output.as_slice()),
            U256::from(42)
        );
    }

    #[test]
    fn test_step_limit_leaves_end_gas_untouched() {
        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_code(contract, Bytes::from_slice(&RETURN_42));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let mut exec = Executive::new(&mut state, &config);
        assert_eq!(exec.setup(&tx).unwrap(), Dispatch::Pending);
        let before = exec.end_gas();

        assert!(!exec.go_steps(None, 1));
        assert_eq!(exec.end_gas(), before);
        assert!(!exec.excepted());
    }

    // -------------------------------------------------------------------------
    // Nested frames
    // -------------------------------------------------------------------------

    #[test]
    fn test_nested_call_writes_callee_storage() {
        let sender = addr(1);
        let caller = addr(0xAA);
        let callee = addr(0xBB);
        let mut state = funded_state(sender, 10_000_000);

        // Callee stores 1 at slot 1.
        state.set_code(callee, Bytes::from_slice(&[0x60, 0x01, 0x60, 0x01, 0x55, 0x00]));

        // Caller: CALL(gas=0x7530, to=callee, value=0, empty ranges), STOP.
        let mut code = vec![
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73,
        ];
        code.extend_from_slice(callee.as_bytes());
        code.extend_from_slice(&[0x61, 0x75, 0x30, 0xF1, 0x00]);
        state.set_code(caller, Bytes::from_slice(&code));

        let config = ExecutiveConfig::default();
        let tx = call_tx(sender, caller, 0, 200_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        assert!(!result.excepted);
        assert_eq!(state.storage_at(callee, U256::from(1)), U256::from(1));
    }

    #[test]
    fn test_depth_limit_fails_nested_call_only() {
        let sender = addr(1);
        let caller = addr(0xAA);
        let callee = addr(0xBB);
        let mut state = funded_state(sender, 10_000_000);
        state.set_code(callee, Bytes::from_slice(&[0x60, 0x01, 0x60, 0x01, 0x55, 0x00]));

        let mut code = vec![
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73,
        ];
        code.extend_from_slice(callee.as_bytes());
        code.extend_from_slice(&[0x61, 0x75, 0x30, 0xF1, 0x00]);
        state.set_code(caller, Bytes::from_slice(&code));

        // Depth 0 is the transaction frame; no nesting allowed.
        let config = ExecutiveConfig { max_call_depth: 0 };
        let tx = call_tx(sender, caller, 0, 200_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();

        // The outer frame concludes; the inner call simply reported failure.
        assert!(!result.excepted);
        assert!(state.storage_at(callee, U256::from(1)).is_zero());
    }

    #[test]
    fn test_nested_create_from_code() {
        let sender = addr(1);
        let factory = addr(0xAA);
        let mut state = funded_state(sender, 10_000_000);

        // Factory: CREATE(value=0, offset=0, size=0), STOP. Empty init
        // yields an empty contract but still derives an address.
        state.set_code(
            factory,
            Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xF0, 0x00]),
        );

        let config = ExecutiveConfig::default();
        let tx = call_tx(sender, factory, 0, 200_000);
        let result = Executive::new(&mut state, &config).transact(&tx).unwrap();
        assert!(!result.excepted);

        // The factory consumed a nonce for the creation.
        assert_eq!(state.nonce(factory), 1);
        let created = services::contract_address(factory, 0);
        assert!(state.account(created).is_some());
    }

    #[test]
    fn test_simple_trace_observes_run() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let sender = addr(1);
        let contract = addr(2);
        let mut state = funded_state(sender, 1_000_000);
        state.set_code(contract, Bytes::from_slice(&RETURN_42));
        let config = ExecutiveConfig::default();

        let tx = call_tx(sender, contract, 0, 30_000);
        let mut exec = Executive::new(&mut state, &config);
        exec.setup(&tx).unwrap();

        let mut observer = simple_trace();
        assert!(exec.go(Some(&mut observer)));
        assert!(!exec.excepted());
    }
}
