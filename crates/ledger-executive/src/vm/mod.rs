//! # Interpreter Seam
//!
//! The Executive consumes the bytecode interpreter through the narrow
//! [`Vm`] trait: instantiate with a gas budget, drive to completion or
//! fault over an [`Externalities`](crate::ext::Externalities) adapter, and
//! query remaining gas. A concrete gas-metered [`Interpreter`] ships with
//! the crate.

pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod stack;

pub use interpreter::Interpreter;
pub use opcodes::Opcode;

use crate::domain::value_objects::{Bytes, U256};
use crate::errors::VmFault;
use crate::ext::Externalities;

// =============================================================================
// GAS SCHEDULE
// =============================================================================

/// Gas costs for interpreted execution.
pub mod costs {
    /// Quick operations (PC, GAS, CALLER, ...).
    pub const BASE: u64 = 2;
    /// Very low cost (ADD, PUSH, DUP, ...).
    pub const VERY_LOW: u64 = 3;
    /// Low cost (MUL, DIV, ...).
    pub const LOW: u64 = 5;
    /// Mid cost (JUMP).
    pub const MID: u64 = 8;
    /// High cost (JUMPI).
    pub const HIGH: u64 = 10;
    /// Jump destination marker.
    pub const JUMPDEST: u64 = 1;
    /// BALANCE opcode.
    pub const BALANCE: u64 = 20;
    /// Storage read.
    pub const SLOAD: u64 = 50;
    /// Storage write, zero to non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// Storage write, all other transitions.
    pub const SSTORE_RESET: u64 = 5_000;
    /// Refund credited when a non-zero slot is cleared.
    pub const SSTORE_CLEAR_REFUND: u64 = 15_000;
    /// LOG base cost.
    pub const LOG: u64 = 375;
    /// LOG cost per topic.
    pub const LOG_TOPIC: u64 = 375;
    /// LOG cost per byte of data.
    pub const LOG_DATA: u64 = 8;
    /// CREATE opcode base cost.
    pub const CREATE: u64 = 32_000;
    /// CALL opcode base cost.
    pub const CALL: u64 = 40;
    /// Gas per 32-byte word of memory growth.
    pub const MEMORY_WORD: u64 = 3;
    /// Per-byte charge for installing created contract code.
    pub const CREATE_DATA: u64 = 200;
}

// =============================================================================
// TRACE CALLBACK
// =============================================================================

/// One executed instruction, as seen by the diagnostic trace callback.
///
/// Purely observational: the callback gets read access only and can never
/// alter the execution outcome.
#[derive(Debug)]
pub struct TraceStep<'a> {
    /// Instructions executed so far in this frame.
    pub steps: u64,
    /// Instruction about to execute.
    pub opcode: Opcode,
    /// Memory size in bytes after any growth this instruction causes.
    pub new_mem_size: usize,
    /// Gas this instruction will charge.
    pub gas_cost: u64,
    /// Gas remaining before the charge.
    pub gas_remaining: u64,
    /// Current stack contents, bottom first.
    pub stack: &'a [U256],
    /// Call depth of the frame.
    pub depth: u16,
}

/// Optional per-instruction observer hook.
pub type OnOp<'a> = Option<&'a mut dyn FnMut(&TraceStep)>;

// =============================================================================
// VM TRAIT
// =============================================================================

/// A bytecode interpreter instance sized to a gas budget.
///
/// `run` executes the adapter's code to completion, gas exhaustion, or a
/// runtime fault. A `step_limit` bounds the number of instructions this
/// drive call may execute; hitting it returns
/// [`VmFault::StepLimitReached`] with the instance left resumable.
pub trait Vm {
    /// Drives execution, producing the frame's output bytes.
    fn run(
        &mut self,
        ext: &mut dyn Externalities,
        on_op: OnOp<'_>,
        step_limit: Option<u64>,
    ) -> Result<Bytes, VmFault>;

    /// Gas remaining in this instance.
    fn gas(&self) -> u64;
}

// =============================================================================
// TESTS
// =============================================================================
