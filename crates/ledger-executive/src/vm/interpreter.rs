//! # Interpreter
//!
//! A gas-metered stack machine implementing the [`Vm`] seam. Sized to a
//! gas budget at construction; keeps its program counter, stack, and
//! memory across drive calls so a step-limited run can resume.

use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::errors::VmFault;
use crate::ext::Externalities;
use crate::vm::costs;
use crate::vm::memory::Memory;
use crate::vm::opcodes::Opcode;
use crate::vm::stack::Stack;
use crate::vm::{OnOp, TraceStep, Vm};
use std::collections::HashSet;

/// Offsets and sizes beyond this are unpayable and fault as gas
/// exhaustion before any conversion overflow can occur.
const MAX_OFFSET: usize = 0x7fff_ffff;

/// The shipped interpreter.
pub struct Interpreter {
    gas: u64,
    pc: usize,
    stack: Stack,
    memory: Memory,
    steps: u64,
}

impl Interpreter {
    /// Creates an instance sized to a gas budget.
    #[must_use]
    pub fn new(gas: u64) -> Self {
        Self {
            gas,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            steps: 0,
        }
    }

    /// Charges gas, faulting on exhaustion.
    fn charge(&mut self, amount: u64) -> Result<(), VmFault> {
        if amount > self.gas {
            return Err(VmFault::OutOfGas);
        }
        self.gas -= amount;
        Ok(())
    }

    /// Gas cost and projected memory end for the instruction at `pc`.
    ///
    /// Dynamic costs peek at the stack without popping; underflow here is
    /// the same fault the execution would hit.
    fn plan(&self, opcode: Opcode, ext: &dyn Externalities) -> Result<(u64, usize), VmFault> {
        let cost = match opcode {
            Opcode::Stop | Opcode::Return | Opcode::SelfDestruct => 0,
            Opcode::Add | Opcode::Sub | Opcode::Not | Opcode::IsZero | Opcode::And
            | Opcode::Or | Opcode::Lt | Opcode::Gt | Opcode::Eq | Opcode::CallDataLoad
            | Opcode::MLoad | Opcode::MStore | Opcode::Push(_) | Opcode::Dup(_)
            | Opcode::Swap(_) => costs::VERY_LOW,
            Opcode::Mul | Opcode::Div => costs::LOW,
            Opcode::Address | Opcode::Origin | Opcode::Caller | Opcode::CallValue
            | Opcode::CallDataSize | Opcode::GasPrice | Opcode::Pop | Opcode::Pc
            | Opcode::Gas => costs::BASE,
            Opcode::Balance => costs::BALANCE,
            Opcode::SLoad => costs::SLOAD,
            Opcode::SStore => {
                let key = self.stack.peek_at(0)?;
                let value = self.stack.peek_at(1)?;
                let old = ext.storage_at(key);
                if old.is_zero() && !value.is_zero() {
                    costs::SSTORE_SET
                } else {
                    costs::SSTORE_RESET
                }
            }
            Opcode::Jump => costs::MID,
            Opcode::JumpI => costs::HIGH,
            Opcode::JumpDest => costs::JUMPDEST,
            Opcode::Log(topics) => {
                let size = to_usize(self.stack.peek_at(1)?)?;
                costs::LOG + u64::from(topics) * costs::LOG_TOPIC + size as u64 * costs::LOG_DATA
            }
            Opcode::Create => costs::CREATE,
            Opcode::Call => costs::CALL,
        };

        let mem_end = match opcode {
            Opcode::MLoad | Opcode::MStore => to_usize(self.stack.peek_at(0)?)? + 32,
            Opcode::Return | Opcode::Log(_) => {
                let offset = to_usize(self.stack.peek_at(0)?)?;
                let size = to_usize(self.stack.peek_at(1)?)?;
                mem_span(offset, size)?
            }
            Opcode::Create => {
                let offset = to_usize(self.stack.peek_at(1)?)?;
                let size = to_usize(self.stack.peek_at(2)?)?;
                mem_span(offset, size)?
            }
            Opcode::Call => {
                let in_end = mem_span(
                    to_usize(self.stack.peek_at(3)?)?,
                    to_usize(self.stack.peek_at(4)?)?,
                )?;
                let out_end = mem_span(
                    to_usize(self.stack.peek_at(5)?)?,
                    to_usize(self.stack.peek_at(6)?)?,
                )?;
                in_end.max(out_end)
            }
            _ => 0,
        };

        Ok((cost + self.memory.expansion_gas(mem_end), mem_end))
    }

    /// Executes one instruction. Returns the frame output when halting.
    #[allow(clippy::too_many_lines)]
    fn step(
        &mut self,
        opcode: Opcode,
        code: &[u8],
        jump_dests: &HashSet<usize>,
        ext: &mut dyn Externalities,
    ) -> Result<Option<Bytes>, VmFault> {
        self.pc += 1;

        match opcode {
            Opcode::Stop => return Ok(Some(Bytes::new())),

            Opcode::Add => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }
            Opcode::Mul => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }
            Opcode::Sub => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }
            Opcode::Div => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() { U256::zero() } else { a / b };
                self.stack.push(result)?;
            }
            Opcode::Lt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(bool_word(a < b))?;
            }
            Opcode::Gt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(bool_word(a > b))?;
            }
            Opcode::Eq => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(bool_word(a == b))?;
            }
            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push(bool_word(a.is_zero()))?;
            }
            Opcode::And => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a & b)?;
            }
            Opcode::Or => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a | b)?;
            }
            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }

            Opcode::Address => self.stack.push(address_word(ext.address()))?,
            Opcode::Balance => {
                let address = to_address(self.stack.pop()?);
                self.stack.push(ext.balance(address))?;
            }
            Opcode::Origin => self.stack.push(address_word(ext.origin()))?,
            Opcode::Caller => self.stack.push(address_word(ext.sender()))?,
            Opcode::CallValue => self.stack.push(ext.value())?,
            Opcode::CallDataLoad => {
                let offset = to_usize(self.stack.pop()?)?;
                let mut word = [0u8; 32];
                let data = ext.data();
                for (i, byte) in word.iter_mut().enumerate() {
                    *byte = data.get(offset + i).copied().unwrap_or(0);
                }
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::CallDataSize => self.stack.push(U256::from(ext.data().len()))?,
            Opcode::GasPrice => self.stack.push(ext.gas_price())?,

            Opcode::Pop => {
                self.stack.pop()?;
            }
            Opcode::MLoad => {
                let offset = to_usize(self.stack.pop()?)?;
                let word = self.memory.read(offset, 32);
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::MStore => {
                let offset = to_usize(self.stack.pop()?)?;
                let value = self.stack.pop()?;
                let mut word = [0u8; 32];
                value.to_big_endian(&mut word);
                self.memory.write(offset, &word);
            }
            Opcode::SLoad => {
                let key = self.stack.pop()?;
                self.stack.push(ext.storage_at(key))?;
            }
            Opcode::SStore => {
                let key = self.stack.pop()?;
                let value = self.stack.pop()?;
                let old = ext.storage_at(key);
                if !old.is_zero() && value.is_zero() {
                    ext.add_refund(costs::SSTORE_CLEAR_REFUND);
                }
                ext.set_storage(key, value);
            }
            Opcode::Jump => {
                let dest = to_usize(self.stack.pop()?)?;
                if !jump_dests.contains(&dest) {
                    return Err(VmFault::BadJumpDestination(dest));
                }
                self.pc = dest;
            }
            Opcode::JumpI => {
                let dest = to_usize(self.stack.pop()?)?;
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    if !jump_dests.contains(&dest) {
                        return Err(VmFault::BadJumpDestination(dest));
                    }
                    self.pc = dest;
                }
            }
            Opcode::Pc => self.stack.push(U256::from(self.pc - 1))?,
            Opcode::Gas => self.stack.push(U256::from(self.gas))?,
            Opcode::JumpDest => {}

            Opcode::Push(n) => {
                let n = n as usize;
                let mut word = [0u8; 32];
                for i in 0..n {
                    word[32 - n + i] = code.get(self.pc + i).copied().unwrap_or(0);
                }
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += n;
            }
            Opcode::Dup(n) => self.stack.dup(n as usize - 1)?,
            Opcode::Swap(n) => self.stack.swap(n as usize)?,

            Opcode::Log(count) => {
                let offset = to_usize(self.stack.pop()?)?;
                let size = to_usize(self.stack.pop()?)?;
                let mut topics = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    topics.push(Hash::from_u256(self.stack.pop()?));
                }
                let data = Bytes::from(self.memory.read(offset, size));
                ext.log(topics, data);
            }

            Opcode::Create => {
                let endowment = self.stack.pop()?;
                let offset = to_usize(self.stack.pop()?)?;
                let size = to_usize(self.stack.pop()?)?;
                let init = self.memory.read(offset, size);

                // All remaining gas is forwarded to initialization.
                let forwarded = self.gas;
                self.gas = 0;
                let (address, gas_left) = ext.create(endowment, forwarded, &init);
                self.gas = gas_left.min(forwarded);
                match address {
                    Some(created) => self.stack.push(address_word(created))?,
                    None => self.stack.push(U256::zero())?,
                }
            }
            Opcode::Call => {
                let gas_requested = to_u64(self.stack.pop()?);
                let to = to_address(self.stack.pop()?);
                let value = self.stack.pop()?;
                let in_offset = to_usize(self.stack.pop()?)?;
                let in_size = to_usize(self.stack.pop()?)?;
                let out_offset = to_usize(self.stack.pop()?)?;
                let out_size = to_usize(self.stack.pop()?)?;

                let input = self.memory.read(in_offset, in_size);
                let forwarded = gas_requested.min(self.gas);
                self.gas -= forwarded;
                let outcome = ext.call(forwarded, to, value, &input);
                self.gas += outcome.gas_left.min(forwarded);

                let n = out_size.min(outcome.output.len());
                if n > 0 {
                    self.memory.write(out_offset, &outcome.output.as_slice()[..n]);
                }
                self.stack.push(bool_word(outcome.success))?;
            }

            Opcode::Return => {
                let offset = to_usize(self.stack.pop()?)?;
                let size = to_usize(self.stack.pop()?)?;
                return Ok(Some(Bytes::from(self.memory.read(offset, size))));
            }
            Opcode::SelfDestruct => {
                let beneficiary = to_address(self.stack.pop()?);
                ext.suicide(beneficiary);
                return Ok(Some(Bytes::new()));
            }
        }

        Ok(None)
    }
}

impl Vm for Interpreter {
    fn run(
        &mut self,
        ext: &mut dyn Externalities,
        mut on_op: OnOp<'_>,
        step_limit: Option<u64>,
    ) -> Result<Bytes, VmFault> {
        let code = ext.code().to_vec();
        let jump_dests = analyze_jump_dests(&code);
        let mut steps_this_run = 0u64;

        loop {
            if self.pc >= code.len() {
                // Running off the end of code is an implicit stop.
                return Ok(Bytes::new());
            }
            if let Some(limit) = step_limit {
                if steps_this_run >= limit {
                    return Err(VmFault::StepLimitReached);
                }
            }

            let byte = code[self.pc];
            let opcode = Opcode::from_byte(byte).ok_or(VmFault::BadInstruction(byte))?;
            let (gas_cost, mem_end) = self.plan(opcode, ext)?;

            if let Some(observer) = on_op.as_mut() {
                observer(&TraceStep {
                    steps: self.steps,
                    opcode,
                    new_mem_size: self.memory.projected_size(mem_end),
                    gas_cost,
                    gas_remaining: self.gas,
                    stack: self.stack.as_slice(),
                    depth: ext.depth(),
                });
            }

            self.charge(gas_cost)?;
            self.memory.expand(mem_end);

            let halted = self.step(opcode, &code, &jump_dests, ext)?;
            self.steps += 1;
            steps_this_run += 1;

            if let Some(output) = halted {
                return Ok(output);
            }
        }
    }

    fn gas(&self) -> u64 {
        self.gas
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Valid jump targets: JUMPDEST bytes outside push immediates.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        let byte = code[i];
        if byte == 0x5B {
            dests.insert(i);
        }
        if (0x60..=0x7F).contains(&byte) {
            i += (byte - 0x5F) as usize;
        }
        i += 1;
    }
    dests
}

fn to_usize(value: U256) -> Result<usize, VmFault> {
    if value > U256::from(MAX_OFFSET) {
        return Err(VmFault::OutOfGas);
    }
    Ok(value.as_usize())
}

fn to_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

fn to_address(value: U256) -> Address {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[12..]);
    Address::new(addr)
}

fn address_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

fn bool_word(condition: bool) -> U256 {
    if condition {
        U256::one()
    } else {
        U256::zero()
    }
}

fn mem_span(offset: usize, size: usize) -> Result<usize, VmFault> {
    if size == 0 {
        return Ok(0);
    }
    let end = offset.checked_add(size).ok_or(VmFault::OutOfGas)?;
    if end > MAX_OFFSET {
        return Err(VmFault::OutOfGas);
    }
    Ok(end)
}

// =============================================================================
// TESTS
// =============================================================================
