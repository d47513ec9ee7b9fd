//! # Execution Stack
//!
//! LIFO stack of 256-bit words, bounded at 1024 entries.

use crate::domain::value_objects::U256;
use crate::errors::VmFault;

/// Maximum stack size.
pub const MAX_STACK_SIZE: usize = 1024;

/// The interpreter's operand stack.
#[derive(Clone, Debug, Default)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    /// Creates a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(64),
        }
    }

    /// Returns the number of elements on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current contents, bottom first.
    #[must_use]
    pub fn as_slice(&self) -> &[U256] {
        &self.data
    }

    /// Push a value onto the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackOverflow` if the stack is full.
    pub fn push(&mut self, value: U256) -> Result<(), VmFault> {
        if self.data.len() >= MAX_STACK_SIZE {
            return Err(VmFault::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pop a value from the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn pop(&mut self) -> Result<U256, VmFault> {
        self.data.pop().ok_or(VmFault::StackUnderflow)
    }

    /// Peek at the value at a given depth (0 = top).
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the index is out of bounds.
    pub fn peek_at(&self, depth: usize) -> Result<U256, VmFault> {
        if depth >= self.data.len() {
            return Err(VmFault::StackUnderflow);
        }
        Ok(self.data[self.data.len() - 1 - depth])
    }

    /// Swap the top element with the element at depth `n` (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if not enough elements.
    pub fn swap(&mut self, n: usize) -> Result<(), VmFault> {
        if n == 0 || n >= self.data.len() {
            return Err(VmFault::StackUnderflow);
        }
        let len = self.data.len();
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }

    /// Duplicate the element at depth `n` (0 = top) and push it.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the element does not exist, or
    /// `StackOverflow` if the stack is full.
    pub fn dup(&mut self, n: usize) -> Result<(), VmFault> {
        let value = self.peek_at(n)?;
        self.push(value)
    }
}

// =============================================================================
// TESTS
// =============================================================================
