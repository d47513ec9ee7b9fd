//! # Execution Memory
//!
//! Byte-addressable memory that expands on demand; growth is charged per
//! 32-byte word.

use crate::vm::costs;

/// Word size in bytes.
pub const WORD_SIZE: usize = 32;

/// The interpreter's scratch memory.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Creates a new empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Current size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes after growing to cover `end`, rounded up to a word.
    #[must_use]
    pub fn projected_size(&self, end: usize) -> usize {
        let needed = end.div_ceil(WORD_SIZE) * WORD_SIZE;
        needed.max(self.data.len())
    }

    /// Gas charged for growing to cover `end`.
    #[must_use]
    pub fn expansion_gas(&self, end: usize) -> u64 {
        let current_words = self.data.len() / WORD_SIZE;
        let needed_words = end.div_ceil(WORD_SIZE);
        let new_words = needed_words.saturating_sub(current_words) as u64;
        new_words * costs::MEMORY_WORD
    }

    /// Grows memory to cover `end`, zero-filled.
    pub fn expand(&mut self, end: usize) {
        let size = self.projected_size(end);
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    /// Reads `size` bytes at `offset`. Caller must have expanded first.
    #[must_use]
    pub fn read(&self, offset: usize, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        self.data[offset..offset + size].to_vec()
    }

    /// Writes bytes at `offset`. Caller must have expanded first.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_rounds_to_word() {
        let mut memory = Memory::new();
        memory.expand(1);
        assert_eq!(memory.len(), WORD_SIZE);

        memory.expand(33);
        assert_eq!(memory.len(), 2 * WORD_SIZE);
    }

    #[test]
    fn test_expansion_gas() {
        let mut memory = Memory::new();
        assert_eq!(memory.expansion_gas(32), costs::MEMORY_WORD);
        assert_eq!(memory.expansion_gas(64), 2 * costs::MEMORY_WORD);

        memory.expand(32);
        // Already covered
        assert_eq!(memory.expansion_gas(32), 0);
        assert_eq!(memory.expansion_gas(64), costs::MEMORY_WORD);
    }

    #[test]
    fn test_read_write() {
        let mut memory = Memory::new();
        memory.expand(64);
        memory.write(32, &[0xaa, 0xbb]);
        assert_eq!(memory.read(32, 2), vec![0xaa, 0xbb]);
        assert_eq!(memory.read(34, 2), vec![0, 0]);
    }
}
