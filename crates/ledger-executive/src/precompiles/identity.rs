//! # Identity Native Contract (index 4)
//!
//! Returns its input unchanged (data copy).

use super::NativeContract;
use crate::domain::value_objects::Bytes;

/// Base gas cost.
const IDENTITY_BASE_GAS: u64 = 15;
/// Gas cost per 32-byte word of input.
const IDENTITY_WORD_GAS: u64 = 3;

/// Identity (data copy) native contract.
pub struct Identity;

impl NativeContract for Identity {
    fn gas(&self, input: &[u8]) -> u64 {
        let words = input.len().div_ceil(32) as u64;
        IDENTITY_BASE_GAS + IDENTITY_WORD_GAS * words
    }

    fn exec(&self, input: &[u8]) -> Bytes {
        Bytes::from_slice(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_copies_input() {
        let output = Identity.exec(b"hello world");
        assert_eq!(output.as_slice(), b"hello world");
    }

    #[test]
    fn test_identity_gas() {
        assert_eq!(Identity.gas(&[]), IDENTITY_BASE_GAS);
        assert_eq!(Identity.gas(&[1u8; 64]), IDENTITY_BASE_GAS + 2 * IDENTITY_WORD_GAS);
    }
}
