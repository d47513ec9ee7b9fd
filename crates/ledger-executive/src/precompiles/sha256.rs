//! # SHA-256 Native Contract (index 2)
//!
//! Computes the SHA-256 hash of its input.

use super::NativeContract;
use crate::domain::value_objects::Bytes;
use sha2::{Digest, Sha256};

/// Base gas cost.
const SHA256_BASE_GAS: u64 = 60;
/// Gas cost per 32-byte word of input.
const SHA256_WORD_GAS: u64 = 12;

/// SHA-256 native contract.
pub struct Sha256Native;

impl NativeContract for Sha256Native {
    fn gas(&self, input: &[u8]) -> u64 {
        let words = input.len().div_ceil(32) as u64;
        SHA256_BASE_GAS + SHA256_WORD_GAS * words
    }

    fn exec(&self, input: &[u8]) -> Bytes {
        let hash = Sha256::digest(input);
        Bytes::from_slice(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        let output = Sha256Native.exec(&[]);
        // SHA-256 of the empty string
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(output.as_slice(), &expected);
    }

    #[test]
    fn test_sha256_gas_scales_by_word() {
        let native = Sha256Native;
        assert_eq!(native.gas(&[]), SHA256_BASE_GAS);
        assert_eq!(native.gas(&[0u8; 32]), SHA256_BASE_GAS + SHA256_WORD_GAS);
        assert_eq!(
            native.gas(&[0u8; 33]),
            SHA256_BASE_GAS + 2 * SHA256_WORD_GAS
        );
    }
}
