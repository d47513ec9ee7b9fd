//! # Domain Services
//!
//! Pure, deterministic functions used by the Executive: contract address
//! derivation, the intrinsic gas floor, and hashing. No I/O, no state.

use crate::domain::value_objects::{Address, Hash};
use sha3::{Digest, Keccak256};

// =============================================================================
// INTRINSIC GAS
// =============================================================================

/// Base gas charged for any transaction.
pub const TX_GAS: u64 = 21_000;
/// Gas per zero byte of payload.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// Gas per non-zero byte of payload.
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;

/// Computes the intrinsic gas floor of a transaction payload.
///
/// This is the cost charged before any code runs; a transaction whose gas
/// limit cannot cover it is rejected during setup.
#[must_use]
pub fn intrinsic_gas(payload: &[u8]) -> u64 {
    let data_gas: u64 = payload
        .iter()
        .map(|&byte| {
            if byte == 0 {
                TX_DATA_ZERO_GAS
            } else {
                TX_DATA_NON_ZERO_GAS
            }
        })
        .sum();
    TX_GAS + data_gas
}

// =============================================================================
// CONTRACT ADDRESS DERIVATION
// =============================================================================

/// Derives the address of a newly created contract.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12..\], where `nonce` is the
/// creator's nonce at the time of creation (before it is incremented for
/// this creation). Same (sender, nonce) always yields the same address.
#[must_use]
pub fn contract_address(sender: Address, nonce: u64) -> Address {
    let mut content = Vec::with_capacity(32);

    // RLP encode address (20 bytes => 0x80 + 20 = 0x94)
    content.push(0x94);
    content.extend_from_slice(sender.as_bytes());

    // RLP encode nonce
    if nonce == 0 {
        content.push(0x80); // Empty byte string
    } else if nonce < 128 {
        content.push(nonce as u8);
    } else {
        let nonce_bytes = trimmed_be_bytes(nonce);
        content.push(0x80 + nonce_bytes.len() as u8);
        content.extend_from_slice(&nonce_bytes);
    }

    // RLP list header; payload is always < 56 bytes here
    let mut rlp_data = Vec::with_capacity(content.len() + 1);
    rlp_data.push(0xc0 + content.len() as u8);
    rlp_data.extend_from_slice(&content);

    // Hash and take last 20 bytes
    let hash = Keccak256::digest(&rlp_data);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

/// Big-endian bytes of a u64 without leading zeros.
fn trimmed_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes the keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_gas_empty() {
        assert_eq!(intrinsic_gas(&[]), TX_GAS);
    }

    #[test]
    fn test_intrinsic_gas_mixed_payload() {
        // 3 non-zero bytes and 2 zero bytes
        let payload = [1u8, 2, 3, 0, 0];
        assert_eq!(
            intrinsic_gas(&payload),
            TX_GAS + 3 * TX_DATA_NON_ZERO_GAS + 2 * TX_DATA_ZERO_GAS
        );
    }

    #[test]
    fn test_contract_address_deterministic() {
        let sender = Address::new([42u8; 20]);

        let addr1 = contract_address(sender, 100);
        let addr2 = contract_address(sender, 100);
        assert_eq!(addr1, addr2);
    }

    #[test]
    fn test_contract_address_nonce_sensitivity() {
        let sender = Address::new([1u8; 20]);
        let addr0 = contract_address(sender, 0);
        let addr1 = contract_address(sender, 1);
        assert_ne!(addr0, addr1);
    }

    #[test]
    fn test_contract_address_known_vector() {
        // keccak256(rlp([0x6ac7ea33f8831ea9dcce253033f6e0d37e007d28, 0]))[12..]
        // = 0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d
        let sender = Address::new([
            0x6a, 0xc7, 0xea, 0x33, 0xf8, 0x83, 0x1e, 0xa9, 0xdc, 0xce, 0x25, 0x30, 0x33, 0xf6,
            0xe0, 0xd3, 0x7e, 0x00, 0x7d, 0x28,
        ]);
        let addr = contract_address(sender, 0);
        assert_eq!(
            addr.as_bytes(),
            &[
                0xcd, 0x23, 0x4a, 0x47, 0x1b, 0x72, 0xba, 0x2f, 0x1c, 0xcf, 0x0a, 0x70, 0xfc,
                0xab, 0xa6, 0x48, 0xa5, 0xee, 0xcd, 0x8d
            ]
        );
    }

    #[test]
    fn test_contract_address_large_nonce() {
        let sender = Address::new([7u8; 20]);
        // Nonces above 127 take the multi-byte RLP path
        let addr_small = contract_address(sender, 127);
        let addr_large = contract_address(sender, 128);
        assert_ne!(addr_small, addr_large);
    }

    #[test]
    fn test_keccak256_empty() {
        // keccak256("") starts with c5d24601
        let hash = keccak256(&[]);
        assert_eq!(hash.as_bytes()[0..4], [0xc5, 0xd2, 0x46, 0x01]);
    }
}
