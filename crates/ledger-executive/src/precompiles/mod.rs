//! # Native (Precompiled) Contracts
//!
//! Contracts reachable at reserved low-valued addresses, executed natively
//! instead of through the interpreter. Each exposes a pure gas-cost
//! function over its input and a synchronous execute function.

pub mod identity;
pub mod sha256;

use crate::domain::value_objects::Bytes;
use std::collections::BTreeMap;

/// A native contract: a gas-cost formula and a synchronous execute
/// function over input bytes.
///
/// The call dispatcher charges `gas(input)` before running; a caller that
/// cannot afford it fails without `exec` ever being invoked.
pub trait NativeContract: Send + Sync {
    /// Gas required to execute over `input`.
    fn gas(&self, input: &[u8]) -> u64;

    /// Executes over `input`, producing output bytes. Infallible: native
    /// contracts are total functions of their input.
    fn exec(&self, input: &[u8]) -> Bytes;
}

/// Reserved index of the SHA-256 native contract.
pub const SHA256_INDEX: u64 = 2;
/// Reserved index of the identity (data copy) native contract.
pub const IDENTITY_INDEX: u64 = 4;

/// The registry installed into a fresh ledger state.
#[must_use]
pub fn default_registry() -> BTreeMap<u64, Box<dyn NativeContract>> {
    let mut registry: BTreeMap<u64, Box<dyn NativeContract>> = BTreeMap::new();
    registry.insert(SHA256_INDEX, Box::new(sha256::Sha256Native));
    registry.insert(IDENTITY_INDEX, Box::new(identity::Identity));
    registry
}

// =============================================================================
// TESTS
// =============================================================================
