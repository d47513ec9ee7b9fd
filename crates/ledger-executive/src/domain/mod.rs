//! # Domain Layer
//!
//! Pure types and functions for transaction execution.
//! Nothing in this module performs I/O or touches the ledger store.

pub mod entities;
pub mod invariants;
pub mod services;
pub mod value_objects;
