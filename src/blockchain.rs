// Thin re-export module: implementation lives under `blockchain/core` so
// block hashing, ledger state and chain validation stay in separate files.

pub mod core;
pub use core::*;
