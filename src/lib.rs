//! FileChain - a peer-replicated ledger of file transactions
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, canonical hashing, ledger state and chain validation
//! - [`transaction`] - File transaction records and submission validation
//!
//! ## Consensus & Mining
//! - [`miner`] - Bounded, cancellable proof-of-work
//! - [`sync`] - Longest-valid-chain resolution
//!
//! ## Networking & Integration
//! - [`network`] - Peer directory, transport and broadcast
//! - [`api`] - HTTP/JSON server
//! - [`node`] - Process orchestration
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`logging`] - Tracing subscriber setup

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;
pub mod sync;

// ============================================================================
// Networking & Integration
// ============================================================================
pub mod api;
pub mod network;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;
