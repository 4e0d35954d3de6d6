//! Layer 1 Integration Module
//!
//! This module handles the pieces of the transfer workflow that need the
//! Ethereum L1 chain:
//! - Resolves name-service recipients (`alice.eth`) to addresses

mod ens;
pub use ens::EnsResolver;
