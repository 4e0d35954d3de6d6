//! State Management Module
//!
//! This module provides an in-memory snapshot of the data a transfer is
//! validated against: token metadata, the sender's balances and the
//! per-token transfer fees.

mod cache;
pub use cache::SnapshotStore;
