//! Relayer Integration Module
//!
//! HTTP access to the exchange relayer: account lookup, transfer submission,
//! transfer history and the data behind the balance / fee / token snapshot.

mod client;
pub use client::{RelayerClient, RelayerError, TransferRecord};
