//! Snapshot Sync Module
//!
//! Keeps the snapshot store in step with the relayer and tells the open
//! transfer dialog when balances or fees have moved.

mod poller;
pub use poller::SnapshotPoller;
