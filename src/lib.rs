//! This crate implements the transfer dialog of a layer-2 exchange client.
//! It validates amounts against balance and fee, resolves recipients (raw
//! addresses or name-service names) to layer-2 accounts, and signs and submits
//! transfers through the relayer while keeping the sender's nonce current.

pub mod types; // Tokens, accounts, transfer requests and the error enums.
pub mod config; // Loads the TOML configuration.
pub mod collaborators; // Traits for everything the validator reads or calls.
pub mod validation; // The transfer validator and its amount / address rules.
pub mod state; // In-memory snapshot of tokens, balances and fees.
pub mod relayer; // REST client for the exchange relayer.
pub mod l1; // Name-service resolution on L1.
pub mod signing; // ECDSA transfer signing.
pub mod sync; // Keeps the snapshot fresh in the background.
pub mod api; // JSON-RPC surface for a presentation layer.

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use validation::TransferValidator;
