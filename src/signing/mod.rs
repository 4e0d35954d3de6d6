//! Transfer Signing Module
//!
//! Produces the ECDSA signature the relayer expects alongside each transfer.

mod signer;
pub use signer::EcdsaTransferSigner;
