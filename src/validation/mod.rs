//! Transfer Validation Module
//!
//! This module owns the lifecycle of one pending transfer: amount entry,
//! recipient resolution, fee computation and submission. It performs no I/O
//! of its own; everything external goes through `crate::collaborators`.

pub mod address;
pub mod amount;
mod validator;


pub use validator::{TransferRequestState, TransferValidator, TransferView};
