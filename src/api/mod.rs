//! API Module
//!
//! This module exposes the transfer dialog over JSON-RPC so a presentation
//! layer can drive it over HTTP.

mod server;
pub use server::Server;
