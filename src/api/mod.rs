//! Administration API integration for the mining backend
//!
//! This module provides the client, session and wire types used to talk to the backend's
//! administration API: login, account management, per-host logs and per-miner chains.

/// Typed client exposing the API operations
mod client;
/// Response shape validation
pub mod schema;
/// Bearer token session
mod session;
/// HTTP transport and status classification
pub mod transport;
/// Hosts, payloads and error kinds
mod types;

pub use client::ApiClient;
pub use session::AuthSession;
pub use transport::{HttpTransport, Transport};
pub use types::*;
