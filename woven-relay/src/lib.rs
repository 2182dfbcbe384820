//! Woven relay
//!
//! HTTP front for the access request state machine. The relay stores and
//! forwards public keys and sealed payloads; it never holds a private key
//! and cannot open anything it relays.

pub mod auth;
pub mod config;
pub mod routes;

pub use auth::{Caller, TokenDirectory};
pub use config::DirectoryFile;
pub use routes::{router, ApiError, RelayState};
