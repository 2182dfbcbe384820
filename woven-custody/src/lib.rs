//! Consent-gated custody of vault keys.
//!
//! A strict vault's key is split into two XOR shares, one per member device.
//! To unlock, one device opens an access request carrying a fresh X25519
//! public key; the partner approves by sealing its share to that key
//! (HKDF-SHA256 + AES-256-GCM) and the relay in between only ever sees
//! public keys and ciphertext.

pub mod access;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod security;
pub mod vault;

pub use access::{AccessRequest, AccessRequestMachine, RequestId, RequestStatus, UserId};
pub use client::{ApprovalOutcome, ApproverClient, HttpAccessApi, RequestClient};
pub use error::{Result, WovenError};
pub use security::{reconstruct, split, EncryptedPayload, EphemeralKeyPair, EphemeralPublicKey};
pub use vault::{KeyShare, VaultKey, VaultKeyStore};
