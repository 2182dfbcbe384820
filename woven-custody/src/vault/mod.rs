//! Per-vault custody of key material.
//!
//! A device holds either the full vault key (normal vaults) or exactly one
//! share of it (strict vaults). Material is persisted through a
//! [`SecureStore`] backend; a key reconstructed for a strict vault only lives
//! in the in-memory unlocked session.

mod key;
#[cfg(feature = "os-keyring")]
mod keyring_store;
mod manager;
mod secure_store;

pub use key::{KeyMaterial, KeyShare, VaultKey, KEY_SIZE};
#[cfg(feature = "os-keyring")]
pub use keyring_store::KeyringSecureStore;
pub use manager::VaultKeyStore;
pub use secure_store::{MemorySecureStore, SecureStore};
