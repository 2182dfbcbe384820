//! VaultKeyStore - custody of vault keys and key shares on one device.
//!
//! This module provides the VaultKeyStore struct that handles:
//! - Key generation and per-vault provisioning (normal and strict custody)
//! - Persisting, loading and deleting material through a [`SecureStore`]
//! - Handing out this device's share for relaying, and refusing to hand out
//!   a full key
//! - Volatile unlocked sessions for strict vaults

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::key::{KeyMaterial, KeyShare, VaultKey};
use super::secure_store::SecureStore;
use crate::error::{Result, WovenError};
use crate::security::Entropy;

/// Prefix for per-vault account names in the secure store.
const ACCOUNT_PREFIX: &str = "vault-key";

pub struct VaultKeyStore {
    backend: Arc<dyn SecureStore>,
    entropy: Arc<Entropy>,
    /// Keys reconstructed for strict vaults. Never persisted.
    sessions: RwLock<HashMap<Uuid, VaultKey>>,
}

impl VaultKeyStore {
    pub fn new(backend: Arc<dyn SecureStore>, entropy: Arc<Entropy>) -> Self {
        Self {
            backend,
            entropy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn account(vault_id: Uuid) -> String {
        format!("{}-{}", ACCOUNT_PREFIX, vault_id)
    }

    /// Generate a fresh 32-byte vault key. Nothing is stored.
    pub fn create(&self) -> Result<VaultKey> {
        VaultKey::generate(&self.entropy)
    }

    pub fn get(&self, vault_id: Uuid) -> Result<Option<KeyMaterial>> {
        let Some(blob) = self.backend.retrieve_secret(&Self::account(vault_id))? else {
            return Ok(None);
        };
        KeyMaterial::from_blob(&blob).map(Some)
    }

    /// Persist material for a vault.
    ///
    /// A vault that holds a share is in strict custody; writing a full key
    /// over it is refused.
    pub fn put(&self, vault_id: Uuid, material: &KeyMaterial) -> Result<()> {
        if let KeyMaterial::Key(_) = material {
            if let Some(KeyMaterial::Share(_)) = self.get(vault_id)? {
                warn!("Refusing to store a full key for strict vault {}", vault_id);
                return Err(WovenError::PolicyViolation(
                    "a strict vault never persists its full key".into(),
                ));
            }
        }

        self.backend
            .store_secret(&Self::account(vault_id), &material.to_blob())?;
        debug!(
            "Stored {} for vault {}",
            if material.is_share() { "key share" } else { "vault key" },
            vault_id
        );
        Ok(())
    }

    /// Remove all material for a vault, including any unlocked session.
    /// Returns only once the backend has deleted the secret.
    pub fn delete(&self, vault_id: Uuid) -> Result<()> {
        self.lock(vault_id);
        self.backend.delete_secret(&Self::account(vault_id))?;
        info!("Deleted key material for vault {}", vault_id);
        Ok(())
    }

    /// Normal custody: this device keeps the whole key.
    pub fn provision_normal(&self, vault_id: Uuid) -> Result<()> {
        let key = self.create()?;
        self.put(vault_id, &KeyMaterial::Key(key))
    }

    /// Strict custody: keep one share and return the other for the partner
    /// device. The full key is dropped before returning.
    pub fn provision_strict(&self, vault_id: Uuid) -> Result<KeyShare> {
        let key = self.create()?;
        let (own, partner) = key.split(&self.entropy)?;
        drop(key);

        self.put(vault_id, &KeyMaterial::Share(own))?;
        info!("Provisioned strict vault {}", vault_id);
        Ok(partner)
    }

    /// Install the share handed over by the partner at provisioning time.
    pub fn install_share(&self, vault_id: Uuid, share: KeyShare) -> Result<()> {
        self.put(vault_id, &KeyMaterial::Share(share))
    }

    /// This device's share, for sealing to the requester.
    ///
    /// Full keys are never relayed, so a vault held in normal custody is a
    /// policy violation here.
    pub fn share_for_relay(&self, vault_id: Uuid) -> Result<KeyShare> {
        match self.get(vault_id)? {
            Some(KeyMaterial::Share(share)) => Ok(share),
            Some(KeyMaterial::Key(_)) => Err(WovenError::PolicyViolation(
                "full vault keys are never relayed".into(),
            )),
            None => Err(WovenError::NotFound(format!(
                "no key material for vault {}",
                vault_id
            ))),
        }
    }

    /// Combine the partner's share with ours and open an unlocked session.
    pub fn unlock_with_share(&self, vault_id: Uuid, partner_share: &KeyShare) -> Result<()> {
        let own = self.share_for_relay(vault_id)?;
        if own == *partner_share {
            // Identical shares would reconstruct an all-zero key
            return Err(WovenError::InvalidKeyMaterial(
                "received our own share back".into(),
            ));
        }

        let key = own.combine(partner_share)?;
        self.unlock(vault_id, key);
        Ok(())
    }

    pub fn unlock(&self, vault_id: Uuid, key: VaultKey) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(vault_id, key);
        info!("Vault {} unlocked", vault_id);
    }

    pub fn unlocked(&self, vault_id: Uuid) -> Option<VaultKey> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&vault_id).cloned()
    }

    /// The key a consumer (media encryption) should use right now: the
    /// unlocked session key, or the stored key of a normal vault.
    pub fn vault_key(&self, vault_id: Uuid) -> Result<Option<VaultKey>> {
        if let Some(key) = self.unlocked(vault_id) {
            return Ok(Some(key));
        }

        match self.get(vault_id)? {
            Some(KeyMaterial::Key(key)) => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    /// End the unlocked session; the key is zeroised on removal.
    pub fn lock(&self, vault_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let was_unlocked = sessions.remove(&vault_id).is_some();
        if was_unlocked {
            info!("Vault {} locked", vault_id);
        }
        was_unlocked
    }

    pub fn lock_all(&self) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if !sessions.is_empty() {
            info!("Locking {} vault session(s)", sessions.len());
        }
        sessions.clear();
    }
}
