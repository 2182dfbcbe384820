//! Vault key custody in the OS keyring.
//!
//! - **macOS**: Keychain Access
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)

use keyring::Entry;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use super::secure_store::SecureStore;
use crate::error::{Result, WovenError};
use crate::security::{base64_decode, base64_encode};

/// Default service name for keyring entries.
pub const DEFAULT_SERVICE_NAME: &str = "com.woven.vault";

pub struct KeyringSecureStore {
    service: String,
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl KeyringSecureStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry> {
        Entry::new(&self.service, account).map_err(|e| {
            error!("Failed to create keyring entry: {}", e);
            map_keyring_error(e)
        })
    }
}

impl SecureStore for KeyringSecureStore {
    fn store_secret(&self, account: &str, secret: &[u8]) -> Result<()> {
        debug!(
            "Storing {} byte secret in keyring (service: {}, account: {})",
            secret.len(),
            self.service,
            account
        );

        // Keyring APIs expect strings
        let encoded = Zeroizing::new(base64_encode(secret));
        self.entry(account)?
            .set_password(&encoded)
            .map_err(map_keyring_error)?;

        // Read back through a fresh entry so a cached value cannot mask a failed write
        let readback = self
            .entry(account)?
            .get_password()
            .map_err(map_keyring_error)?;
        if readback.as_str() != encoded.as_str() {
            error!("Keyring verification failed for account {}", account);
            return Err(WovenError::Storage(
                "Keyring verification failed: data mismatch".into(),
            ));
        }

        info!("Secret stored in OS keyring for account {}", account);
        Ok(())
    }

    fn retrieve_secret(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match self.entry(account)?.get_password() {
            Ok(encoded) => {
                let encoded = Zeroizing::new(encoded);
                let secret = base64_decode(&encoded)?;
                debug!("Retrieved {} byte secret for account {}", secret.len(), account);
                Ok(Some(Zeroizing::new(secret)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                error!("Failed to retrieve secret from keyring: {:?}", e);
                Err(map_keyring_error(e))
            }
        }
    }

    fn delete_secret(&self, account: &str) -> Result<()> {
        match self.entry(account)?.delete_credential() {
            Ok(()) => {
                info!("Secret deleted from OS keyring for account {}", account);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No secret to delete for account {}", account);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete secret from keyring: {:?}", e);
                Err(map_keyring_error(e))
            }
        }
    }
}

fn map_keyring_error(err: keyring::Error) -> WovenError {
    match err {
        keyring::Error::NoEntry => WovenError::NotFound("keyring entry".into()),
        keyring::Error::Ambiguous(_) => {
            WovenError::Storage("Multiple keyring entries found".into())
        }
        keyring::Error::NoStorageAccess(e) => {
            WovenError::Storage(format!("Keyring access denied: {:?}", e))
        }
        keyring::Error::PlatformFailure(e) => {
            WovenError::Storage(format!("Keyring platform failure: {:?}", e))
        }
        keyring::Error::BadEncoding(_) => {
            WovenError::InvalidKeyMaterial("Keyring returned non-UTF-8 data".into())
        }
        _ => WovenError::Storage(format!("Keyring error: {}", err)),
    }
}
