use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use zeroize::Zeroizing;

use crate::error::Result;

/// Platform secret storage the vault key store is layered on.
///
/// Every call completes before returning; in particular `delete_secret` must
/// be effective by the time it reports success.
pub trait SecureStore: Send + Sync {
    fn store_secret(&self, account: &str, secret: &[u8]) -> Result<()>;

    fn retrieve_secret(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Idempotent: deleting a missing secret succeeds.
    fn delete_secret(&self, account: &str) -> Result<()>;
}

/// Process-local secret storage. Contents are zeroised when replaced,
/// deleted or dropped.
#[derive(Default)]
pub struct MemorySecureStore {
    secrets: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemorySecureStore {
    fn store_secret(&self, account: &str, secret: &[u8]) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        secrets.insert(account.to_string(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn retrieve_secret(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(secrets.get(account).cloned())
    }

    fn delete_secret(&self, account: &str) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        secrets.remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemorySecureStore::new();
        store.store_secret("a", b"secret").unwrap();
        store.delete_secret("a").unwrap();
        store.delete_secret("a").unwrap();
        assert!(store.retrieve_secret("a").unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_previous_secret() {
        let store = MemorySecureStore::new();
        store.store_secret("a", b"first").unwrap();
        store.store_secret("a", b"second").unwrap();
        assert_eq!(store.retrieve_secret("a").unwrap().unwrap().as_slice(), b"second");
    }
}
