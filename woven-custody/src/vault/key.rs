use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, WovenError};
use crate::security::{reconstruct, split, Entropy};

pub const KEY_SIZE: usize = 32;

const KIND_FULL_KEY: u8 = 0x01;
const KIND_SHARE: u8 = 0x02;

/// The 256-bit symmetric key protecting a vault's contents.
///
/// Zeroised on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_SIZE],
}

impl VaultKey {
    /// Draw a fresh uniformly random key.
    pub fn generate(entropy: &Entropy) -> Result<Self> {
        let mut key = Self { key: [0u8; KEY_SIZE] };
        entropy.fill(&mut key.key)?;
        Ok(key)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        Ok(Self {
            key: to_array(slice)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Split into two shares; both are needed to get the key back.
    pub fn split(&self, entropy: &Entropy) -> Result<(KeyShare, KeyShare)> {
        let (a, b) = split(&self.key, entropy)?;
        Ok((KeyShare::from_slice(&a)?, KeyShare::from_slice(&b)?))
    }
}

impl PartialEq for VaultKey {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.key[..].ct_eq(&other.key[..]))
    }
}

impl Eq for VaultKey {}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("VaultKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// One half of a split vault key. On its own it is indistinguishable from
/// random bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    share: [u8; KEY_SIZE],
}

impl KeyShare {
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        Ok(Self {
            share: to_array(slice)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.share
    }

    /// Recombine with the other member's share.
    pub fn combine(&self, other: &KeyShare) -> Result<VaultKey> {
        let key = reconstruct(&self.share, &other.share)?;
        VaultKey::from_slice(&key)
    }
}

impl PartialEq for KeyShare {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.share[..].ct_eq(&other.share[..]))
    }
}

impl Eq for KeyShare {}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("share", &"[REDACTED]")
            .finish()
    }
}

/// What a device holds for one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Key(VaultKey),
    Share(KeyShare),
}

impl KeyMaterial {
    /// Storage encoding: `kind[1] || material[32]`.
    pub(crate) fn to_blob(&self) -> Zeroizing<Vec<u8>> {
        let (kind, bytes) = match self {
            KeyMaterial::Key(key) => (KIND_FULL_KEY, key.as_bytes()),
            KeyMaterial::Share(share) => (KIND_SHARE, share.as_bytes()),
        };

        let mut blob = Zeroizing::new(Vec::with_capacity(1 + KEY_SIZE));
        blob.push(kind);
        blob.extend_from_slice(bytes);
        blob
    }

    pub(crate) fn from_blob(blob: &[u8]) -> Result<Self> {
        let (kind, bytes) = blob
            .split_first()
            .ok_or_else(|| WovenError::InvalidKeyMaterial("Empty key blob".into()))?;

        match *kind {
            KIND_FULL_KEY => Ok(KeyMaterial::Key(VaultKey::from_slice(bytes)?)),
            KIND_SHARE => Ok(KeyMaterial::Share(KeyShare::from_slice(bytes)?)),
            other => Err(WovenError::InvalidKeyMaterial(format!(
                "Unknown key blob kind: {:#04x}",
                other
            ))),
        }
    }

    pub fn is_share(&self) -> bool {
        matches!(self, KeyMaterial::Share(_))
    }
}

fn to_array(slice: &[u8]) -> Result<[u8; KEY_SIZE]> {
    slice.try_into().map_err(|_| {
        WovenError::InvalidKeyMaterial(format!(
            "Key material must be {} bytes, got {}",
            KEY_SIZE,
            slice.len()
        ))
    })
}
