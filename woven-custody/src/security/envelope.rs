//! Wire formats for the values the relay carries between the two devices.
//!
//! Both formats travel as standard (padded) base64 strings:
//! - [`EphemeralPublicKey`]: the 32-byte X25519 public key
//! - [`EncryptedPayload`]: `approver_public_key[32] || nonce[12] || ciphertext || tag[16]`

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::handshake::{NONCE_SIZE, PUBLIC_KEY_SIZE, TAG_SIZE};
use crate::error::{Result, WovenError};

/// Smallest possible envelope: a public key, a nonce and a tag around an
/// empty ciphertext.
pub const ENVELOPE_MIN_SIZE: usize = PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// Public half of a single-use X25519 key pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EphemeralPublicKey([u8; PUBLIC_KEY_SIZE]);

impl EphemeralPublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = slice.try_into().map_err(|_| {
            WovenError::InvalidKeyMaterial(format!(
                "Public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64_decode(encoded)?;
        Self::from_slice(&bytes)
    }

    /// Short, log-safe identifier for the key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for EphemeralPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EphemeralPublicKey")
            .field(&self.fingerprint())
            .finish()
    }
}

impl Serialize for EphemeralPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EphemeralPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Sealed key material produced by the approver for one access request.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub approver_public_key: EphemeralPublicKey,
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_MIN_SIZE + self.ciphertext.len());
        out.extend_from_slice(self.approver_public_key.as_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENVELOPE_MIN_SIZE {
            return Err(WovenError::InvalidKeyMaterial(format!(
                "Envelope too short: {} bytes, need at least {}",
                bytes.len(),
                ENVELOPE_MIN_SIZE
            )));
        }

        let (public_key, rest) = bytes.split_at(PUBLIC_KEY_SIZE);
        let (nonce, rest) = rest.split_at(NONCE_SIZE);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);
        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(tag);

        Ok(Self {
            approver_public_key: EphemeralPublicKey::from_slice(public_key)?,
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
            tag: tag_bytes,
        })
    }

    pub fn to_base64(&self) -> String {
        base64_encode(&self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_bytes(&base64_decode(encoded)?)
    }
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("approver_public_key", &self.approver_public_key)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl Serialize for EncryptedPayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EncryptedPayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Base64 encode bytes to string.
pub(crate) fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Base64 decode string to bytes.
pub(crate) fn base64_decode(encoded: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| WovenError::InvalidKeyMaterial(format!("Invalid base64: {}", e)))
}
