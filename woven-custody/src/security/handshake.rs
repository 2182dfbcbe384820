//! Ephemeral X25519 handshake used to move key material through the relay.
//!
//! One approval runs the engine twice, once per side:
//! - the requester generates a key pair and publishes the public half
//! - the approver generates its own pair, agrees on a shared secret with the
//!   requester's public key, derives an AES-256-GCM key via HKDF-SHA256 and
//!   seals its key material ([`seal_for`])
//! - the requester agrees with the approver's public key, derives the same
//!   symmetric key and opens the payload ([`EphemeralKeyPair::open`])
//!
//! Private keys are [`EphemeralSecret`]s: Diffie-Hellman consumes them, so a
//! key pair cannot be used twice, and they are zeroised on drop on every exit
//! path.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::envelope::{EncryptedPayload, EphemeralPublicKey};
use super::rng::Entropy;
use crate::error::{Result, WovenError};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SYMMETRIC_KEY_SIZE: usize = 32;
/// AES-GCM nonce size (96 bits).
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

// Both sides must use these byte-for-byte or derivation diverges silently.
// An empty salt is equivalent to the RFC 5869 default of HashLen zero bytes.
const HKDF_SALT: &[u8] = b"";
const HKDF_INFO: &[u8] = b"";

/// A single-use key pair owned by exactly one in-flight transaction.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: EphemeralPublicKey,
}

impl EphemeralKeyPair {
    pub fn generate(entropy: &Entropy) -> Self {
        let secret = entropy.with(|rng| EphemeralSecret::random_from_rng(rng));
        let public = EphemeralPublicKey::from_bytes(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public_key(&self) -> &EphemeralPublicKey {
        &self.public
    }

    /// Run the key agreement, consuming the private key.
    pub fn agree(self, their_public: &EphemeralPublicKey) -> Result<SharedSecret> {
        derive_shared_secret(self.secret, their_public)
    }

    /// Open a payload sealed for this key pair. The pair is consumed whether
    /// or not decryption succeeds.
    pub fn open(self, payload: &EncryptedPayload) -> Result<Zeroizing<Vec<u8>>> {
        let shared = self.agree(&payload.approver_public_key)?;
        let key = derive_symmetric_key(&shared)?;
        drop(shared);

        decrypt(&key, &payload.nonce, &payload.ciphertext, &payload.tag)
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// AES-256-GCM key derived from one handshake.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

/// Output of [`encrypt`]: nonce, ciphertext and detached tag.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// X25519 Diffie-Hellman between our private key and their public key.
pub fn derive_shared_secret(
    my_secret: EphemeralSecret,
    their_public: &EphemeralPublicKey,
) -> Result<SharedSecret> {
    let their_public = PublicKey::from(*their_public.as_bytes());
    let shared = my_secret.diffie_hellman(&their_public);

    // A low-order peer point yields an all-zero secret an attacker can predict
    if !shared.was_contributory() {
        return Err(WovenError::HandshakeFailure(
            "Peer public key produced a non-contributory shared secret".into(),
        ));
    }

    Ok(shared)
}

/// HKDF-SHA256 over the raw shared secret with fixed empty salt and info.
pub fn derive_symmetric_key(shared: &SharedSecret) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared.as_bytes());
    let mut key = SymmetricKey([0u8; SYMMETRIC_KEY_SIZE]);
    hkdf.expand(HKDF_INFO, &mut key.0)
        .map_err(|e| WovenError::HandshakeFailure(format!("HKDF expansion failed: {}", e)))?;
    Ok(key)
}

/// Encrypt with a fresh random nonce.
///
/// Every symmetric key comes from a one-shot handshake, so each key sees at
/// most one encryption.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8], entropy: &Entropy) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WovenError::HandshakeFailure(format!("Invalid key: {}", e)))?;

    let mut nonce = [0u8; NONCE_SIZE];
    entropy.fill(&mut nonce)?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer)
        .map_err(|e| WovenError::HandshakeFailure(format!("Encryption failed: {}", e)))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed {
        nonce,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate. Any tag mismatch is an [`WovenError::AuthenticationFailure`].
pub fn decrypt(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WovenError::HandshakeFailure(format!("Invalid key: {}", e)))?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| WovenError::AuthenticationFailure)?;

    Ok(buffer)
}

/// Approver side of the handshake: seal `plaintext` for the holder of
/// `requester_public`. The approver's private key never leaves this function.
pub fn seal_for(
    requester_public: &EphemeralPublicKey,
    plaintext: &[u8],
    entropy: &Entropy,
) -> Result<EncryptedPayload> {
    let pair = EphemeralKeyPair::generate(entropy);
    let approver_public_key = *pair.public_key();

    let shared = pair.agree(requester_public)?;
    let key = derive_symmetric_key(&shared)?;
    drop(shared);

    let sealed = encrypt(&key, plaintext, entropy)?;
    debug!(
        "Sealed {} bytes for requester key {}",
        plaintext.len(),
        requester_public.fingerprint()
    );

    Ok(EncryptedPayload {
        approver_public_key,
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext,
        tag: sealed.tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sides_derive_the_same_key() {
        let entropy = Entropy::os();
        let requester = EphemeralKeyPair::generate(&entropy);
        let approver = EphemeralKeyPair::generate(&entropy);
        let requester_public = *requester.public_key();
        let approver_public = *approver.public_key();

        let requester_key = derive_symmetric_key(&requester.agree(&approver_public).unwrap()).unwrap();
        let approver_key = derive_symmetric_key(&approver.agree(&requester_public).unwrap()).unwrap();

        assert_eq!(requester_key.as_bytes(), approver_key.as_bytes());
    }

    #[test]
    fn test_different_peers_produce_different_keys() {
        let entropy = Entropy::os();
        let alice = EphemeralKeyPair::generate(&entropy);
        let bob = EphemeralKeyPair::generate(&entropy);
        let charlie = EphemeralKeyPair::generate(&entropy);
        let bob_public = *bob.public_key();

        let alice_bob = derive_symmetric_key(&alice.agree(&bob_public).unwrap()).unwrap();
        let charlie_bob = derive_symmetric_key(&charlie.agree(&bob_public).unwrap()).unwrap();

        assert_ne!(alice_bob.as_bytes(), charlie_bob.as_bytes());
    }

    #[test]
    fn test_seal_and_open_round_trip() {
        let entropy = Entropy::os();
        for len in [0usize, 1, 16, 32] {
            let requester = EphemeralKeyPair::generate(&entropy);
            let plaintext: Vec<u8> = (0..len as u8).collect();

            let payload = seal_for(requester.public_key(), &plaintext, &entropy).unwrap();
            let opened = requester.open(&payload).unwrap();

            assert_eq!(opened.as_slice(), plaintext.as_slice());
        }
    }

    #[test]
    fn test_tampering_any_byte_fails_authentication() {
        let entropy = Entropy::os();
        let plaintext = [0x5Au8; 32];

        for index in 0..plaintext.len() + TAG_SIZE {
            let requester = EphemeralKeyPair::generate(&entropy);
            let mut payload = seal_for(requester.public_key(), &plaintext, &entropy).unwrap();

            if index < payload.ciphertext.len() {
                payload.ciphertext[index] ^= 0x01;
            } else {
                payload.tag[index - payload.ciphertext.len()] ^= 0x80;
            }

            assert!(matches!(
                requester.open(&payload),
                Err(WovenError::AuthenticationFailure)
            ));
        }
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let entropy = Entropy::os();
        let requester = EphemeralKeyPair::generate(&entropy);
        let eavesdropper = EphemeralKeyPair::generate(&entropy);

        let payload = seal_for(requester.public_key(), b"vault share", &entropy).unwrap();

        assert!(matches!(
            eavesdropper.open(&payload),
            Err(WovenError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_low_order_public_key_is_rejected() {
        let entropy = Entropy::os();
        let pair = EphemeralKeyPair::generate(&entropy);
        // The identity point is of small order
        let identity = EphemeralPublicKey::from_bytes([0u8; PUBLIC_KEY_SIZE]);

        assert!(matches!(
            pair.agree(&identity),
            Err(WovenError::HandshakeFailure(_))
        ));
    }

    #[test]
    fn test_nonces_are_fresh_per_encryption() {
        let entropy = Entropy::os();
        let requester = EphemeralKeyPair::generate(&entropy);
        let first = seal_for(requester.public_key(), b"x", &entropy).unwrap();
        let second = seal_for(requester.public_key(), b"x", &entropy).unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.approver_public_key, second.approver_public_key);
    }
}
