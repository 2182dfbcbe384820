mod envelope;
mod handshake;
mod rng;
mod split;

pub use envelope::{EncryptedPayload, EphemeralPublicKey, ENVELOPE_MIN_SIZE};
#[cfg(feature = "os-keyring")]
pub(crate) use envelope::{base64_decode, base64_encode};
pub use handshake::{
    decrypt, derive_shared_secret, derive_symmetric_key, encrypt, seal_for, EphemeralKeyPair,
    Sealed, SymmetricKey, NONCE_SIZE, PUBLIC_KEY_SIZE, SYMMETRIC_KEY_SIZE, TAG_SIZE,
};
pub use rng::Entropy;
pub use split::{reconstruct, split};
