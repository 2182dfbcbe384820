use std::fmt;
use std::sync::{Mutex, PoisonError};

use aes_gcm::aead::{rand_core::CryptoRngCore, OsRng};

use crate::error::{Result, WovenError};

/// Shared, injectable source of cryptographic randomness.
///
/// Services take an `Arc<Entropy>` at construction instead of reaching for a
/// global generator, so a test can hand in its own source.
pub struct Entropy {
    rng: Mutex<Box<dyn CryptoRngCore + Send>>,
}

impl Default for Entropy {
    fn default() -> Self {
        Self::os()
    }
}

impl Entropy {
    /// Randomness straight from the operating system.
    pub fn os() -> Self {
        Self::from_rng(OsRng)
    }

    pub fn from_rng<R>(rng: R) -> Self
    where
        R: CryptoRngCore + Send + 'static,
    {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Run `f` with exclusive access to the underlying generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn CryptoRngCore) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(rng.as_mut())
    }

    pub fn fill(&self, out: &mut [u8]) -> Result<()> {
        self.with(|rng| rng.try_fill_bytes(out))
            .map_err(|e| WovenError::RandomSource(e.to_string()))
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entropy").finish_non_exhaustive()
    }
}
