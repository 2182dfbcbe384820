//! Requesting side: ask the partner for its share and unlock the vault.
//!
//! The ephemeral private key of a request lives in exactly one place: the
//! in-flight table until [`RequestClient::await_resolution`] starts, then the
//! awaiting future itself. Every way out of that future, including dropping
//! it, drops the key, and `x25519-dalek` zeroises it on drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::AccessApi;
use super::signal::ResolutionSignal;
use crate::access::{AccessRequest, CreateAccessRequest, RequestId, RequestStatus};
use crate::clock::Clock;
use crate::config::ClientSettings;
use crate::error::{Result, WovenError};
use crate::security::{EphemeralKeyPair, Entropy};
use crate::vault::{KeyShare, VaultKeyStore};

struct InFlight {
    pair: EphemeralKeyPair,
    vault_id: Uuid,
    expires_at: DateTime<Utc>,
}

pub struct RequestClient {
    api: Arc<dyn AccessApi>,
    keys: Arc<VaultKeyStore>,
    entropy: Arc<Entropy>,
    clock: Arc<dyn Clock>,
    settings: ClientSettings,
    in_flight: Mutex<HashMap<RequestId, InFlight>>,
}

impl RequestClient {
    pub fn new(
        api: Arc<dyn AccessApi>,
        keys: Arc<VaultKeyStore>,
        entropy: Arc<Entropy>,
        clock: Arc<dyn Clock>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            api,
            keys,
            entropy,
            clock,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Open an access request for `vault_id` with a fresh ephemeral key.
    pub async fn request_access(&self, vault_id: Uuid) -> Result<AccessRequest> {
        let pair = EphemeralKeyPair::generate(&self.entropy);
        let body = CreateAccessRequest {
            vault_id,
            requester_public_key: *pair.public_key(),
        };

        let request = self.api.create(&body).await?;
        if request.requester_public_key != body.requester_public_key {
            return Err(WovenError::HandshakeFailure(
                "relay recorded a different public key".into(),
            ));
        }

        info!(
            "Access request {} opened for vault {} (key {})",
            request.id,
            vault_id,
            body.requester_public_key.fingerprint()
        );
        self.lock_in_flight().insert(
            request.id,
            InFlight {
                pair,
                vault_id,
                expires_at: request.expires_at,
            },
        );
        Ok(request)
    }

    /// Wait for the request to leave `Pending`.
    ///
    /// On approval the partner's share is decrypted and combined with ours
    /// into an unlocked session before returning. Denied and expired requests
    /// are returned as they are. If the relay gives no answer before the
    /// request's deadline plus one poll interval, this fails with
    /// [`WovenError::RequestExpired`].
    pub async fn await_resolution(
        &self,
        request_id: RequestId,
        signal: &dyn ResolutionSignal,
    ) -> Result<AccessRequest> {
        let flight = self.lock_in_flight().remove(&request_id).ok_or_else(|| {
            WovenError::NotFound(format!("no in-flight access request {}", request_id))
        })?;
        let deadline = flight.expires_at
            + chrono::Duration::from_std(self.settings.poll_interval())
                .unwrap_or_else(|_| chrono::Duration::zero());

        let mut failures = 0u32;
        loop {
            match self.api.get(request_id).await {
                Ok(request) => match request.status {
                    RequestStatus::Pending => failures = 0,
                    RequestStatus::Approved => return self.complete(flight, request),
                    RequestStatus::Denied | RequestStatus::Expired => {
                        info!("Access request {} ended {}", request_id, request.status);
                        return Ok(request);
                    }
                },
                Err(err) if err.is_retryable() => {
                    failures += 1;
                    warn!(
                        "Fetching access request {} failed ({} in a row): {}",
                        request_id, failures, err
                    );
                }
                Err(err) => return Err(err),
            }

            let now = self.clock.now();
            if now >= deadline {
                warn!("Gave up on access request {} at its deadline", request_id);
                return Err(WovenError::RequestExpired);
            }

            let delay = if failures == 0 {
                self.settings.poll_interval()
            } else {
                self.backoff(failures)
            };
            let remaining = (deadline - now).to_std().unwrap_or_default();
            signal.wait(delay.min(remaining)).await;
        }
    }

    /// Open a request and wait for it.
    pub async fn unlock(
        &self,
        vault_id: Uuid,
        signal: &dyn ResolutionSignal,
    ) -> Result<AccessRequest> {
        let request = self.request_access(vault_id).await?;
        self.await_resolution(request.id, signal).await
    }

    /// Forget a request locally. The relay lets it expire on its own.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let cancelled = self.lock_in_flight().remove(&request_id).is_some();
        if cancelled {
            info!("Access request {} cancelled", request_id);
        }
        cancelled
    }

    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn complete(&self, flight: InFlight, request: AccessRequest) -> Result<AccessRequest> {
        let payload = request.encrypted_share.as_ref().ok_or_else(|| {
            WovenError::HandshakeFailure("approved request carries no payload".into())
        })?;

        let plaintext = flight.pair.open(payload)?;
        let share = KeyShare::from_slice(&plaintext)?;
        drop(plaintext);

        self.keys.unlock_with_share(flight.vault_id, &share)?;
        info!(
            "Vault {} unlocked through access request {}",
            flight.vault_id, request.id
        );
        Ok(request)
    }

    /// Exponential backoff from the poll interval up to the cap, with up to
    /// a tenth of the poll interval of jitter.
    fn backoff(&self, failures: u32) -> Duration {
        let base = self.settings.poll_interval();
        let exp = base.saturating_mul(1u32 << failures.saturating_sub(1).min(16));
        let capped = exp.min(self.settings.max_backoff());

        let jitter_ms = (base.as_millis() / 10) as u64;
        let jitter = rand::rng().random_range(0..=jitter_ms);
        debug!("Retrying in {:?} (+{}ms jitter)", capped, jitter);
        capped + Duration::from_millis(jitter)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
