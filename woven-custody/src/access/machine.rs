//! The authoritative access request lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::directory::{VaultDirectory, VaultMembership, VaultMode};
use super::error::{RequestError, RequestResult};
use super::model::{AccessRequest, RequestId, RequestStatus, UserId};
use super::notify::{AccessEvent, Notifier};
use super::store::{NewAccessRequest, RequestStore, Resolution};
use crate::clock::Clock;
use crate::config::RequestSettings;
use crate::security::{EncryptedPayload, EphemeralPublicKey};

/// Owns every transition of every access request.
///
/// Constructed with its collaborators so that tests can swap in a manual
/// clock, a fixed membership table and an in-memory store.
pub struct AccessRequestMachine {
    store: Arc<dyn RequestStore>,
    directory: Arc<dyn VaultDirectory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: RequestSettings,
}

impl AccessRequestMachine {
    pub fn new(
        store: Arc<dyn RequestStore>,
        directory: Arc<dyn VaultDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: RequestSettings,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    /// Open a pending request for `requester_id` to be approved by
    /// `approver_id`. Both must be the two distinct members of a strict vault.
    pub async fn create(
        &self,
        vault_id: Uuid,
        requester_id: UserId,
        approver_id: UserId,
        requester_public_key: EphemeralPublicKey,
        ttl: Duration,
    ) -> RequestResult<AccessRequest> {
        if requester_id == approver_id {
            return Err(RequestError::Invalid(
                "Requester and approver must be different users".into(),
            ));
        }
        if ttl.is_zero() {
            return Err(RequestError::Invalid("Request lifetime must be positive".into()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| RequestError::Invalid("Request lifetime out of range".into()))?;

        let vault = self.strict_vault(vault_id).await?;
        if !vault.is_member(requester_id) || !vault.is_member(approver_id) {
            warn!(
                "User {} asked user {} to approve access to vault {} without both being members",
                requester_id, approver_id, vault_id
            );
            return Err(RequestError::Forbidden);
        }

        let now = self.clock.now();
        let request = self
            .store
            .insert(NewAccessRequest {
                vault_id,
                requester_id,
                approver_id,
                requester_public_key,
                created_at: now,
                expires_at: now + ttl,
            })
            .await?;

        info!(
            "Access request {} created for vault {} (requester {}, approver {})",
            request.id, vault_id, requester_id, approver_id
        );
        self.notifier
            .notify(
                approver_id,
                AccessEvent::AccessRequest {
                    request_id: request.id,
                    vault_id,
                    requester_id,
                },
            )
            .await;

        Ok(request)
    }

    /// Open a request addressed to the requester's partner in the vault,
    /// using the configured lifetime.
    pub async fn create_for_partner(
        &self,
        vault_id: Uuid,
        requester_id: UserId,
        requester_public_key: EphemeralPublicKey,
    ) -> RequestResult<AccessRequest> {
        let vault = self.strict_vault(vault_id).await?;
        if !vault.is_member(requester_id) {
            return Err(RequestError::Forbidden);
        }
        let approver_id = vault.partner_of(requester_id).ok_or(RequestError::NoPartner)?;

        self.create(
            vault_id,
            requester_id,
            approver_id,
            requester_public_key,
            self.settings.request_ttl(),
        )
        .await
    }

    /// Approve a pending request, attaching the sealed key material.
    pub async fn approve(
        &self,
        request_id: RequestId,
        approver_id: UserId,
        encrypted_share: EncryptedPayload,
    ) -> RequestResult<AccessRequest> {
        self.resolve(request_id, approver_id, Resolution::Approve(encrypted_share))
            .await
    }

    pub async fn deny(
        &self,
        request_id: RequestId,
        approver_id: UserId,
    ) -> RequestResult<AccessRequest> {
        self.resolve(request_id, approver_id, Resolution::Deny).await
    }

    /// Current state of a request, expired lazily if its deadline passed.
    pub async fn get(&self, request_id: RequestId) -> RequestResult<AccessRequest> {
        self.store
            .fetch(request_id, self.clock.now())
            .await?
            .ok_or(RequestError::NotFound)
    }

    /// [`get`](Self::get) on behalf of a caller, who must be the requester
    /// or the approver.
    pub async fn get_as(
        &self,
        request_id: RequestId,
        caller: UserId,
    ) -> RequestResult<AccessRequest> {
        let request = self.get(request_id).await?;
        if !request.involves(caller) {
            return Err(RequestError::Forbidden);
        }
        Ok(request)
    }

    /// Pending requests of a vault, visible to its members.
    pub async fn pending_for_vault(
        &self,
        vault_id: Uuid,
        caller: UserId,
    ) -> RequestResult<Vec<AccessRequest>> {
        let vault = self
            .directory
            .membership(vault_id)
            .await?
            .ok_or(RequestError::VaultNotFound)?;
        if !vault.is_member(caller) {
            return Err(RequestError::Forbidden);
        }

        self.store.pending_for_vault(vault_id, self.clock.now()).await
    }

    /// Delete requests whose deadline is older than `retention`.
    pub async fn purge_resolved(&self, retention: Duration) -> RequestResult<usize> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|_| RequestError::Invalid("Retention out of range".into()))?;
        let removed = self.store.purge(self.clock.now() - retention).await?;
        if removed > 0 {
            debug!("Purged {} resolved access requests", removed);
        }
        Ok(removed)
    }

    async fn strict_vault(&self, vault_id: Uuid) -> RequestResult<VaultMembership> {
        let vault = self
            .directory
            .membership(vault_id)
            .await?
            .ok_or(RequestError::VaultNotFound)?;
        if vault.mode != VaultMode::Strict {
            return Err(RequestError::NotStrictVault);
        }
        Ok(vault)
    }

    async fn resolve(
        &self,
        request_id: RequestId,
        caller: UserId,
        resolution: Resolution,
    ) -> RequestResult<AccessRequest> {
        let current = self.get(request_id).await?;
        match current.status {
            RequestStatus::Pending => {}
            RequestStatus::Approved | RequestStatus::Denied => {
                return Err(RequestError::NotPending)
            }
            RequestStatus::Expired => return Err(RequestError::Expired),
        }
        if current.approver_id != caller {
            warn!(
                "User {} tried to resolve access request {} addressed to user {}",
                caller, request_id, current.approver_id
            );
            return Err(RequestError::Forbidden);
        }

        let approving = matches!(resolution, Resolution::Approve(_));
        let resolved = self
            .store
            .resolve(request_id, resolution, self.clock.now())
            .await?;

        let event = if approving {
            info!("Access request {} approved", request_id);
            AccessEvent::RequestApproved {
                request_id,
                vault_id: resolved.vault_id,
            }
        } else {
            info!("Access request {} denied", request_id);
            AccessEvent::RequestDenied {
                request_id,
                vault_id: resolved.vault_id,
            }
        };
        self.notifier.notify(resolved.requester_id, event).await;

        Ok(resolved)
    }
}
