//! Approving side: seal this device's share for a requester, or refuse.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::api::AccessApi;
use crate::access::{AccessRequest, ApproveAccessRequest, RequestId, RequestStatus};
use crate::error::{Result, WovenError};
use crate::security::{seal_for, Entropy};
use crate::vault::VaultKeyStore;

/// Result of an approve or deny call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// This call resolved the request.
    Resolved(AccessRequest),
    /// Someone else (another tap, another device) resolved it first.
    AlreadyResolved,
}

pub struct ApproverClient {
    api: Arc<dyn AccessApi>,
    keys: Arc<VaultKeyStore>,
    entropy: Arc<Entropy>,
}

impl ApproverClient {
    pub fn new(
        api: Arc<dyn AccessApi>,
        keys: Arc<VaultKeyStore>,
        entropy: Arc<Entropy>,
    ) -> Self {
        Self { api, keys, entropy }
    }

    /// Requests waiting for a decision in `vault_id`.
    pub async fn pending(&self, vault_id: Uuid) -> Result<Vec<AccessRequest>> {
        self.api.pending_for_vault(vault_id).await
    }

    /// Seal our share for the requester's key and approve.
    ///
    /// Only a share ever leaves this device; a vault held in normal custody
    /// cannot be approved from here.
    pub async fn approve(&self, request: &AccessRequest) -> Result<ApprovalOutcome> {
        match request.status {
            RequestStatus::Pending => {}
            RequestStatus::Expired => return Err(WovenError::RequestExpired),
            RequestStatus::Approved | RequestStatus::Denied => {
                return Ok(ApprovalOutcome::AlreadyResolved)
            }
        }

        let share = self.keys.share_for_relay(request.vault_id)?;
        let encrypted_share = seal_for(&request.requester_public_key, share.as_bytes(), &self.entropy)?;
        drop(share);

        let body = ApproveAccessRequest { encrypted_share };
        Self::outcome(request.id, self.api.approve(request.id, &body).await)
    }

    /// Fetch the request first, then [`approve`](Self::approve) it.
    pub async fn approve_by_id(&self, request_id: RequestId) -> Result<ApprovalOutcome> {
        let request = self.api.get(request_id).await?;
        self.approve(&request).await
    }

    pub async fn deny(&self, request_id: RequestId) -> Result<ApprovalOutcome> {
        Self::outcome(request_id, self.api.deny(request_id).await)
    }

    fn outcome(request_id: RequestId, result: Result<AccessRequest>) -> Result<ApprovalOutcome> {
        match result {
            Ok(request) => {
                info!("Access request {} resolved as {}", request_id, request.status);
                Ok(ApprovalOutcome::Resolved(request))
            }
            Err(WovenError::RequestNotPending) => {
                debug!("Access request {} was already resolved", request_id);
                Ok(ApprovalOutcome::AlreadyResolved)
            }
            Err(err) => Err(err),
        }
    }
}
