use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::access::{
    AccessRequest, AccessRequestMachine, ApproveAccessRequest, CreateAccessRequest, RequestId,
    UserId,
};
use crate::error::Result;

/// The access request surface as seen by one authenticated device.
#[async_trait]
pub trait AccessApi: Send + Sync {
    /// Open a request addressed to the caller's partner in the vault.
    async fn create(&self, body: &CreateAccessRequest) -> Result<AccessRequest>;

    async fn get(&self, request_id: RequestId) -> Result<AccessRequest>;

    async fn approve(
        &self,
        request_id: RequestId,
        body: &ApproveAccessRequest,
    ) -> Result<AccessRequest>;

    async fn deny(&self, request_id: RequestId) -> Result<AccessRequest>;

    async fn pending_for_vault(&self, vault_id: Uuid) -> Result<Vec<AccessRequest>>;
}

/// Calls a state machine in the same process as a fixed user.
#[derive(Clone)]
pub struct LocalAccessApi {
    machine: Arc<AccessRequestMachine>,
    caller: UserId,
}

impl LocalAccessApi {
    pub fn new(machine: Arc<AccessRequestMachine>, caller: UserId) -> Self {
        Self { machine, caller }
    }

    pub fn caller(&self) -> UserId {
        self.caller
    }
}

#[async_trait]
impl AccessApi for LocalAccessApi {
    async fn create(&self, body: &CreateAccessRequest) -> Result<AccessRequest> {
        Ok(self
            .machine
            .create_for_partner(body.vault_id, self.caller, body.requester_public_key)
            .await?)
    }

    async fn get(&self, request_id: RequestId) -> Result<AccessRequest> {
        Ok(self.machine.get_as(request_id, self.caller).await?)
    }

    async fn approve(
        &self,
        request_id: RequestId,
        body: &ApproveAccessRequest,
    ) -> Result<AccessRequest> {
        Ok(self
            .machine
            .approve(request_id, self.caller, body.encrypted_share.clone())
            .await?)
    }

    async fn deny(&self, request_id: RequestId) -> Result<AccessRequest> {
        Ok(self.machine.deny(request_id, self.caller).await?)
    }

    async fn pending_for_vault(&self, vault_id: Uuid) -> Result<Vec<AccessRequest>> {
        Ok(self.machine.pending_for_vault(vault_id, self.caller).await?)
    }
}
