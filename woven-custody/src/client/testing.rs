//! Two devices sharing one in-process state machine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::api::{AccessApi, LocalAccessApi};
use super::approver::ApproverClient;
use super::requester::RequestClient;
use super::signal::ResolutionSignal;
use crate::access::{
    AccessRequest, AccessRequestMachine, ApproveAccessRequest, BroadcastNotifier,
    CreateAccessRequest, MemoryRequestStore, RequestId, StaticDirectory, UserId,
    VaultMembership, VaultMode,
};
use crate::clock::ManualClock;
use crate::config::{ClientSettings, RequestSettings};
use crate::error::{Result, WovenError};
use crate::security::Entropy;
use crate::vault::{MemorySecureStore, VaultKey, VaultKeyStore};

pub const REQUESTER: UserId = 1;
pub const APPROVER: UserId = 2;

pub struct Pair {
    pub vault_id: Uuid,
    pub vault_key: VaultKey,
    pub clock: Arc<ManualClock>,
    pub notifier: BroadcastNotifier,
    pub machine: Arc<AccessRequestMachine>,
    pub requester_keys: Arc<VaultKeyStore>,
    pub approver_keys: Arc<VaultKeyStore>,
    pub approver: ApproverClient,
    pub entropy: Arc<Entropy>,
}

pub fn pair() -> Pair {
    let vault_id = Uuid::new_v4();
    let clock = Arc::new(ManualClock::starting_now());
    let notifier = BroadcastNotifier::new(16);
    let machine = Arc::new(AccessRequestMachine::new(
        Arc::new(MemoryRequestStore::new()),
        Arc::new(StaticDirectory::new([VaultMembership {
            id: vault_id,
            mode: VaultMode::Strict,
            members: vec![REQUESTER, APPROVER],
        }])),
        Arc::new(notifier.clone()),
        clock.clone(),
        RequestSettings::default(),
    ));

    let entropy = Arc::new(Entropy::os());
    let requester_keys = Arc::new(VaultKeyStore::new(
        Arc::new(MemorySecureStore::new()),
        entropy.clone(),
    ));
    let approver_keys = Arc::new(VaultKeyStore::new(
        Arc::new(MemorySecureStore::new()),
        entropy.clone(),
    ));

    let vault_key = requester_keys.create().unwrap();
    let (own, partner) = vault_key.split(&entropy).unwrap();
    requester_keys.install_share(vault_id, own).unwrap();
    approver_keys.install_share(vault_id, partner).unwrap();

    let approver = ApproverClient::new(
        Arc::new(LocalAccessApi::new(machine.clone(), APPROVER)),
        approver_keys.clone(),
        entropy.clone(),
    );

    Pair {
        vault_id,
        vault_key,
        clock,
        notifier,
        machine,
        requester_keys,
        approver_keys,
        approver,
        entropy,
    }
}

impl Pair {
    pub fn requester_api(&self) -> LocalAccessApi {
        LocalAccessApi::new(self.machine.clone(), REQUESTER)
    }

    pub fn requester_with(&self, api: Arc<dyn AccessApi>, settings: ClientSettings) -> RequestClient {
        RequestClient::new(
            api,
            self.requester_keys.clone(),
            self.entropy.clone(),
            self.clock.clone(),
            settings,
        )
    }

    pub fn requester(&self) -> RequestClient {
        self.requester_with(Arc::new(self.requester_api()), ClientSettings::default())
    }
}

/// Moves the manual clock instead of sleeping and records every wait.
pub struct ClockSignal {
    clock: Arc<ManualClock>,
    pub waits: Mutex<Vec<Duration>>,
}

impl ClockSignal {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            waits: Mutex::new(Vec::new()),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResolutionSignal for ClockSignal {
    async fn wait(&self, max: Duration) {
        self.waits.lock().unwrap().push(max);
        self.clock.advance(chrono::Duration::from_std(max).unwrap());
    }
}

/// Fails the first `failures` fetches with a network error.
pub struct FlakyApi {
    inner: LocalAccessApi,
    failures: AtomicU32,
}

impl FlakyApi {
    pub fn new(inner: LocalAccessApi, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl AccessApi for FlakyApi {
    async fn create(&self, body: &CreateAccessRequest) -> Result<AccessRequest> {
        self.inner.create(body).await
    }

    async fn get(&self, request_id: RequestId) -> Result<AccessRequest> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(WovenError::Network("connection reset".into()));
        }
        self.inner.get(request_id).await
    }

    async fn approve(
        &self,
        request_id: RequestId,
        body: &ApproveAccessRequest,
    ) -> Result<AccessRequest> {
        self.inner.approve(request_id, body).await
    }

    async fn deny(&self, request_id: RequestId) -> Result<AccessRequest> {
        self.inner.deny(request_id).await
    }

    async fn pending_for_vault(&self, vault_id: Uuid) -> Result<Vec<AccessRequest>> {
        self.inner.pending_for_vault(vault_id).await
    }
}
