//! Persistence for access requests.
//!
//! The store is where the one-winner guarantee lives: [`RequestStore::resolve`]
//! checks and writes the status in a single step, so two concurrent
//! approve/deny calls can never both observe `Pending`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::error::{RequestError, RequestResult};
use super::model::{AccessRequest, RequestId, RequestStatus, UserId};
use crate::security::{EncryptedPayload, EphemeralPublicKey};

/// Fields of a request before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewAccessRequest {
    pub vault_id: Uuid,
    pub requester_id: UserId,
    pub approver_id: UserId,
    pub requester_public_key: EphemeralPublicKey,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Terminal outcome chosen by the approver.
#[derive(Debug, Clone)]
pub enum Resolution {
    Approve(EncryptedPayload),
    Deny,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: NewAccessRequest) -> RequestResult<AccessRequest>;

    /// Current record, moved to `Expired` first if its deadline has passed.
    async fn fetch(&self, id: RequestId, now: DateTime<Utc>)
        -> RequestResult<Option<AccessRequest>>;

    /// Compare-and-set from `Pending`.
    ///
    /// Fails with `NotPending` if the request was already approved or denied,
    /// and with `Expired` (persisting the expiry) if `now` is past the
    /// deadline.
    async fn resolve(
        &self,
        id: RequestId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> RequestResult<AccessRequest>;

    /// Still-pending requests of a vault, oldest first.
    async fn pending_for_vault(
        &self,
        vault_id: Uuid,
        now: DateTime<Utc>,
    ) -> RequestResult<Vec<AccessRequest>>;

    /// Drop requests whose deadline is before `cutoff`, whatever their
    /// stored status. `cutoff` is never in the future, so such a request has
    /// expired even if nobody read it since.
    async fn purge(&self, cutoff: DateTime<Utc>) -> RequestResult<usize>;
}

/// In-memory request store. Every mutation happens under one write lock.
#[derive(Debug)]
pub struct MemoryRequestStore {
    records: RwLock<HashMap<RequestId, AccessRequest>>,
    next_id: AtomicU64,
}

impl Default for MemoryRequestStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn expire_if_due(record: &mut AccessRequest, now: DateTime<Utc>) {
    if record.is_pending() && record.is_due(now) {
        record.status = RequestStatus::Expired;
        debug!("Access request {} expired", record.id);
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: NewAccessRequest) -> RequestResult<AccessRequest> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = AccessRequest {
            id,
            vault_id: request.vault_id,
            requester_id: request.requester_id,
            approver_id: request.approver_id,
            status: RequestStatus::Pending,
            requester_public_key: request.requester_public_key,
            encrypted_share: None,
            created_at: request.created_at,
            expires_at: request.expires_at,
        };

        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn fetch(
        &self,
        id: RequestId,
        now: DateTime<Utc>,
    ) -> RequestResult<Option<AccessRequest>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            expire_if_due(record, now);
            record.clone()
        }))
    }

    async fn resolve(
        &self,
        id: RequestId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> RequestResult<AccessRequest> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RequestError::NotFound)?;

        expire_if_due(record, now);
        match record.status {
            RequestStatus::Pending => {}
            RequestStatus::Expired => return Err(RequestError::Expired),
            RequestStatus::Approved | RequestStatus::Denied => {
                return Err(RequestError::NotPending)
            }
        }

        match resolution {
            Resolution::Approve(payload) => {
                record.status = RequestStatus::Approved;
                record.encrypted_share = Some(payload);
            }
            Resolution::Deny => record.status = RequestStatus::Denied,
        }

        Ok(record.clone())
    }

    async fn pending_for_vault(
        &self,
        vault_id: Uuid,
        now: DateTime<Utc>,
    ) -> RequestResult<Vec<AccessRequest>> {
        let mut records = self.records.write().await;
        let mut pending: Vec<AccessRequest> = records
            .values_mut()
            .filter(|r| r.vault_id == vault_id)
            .filter_map(|record| {
                expire_if_due(record, now);
                record.is_pending().then(|| record.clone())
            })
            .collect();

        pending.sort_by_key(|r| r.id);
        Ok(pending)
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> RequestResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at >= cutoff);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(now: DateTime<Utc>, vault_id: Uuid) -> NewAccessRequest {
        NewAccessRequest {
            vault_id,
            requester_id: 1,
            approver_id: 2,
            requester_public_key: EphemeralPublicKey::from_bytes([5u8; 32]),
            created_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let first = store.insert(draft(now, Uuid::new_v4())).await.unwrap();
        let second = store.insert(draft(now, Uuid::new_v4())).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_fetch_expires_lazily_and_idempotently() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let request = store.insert(draft(now, Uuid::new_v4())).await.unwrap();

        let later = now + Duration::minutes(6);
        let first = store.fetch(request.id, later).await.unwrap().unwrap();
        let second = store.fetch(request.id, later).await.unwrap().unwrap();

        assert_eq!(first.status, RequestStatus::Expired);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_resolve_only_once() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let request = store.insert(draft(now, Uuid::new_v4())).await.unwrap();

        store.resolve(request.id, Resolution::Deny, now).await.unwrap();
        assert_eq!(
            store.resolve(request.id, Resolution::Deny, now).await,
            Err(RequestError::NotPending)
        );
    }

    #[tokio::test]
    async fn test_resolve_after_deadline_persists_expiry() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let request = store.insert(draft(now, Uuid::new_v4())).await.unwrap();

        let deadline = request.expires_at;
        assert_eq!(
            store.resolve(request.id, Resolution::Deny, deadline).await,
            Err(RequestError::Expired)
        );
        let stored = store.fetch(request.id, now).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Expired);
    }

    #[tokio::test]
    async fn test_pending_for_vault_filters_and_expires() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let vault_id = Uuid::new_v4();

        let stale = store.insert(draft(now - Duration::minutes(10), vault_id)).await.unwrap();
        let fresh = store.insert(draft(now, vault_id)).await.unwrap();
        store.insert(draft(now, Uuid::new_v4())).await.unwrap();

        let pending = store.pending_for_vault(vault_id, now).await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![fresh.id]);

        let stale = store.fetch(stale.id, now).await.unwrap().unwrap();
        assert_eq!(stale.status, RequestStatus::Expired);
    }

    #[tokio::test]
    async fn test_purge_keeps_pending_and_recent() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();
        let vault_id = Uuid::new_v4();

        let old = store.insert(draft(now - Duration::hours(3), vault_id)).await.unwrap();
        store.resolve(old.id, Resolution::Deny, old.created_at).await.unwrap();
        let open = store.insert(draft(now, vault_id)).await.unwrap();

        let removed = store.purge(now - Duration::hours(1)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.fetch(old.id, now).await.unwrap().is_none());
        assert!(store.fetch(open.id, now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_drops_unread_expired_requests() {
        let store = MemoryRequestStore::new();
        let now = Utc::now();

        // Never fetched after its deadline, so still stored as pending
        let forgotten = store
            .insert(draft(now - Duration::days(30), Uuid::new_v4()))
            .await
            .unwrap();

        let removed = store.purge(now - Duration::hours(24)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
        assert!(store.fetch(forgotten.id, now).await.unwrap().is_none());
    }
}
