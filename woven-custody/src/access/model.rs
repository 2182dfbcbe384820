use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::{EncryptedPayload, EphemeralPublicKey};

pub type RequestId = u64;
pub type UserId = i64;

/// Lifecycle state of an access request. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// One consent transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: RequestId,
    pub vault_id: Uuid,
    pub requester_id: UserId,
    pub approver_id: UserId,
    pub status: RequestStatus,
    /// Requester's ephemeral public key the approver seals its share to.
    pub requester_public_key: EphemeralPublicKey,
    /// Present only once approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_share: Option<EncryptedPayload>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Whether the hard deadline has passed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.requester_id == user_id || self.approver_id == user_id
    }
}

/// Body of `POST /access-requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessRequest {
    pub vault_id: Uuid,
    pub requester_public_key: EphemeralPublicKey,
}

/// Body of `POST /access-requests/{id}/approve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveAccessRequest {
    pub encrypted_share: EncryptedPayload,
}
