//! Wake-up seam towards the devices.
//!
//! Push delivery itself is owned by an external service; the state machine
//! only announces who should be woken and why. Delivery is best effort and
//! never affects the outcome of a transition.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{RequestId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessEvent {
    /// Sent to the approver when a request is created.
    AccessRequest {
        request_id: RequestId,
        vault_id: Uuid,
        requester_id: UserId,
    },
    RequestApproved {
        request_id: RequestId,
        vault_id: Uuid,
    },
    RequestDenied {
        request_id: RequestId,
        vault_id: Uuid,
    },
}

impl AccessEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            AccessEvent::AccessRequest { request_id, .. }
            | AccessEvent::RequestApproved { request_id, .. }
            | AccessEvent::RequestDenied { request_id, .. } => *request_id,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: UserId, event: AccessEvent);
}

/// Records wake-ups in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient: UserId, event: AccessEvent) {
        info!("Wake-up for user {}: {:?}", recipient, event);
    }
}

/// Fans events out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<(UserId, AccessEvent)>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(UserId, AccessEvent)> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, recipient: UserId, event: AccessEvent) {
        if self.tx.send((recipient, event)).is_err() {
            debug!("No subscribers for wake-up of user {}", recipient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let vault_id = Uuid::new_v4();
        let event = AccessEvent::AccessRequest {
            request_id: 3,
            vault_id,
            requester_id: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "access_request");
        assert_eq!(json["request_id"], 3);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(4);
        let mut rx = notifier.subscribe();
        let event = AccessEvent::RequestDenied {
            request_id: 9,
            vault_id: Uuid::new_v4(),
        };

        notifier.notify(1, event.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), (1, event));
    }
}
