//! When to fetch a pending request again.
//!
//! Polling and push-triggered fetches differ only in how long the client
//! sleeps between two `get` calls, so both sit behind [`ResolutionSignal`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::access::{AccessEvent, UserId};

#[async_trait]
pub trait ResolutionSignal: Send + Sync {
    /// Return once a fetch is worthwhile, after at most `max`.
    async fn wait(&self, max: Duration);
}

/// Plain polling: always sleep the full interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollTimer;

#[async_trait]
impl ResolutionSignal for PollTimer {
    async fn wait(&self, max: Duration) {
        tokio::time::sleep(max).await;
    }
}

/// Polling that is cut short by an external wake-up.
#[derive(Debug, Default, Clone)]
pub struct PushSignal {
    notify: Arc<Notify>,
}

impl PushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the waiting client. A wake-up with nobody waiting is kept for
    /// the next wait.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Wake on every event addressed to `user_id` until the channel closes.
    pub fn follow(
        &self,
        mut events: broadcast::Receiver<(UserId, AccessEvent)>,
        user_id: UserId,
    ) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok((recipient, event)) if recipient == user_id => {
                        debug!("Push wake-up for request {}", event.request_id());
                        signal.wake();
                    }
                    Ok(_) => {}
                    // Missed events still mean something happened
                    Err(broadcast::error::RecvError::Lagged(_)) => signal.wake(),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[async_trait]
impl ResolutionSignal for PushSignal {
    async fn wait(&self, max: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(max) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_push_signal_returns_early_on_wake() {
        let signal = PushSignal::new();
        signal.wake();

        let started = Instant::now();
        signal.wait(Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_push_signal_falls_back_to_interval() {
        let signal = PushSignal::new();
        let started = Instant::now();
        signal.wait(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_follow_ignores_other_recipients() {
        let (tx, rx) = broadcast::channel(8);
        let signal = PushSignal::new();
        let listener = signal.follow(rx, 1);

        let vault_id = Uuid::new_v4();
        tx.send((2, AccessEvent::RequestDenied { request_id: 1, vault_id }))
            .unwrap();
        tx.send((1, AccessEvent::RequestDenied { request_id: 2, vault_id }))
            .unwrap();
        drop(tx);
        listener.await.unwrap();

        // Exactly one permit was stored
        let started = Instant::now();
        signal.wait(Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        let started = Instant::now();
        signal.wait(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
