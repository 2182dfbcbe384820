use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Settings for the requesting and approving devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub relay_url: String,
    /// Delay between two status fetches while a request is pending.
    pub poll_interval_ms: u64,
    /// Upper bound for the retry delay after network failures.
    pub max_backoff_ms: u64,
    pub http_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 2000,
            max_backoff_ms: 10_000,
            http_timeout_ms: 10_000,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.poll_interval_ms))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Settings for the relay-side request state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Lifetime of a pending access request.
    pub request_ttl_secs: u64,
    /// How long resolved requests are kept after their deadline.
    pub retention_secs: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            request_ttl_secs: 5 * 60,
            retention_secs: 24 * 60 * 60,
        }
    }
}

impl RequestSettings {
    pub fn request_ttl(&self) -> Duration {
        Duration::from_secs(self.request_ttl_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// Load settings from a JSON file, falling back to defaults if it is missing.
pub fn load_settings<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: T = serde_json::from_str(&content)?;
    Ok(settings)
}

pub fn save_settings<T: Serialize>(path: &Path, settings: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
