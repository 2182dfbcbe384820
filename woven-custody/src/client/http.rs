//! [`AccessApi`] over the relay's HTTP interface.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api::AccessApi;
use crate::access::{AccessRequest, ApproveAccessRequest, CreateAccessRequest, RequestId};
use crate::config::ClientSettings;
use crate::error::{Result, WovenError};

/// Error body returned by the relay.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct HttpAccessApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpAccessApi {
    /// `token` is the bearer credential issued by the account service.
    pub fn new(settings: &ClientSettings, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .build()
            .map_err(|e| WovenError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.relay_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.json::<ErrorBody>().await.ok();
        let message = body
            .as_ref()
            .map(|b| b.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.to_string());
        debug!(
            "Relay answered {} ({})",
            status,
            body.as_ref().map(|b| b.code.as_str()).unwrap_or("-")
        );

        Err(match status {
            StatusCode::NOT_FOUND => WovenError::NotFound(message),
            StatusCode::FORBIDDEN => WovenError::Forbidden,
            StatusCode::UNAUTHORIZED => WovenError::Unauthorized,
            StatusCode::CONFLICT => WovenError::RequestNotPending,
            StatusCode::GONE => WovenError::RequestExpired,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                WovenError::InvalidRequest(message)
            }
            s if s.is_server_error() => {
                warn!("Relay server error: {}", message);
                WovenError::Network(message)
            }
            _ => WovenError::InvalidRequest(message),
        })
    }
}

#[async_trait]
impl AccessApi for HttpAccessApi {
    async fn create(&self, body: &CreateAccessRequest) -> Result<AccessRequest> {
        let response = self
            .client
            .post(self.url("/access-requests"))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get(&self, request_id: RequestId) -> Result<AccessRequest> {
        let response = self
            .client
            .get(self.url(&format!("/access-requests/{}", request_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn approve(
        &self,
        request_id: RequestId,
        body: &ApproveAccessRequest,
    ) -> Result<AccessRequest> {
        let response = self
            .client
            .post(self.url(&format!("/access-requests/{}/approve", request_id)))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn deny(&self, request_id: RequestId) -> Result<AccessRequest> {
        let response = self
            .client
            .post(self.url(&format!("/access-requests/{}/deny", request_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn pending_for_vault(&self, vault_id: Uuid) -> Result<Vec<AccessRequest>> {
        let response = self
            .client
            .get(self.url(&format!("/vaults/{}/access-requests", vault_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let settings = ClientSettings {
            relay_url: "http://relay.test/".into(),
            ..ClientSettings::default()
        };
        let api = HttpAccessApi::new(&settings, "token").unwrap();
        assert_eq!(api.url("/access-requests/1"), "http://relay.test/access-requests/1");
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_a_network_error() {
        let settings = ClientSettings {
            // Reserved port, nothing listens there
            relay_url: "http://127.0.0.1:9".into(),
            http_timeout_ms: 500,
            ..ClientSettings::default()
        };
        let api = HttpAccessApi::new(&settings, "token").unwrap();

        let err = api.get(1).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }
}
