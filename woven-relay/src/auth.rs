//! Bearer token to user id resolution.
//!
//! Tokens are issued by the account service; the relay only maps them.

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use woven_custody::access::UserId;

use crate::routes::{ApiError, RelayState};

#[derive(Debug, Clone, Default)]
pub struct TokenDirectory {
    tokens: HashMap<String, UserId>,
}

impl TokenDirectory {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }

    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).copied()
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl FromRequestParts<RelayState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        match state.tokens.resolve(token.trim()) {
            Some(user_id) => Ok(Caller(user_id)),
            None => {
                debug!("Rejected unknown bearer token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
