//! Errors of the access request state machine.
//!
//! Callers map these onto their own surface: the relay turns them into HTTP
//! status codes, the in-process client converts them into [`WovenError`].

use thiserror::Error;

use crate::error::WovenError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Access request not found")]
    NotFound,

    /// Already approved or denied. Expected for the losing side of a race.
    #[error("Access request is no longer pending")]
    NotPending,

    /// The request's deadline has passed.
    #[error("Access request expired")]
    Expired,

    /// Caller is not allowed to act on this request or vault.
    #[error("Forbidden")]
    Forbidden,

    #[error("Vault not found")]
    VaultNotFound,

    #[error("Access requests are only for strict mode vaults")]
    NotStrictVault,

    #[error("No partner found in this vault to approve the request")]
    NoPartner,

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RequestError {
    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::NotFound => "NOT_FOUND",
            RequestError::NotPending => "NOT_PENDING",
            RequestError::Expired => "EXPIRED",
            RequestError::Forbidden => "FORBIDDEN",
            RequestError::VaultNotFound => "VAULT_NOT_FOUND",
            RequestError::NotStrictVault => "NOT_STRICT_VAULT",
            RequestError::NoPartner => "NO_PARTNER",
            RequestError::Invalid(_) => "INVALID_REQUEST",
            RequestError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type RequestResult<T> = std::result::Result<T, RequestError>;

impl From<RequestError> for WovenError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::NotFound => WovenError::NotFound("access request".into()),
            RequestError::VaultNotFound => WovenError::NotFound("vault".into()),
            RequestError::NotPending => WovenError::RequestNotPending,
            RequestError::Expired => WovenError::RequestExpired,
            RequestError::Forbidden => WovenError::Forbidden,
            RequestError::NotStrictVault | RequestError::NoPartner => {
                WovenError::InvalidRequest(err.to_string())
            }
            RequestError::Invalid(msg) => WovenError::InvalidRequest(msg),
            RequestError::Storage(msg) => WovenError::Storage(msg),
        }
    }
}

impl serde::Serialize for RequestError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("RequestError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_to_woven_error() {
        assert!(matches!(
            WovenError::from(RequestError::NotPending),
            WovenError::RequestNotPending
        ));
        assert!(matches!(
            WovenError::from(RequestError::Expired),
            WovenError::RequestExpired
        ));
        assert!(matches!(
            WovenError::from(RequestError::Forbidden),
            WovenError::Forbidden
        ));
    }

    #[test]
    fn test_request_error_serialization() {
        let json = serde_json::to_string(&RequestError::NotPending).unwrap();
        assert!(json.contains("NOT_PENDING"));
        assert!(json.contains("no longer pending"));
    }
}
