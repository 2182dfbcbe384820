use thiserror::Error;

#[derive(Error, Debug)]
pub enum WovenError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Length mismatch: {left} bytes vs {right} bytes")]
    LengthMismatch { left: usize, right: usize },

    #[error("Random source failure: {0}")]
    RandomSource(String),

    #[error("Handshake failure: {0}")]
    HandshakeFailure(String),

    #[error("Authentication failure: payload rejected")]
    AuthenticationFailure,

    #[error("Access request is no longer pending")]
    RequestNotPending,

    #[error("Access request expired")]
    RequestExpired,

    #[error("Forbidden")]
    Forbidden,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Custody policy violation: {0}")]
    PolicyViolation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WovenError {
    /// Transient failures the polling loop may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Failures that make an approval unusable. The request has to be
    /// started over with fresh ephemeral keys.
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailure(_) | Self::AuthenticationFailure | Self::InvalidKeyMaterial(_)
        )
    }
}

impl From<reqwest::Error> for WovenError {
    fn from(err: reqwest::Error) -> Self {
        WovenError::Network(err.to_string())
    }
}

impl serde::Serialize for WovenError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WovenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(WovenError::Network("timeout".into()).is_retryable());
        assert!(!WovenError::AuthenticationFailure.is_retryable());
        assert!(!WovenError::RequestExpired.is_retryable());
    }

    #[test]
    fn test_crypto_failures_are_classified() {
        assert!(WovenError::AuthenticationFailure.is_crypto_failure());
        assert!(WovenError::HandshakeFailure("low order point".into()).is_crypto_failure());
        assert!(!WovenError::RequestNotPending.is_crypto_failure());
    }
}
