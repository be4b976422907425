use thiserror::Error;

/// Low-level error type shared by the crypto, id, and time primitives.
///
/// Service-level errors (session, client, RBAC, registration) live in the
/// `octoauth` crate's `AuthError`; this type only covers the foundational
/// building blocks that crate is built on.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("json serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("time parsing error: {0}")]
    TimeError(#[from] time::error::Parse),

    #[error("uuid error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("url parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId(_) | Self::InvalidTimestamp(_) | Self::JsonError(_) | Self::UrlError(_)
        )
    }

    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::TimeError(_) | Self::UuidError(_) | Self::RegexError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_client_and_server_errors() {
        assert!(CoreError::invalid_id("x").is_client_error());
        assert!(!CoreError::invalid_id("x").is_server_error());
        assert!(CoreError::configuration("bad key").is_server_error());
        assert!(!CoreError::configuration("bad key").is_client_error());
    }
}
