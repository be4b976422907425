//! Error taxonomy for the identity/session/RBAC engine.
//!
//! Every service method in this crate returns [`AuthResult`]. The taxonomy
//! here is deliberately small: callers at the HTTP boundary map
//! [`AuthError::category`] to a status code and never see internal detail
//! beyond what each variant already carries.

use octoauth_storage::StorageError;

/// Errors produced by the session store, client registry, RBAC evaluator,
/// and registration engine.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The requested document does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A unique constraint was violated (duplicate client id, username, ...).
    #[error("conflict: {key} = {value}")]
    Conflict { key: String, value: String },

    /// A field failed validation.
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    /// The caller is authenticated but lacks permission for this action.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The caller presented no usable credentials.
    #[error("unauthenticated")]
    Unauthenticated,

    /// `authorize_client` was called for a client id that does not exist.
    #[error("unknown client: {client_id}")]
    ClientNotFound { client_id: String },

    /// The presented client secret did not match (or had expired).
    #[error("invalid client secret")]
    InvalidClientSecret,

    /// A client registration or update request violated a grant/response/
    /// PKCE correspondence rule.
    #[error("client policy violation on {field}")]
    ClientPolicyViolation { field: String },

    /// An optimistic-version write lost the race.
    #[error("version conflict")]
    VersionConflict,

    /// A feature the configuration requested is not implemented.
    #[error("not implemented: {feature}")]
    Unimplemented { feature: String },

    /// Anything else - storage outages, encryption failures, bugs.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden { reason: reason.into() }
    }

    #[must_use]
    pub fn client_policy_violation(field: impl Into<String>) -> Self {
        Self::ClientPolicyViolation { field: field.into() }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// `true` for taxonomy members the caller provoked (4xx-shaped).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::Validation { .. }
                | Self::Forbidden { .. }
                | Self::Unauthenticated
                | Self::ClientNotFound { .. }
                | Self::InvalidClientSecret
                | Self::ClientPolicyViolation { .. }
                | Self::VersionConflict
        )
    }

    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::InvalidClientSecret)
    }

    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::ClientNotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } | Self::VersionConflict => ErrorCategory::Conflict,
            Self::Validation { .. } | Self::ClientPolicyViolation { .. } => ErrorCategory::Validation,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::Unauthenticated | Self::InvalidClientSecret => ErrorCategory::Unauthenticated,
            Self::Unimplemented { .. } => ErrorCategory::Unimplemented,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Maps to the HTTP status an external collaborator should render.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Validation => 400,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::Unauthenticated => 401,
            ErrorCategory::Unimplemented => 501,
            ErrorCategory::Internal => 500,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, id } => {
                AuthError::not_found(format!("{collection}/{id}"))
            }
            StorageError::Conflict { key, value, .. } => AuthError::conflict(key, value),
            StorageError::VersionConflict { .. } => AuthError::VersionConflict,
            StorageError::Invalid { message } => AuthError::validation("document", message),
            StorageError::Connection { message } | StorageError::Internal { message } => {
                AuthError::internal(message)
            }
        }
    }
}

/// Result type for every service method in this crate.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Categories of [`AuthError`] for status-code mapping and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Forbidden,
    Unauthenticated,
    Unimplemented,
    Internal,
}
