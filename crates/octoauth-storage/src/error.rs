//! Storage error types for the Storage Port abstraction.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested document was not found.
    #[error("not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A unique index or primary key was violated.
    #[error("conflict: {collection}.{key} = {value}")]
    Conflict {
        collection: String,
        key: String,
        value: String,
    },

    /// An upsertor's expected version did not match the stored version.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// The document failed validation before being written.
    #[error("invalid document: {message}")]
    Invalid { message: String },

    /// Failed to reach the storage backend.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// An internal storage error occurred.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn conflict(collection: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn version_conflict(expected: u64, actual: u64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::VersionConflict { .. })
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } | Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::Invalid { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_include_identifying_fields() {
        assert_eq!(
            StorageError::not_found("sessions", "abc").to_string(),
            "not found: sessions/abc"
        );
        assert_eq!(
            StorageError::conflict("clients", "client_id", "xyz").to_string(),
            "conflict: clients.client_id = xyz"
        );
    }

    #[test]
    fn categorizes_conflicts_uniformly() {
        assert_eq!(StorageError::conflict("c", "k", "v").category(), ErrorCategory::Conflict);
        assert_eq!(StorageError::version_conflict(1, 2).category(), ErrorCategory::Conflict);
        assert!(StorageError::conflict("c", "k", "v").is_conflict());
        assert!(StorageError::version_conflict(1, 2).is_conflict());
        assert!(!StorageError::not_found("c", "1").is_conflict());
    }
}
