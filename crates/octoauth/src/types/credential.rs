//! Public projections of a credential draft, returned by the Registration
//! Engine without leaking password hashes or internal bookkeeping.

use serde::{Deserialize, Serialize};

/// What an invited user sees when they look up their own draft by
/// registration code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPreview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub tenants: Vec<String>,
    /// `true` iff a password hash is already stored for this draft.
    pub password: bool,
}

/// The subset of a credential draft's fields a caller may update by
/// registration code (spec §4.6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl CredentialPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.phone.is_none() && self.password.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_detects_no_fields_set() {
        assert!(CredentialPatch::default().is_empty());
        let patch = CredentialPatch {
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
