//! The `Session` domain type (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// What created a session, and therefore what it is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Root,
    OpenIdConnect,
    M2M,
}

/// `tenant -> resources granted in that tenant`. The superuser resource
/// (`authz:superuser`) and the cross-tenant resource are plain entries
/// under a reserved tenant key; see `rbac::GLOBAL_TENANT`.
pub type AuthorizationMap = HashMap<String, HashSet<String>>;

/// A session as persisted by the Session Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub session_type: SessionType,
    pub parent_id: Option<String>,
    pub credentials_id: Option<String>,

    pub created_at: octoauth_core::Timestamp,
    pub modified_at: octoauth_core::Timestamp,
    pub expires_at: octoauth_core::Timestamp,
    pub max_expires_at: octoauth_core::Timestamp,
    pub touch_extension_seconds: i64,

    pub version: u64,
    pub authorization: AuthorizationMap,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_session_id: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: octoauth_core::Timestamp) -> bool {
        self.expires_at < now
    }
}

/// A resolved credentials draft (see spec §3 "Credential Draft").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub code: String,
    pub expires_at: octoauth_core::Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_from: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn session_is_expired_compares_against_now() {
        let ts = octoauth_core::Timestamp::new(datetime!(2024-01-01 00:00:00 UTC));
        let mut session = Session {
            id: "s1".to_string(),
            session_type: SessionType::Root,
            parent_id: None,
            credentials_id: None,
            created_at: ts,
            modified_at: ts,
            expires_at: ts,
            max_expires_at: ts,
            touch_extension_seconds: 0,
            version: 1,
            authorization: AuthorizationMap::new(),
            access_token: None,
            refresh_token: None,
            id_token: None,
            cookie_session_id: None,
        };

        assert!(session.is_expired(ts.plus_seconds(1)));
        assert!(!session.is_expired(ts));

        session.expires_at = ts.plus_seconds(100);
        assert!(!session.is_expired(ts.plus_seconds(50)));
    }
}
