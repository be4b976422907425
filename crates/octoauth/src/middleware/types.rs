//! Request-scoped authentication/authorization context.
//!
//! Extracted by [`super::auth::BearerAuth`] and exposed to handlers as the
//! result of binding a request's bearer token (or cookie) to its session.

use crate::rbac;
use crate::types::Session;

/// The authenticated context for a single request: the resolved session
/// plus the RBAC helpers handlers need (spec §4.7).
#[derive(Debug, Clone)]
pub struct RequestAuthContext {
    pub session: Session,
}

impl RequestAuthContext {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// `true` iff every resource in `required` is granted under `tenant`,
    /// or the session is a superuser.
    #[must_use]
    pub fn has_resource_access(&self, tenant: &str, required: &[&str]) -> bool {
        rbac::decide(&self.session.authorization, tenant, required)
    }

    #[must_use]
    pub fn is_superuser(&self) -> bool {
        rbac::is_superuser(&self.session.authorization)
    }

    #[must_use]
    pub fn can_access_all_tenants(&self) -> bool {
        rbac::can_access_all_tenants(&self.session.authorization)
    }

    #[must_use]
    pub fn has_tenant_assigned(&self, tenant: &str) -> bool {
        rbac::has_tenant_assigned(&self.session.authorization, tenant)
    }

    #[must_use]
    pub fn credentials_id(&self) -> Option<&str> {
        self.session.credentials_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionType;
    use std::collections::{HashMap, HashSet};

    fn session(authz: &[(&str, &[&str])]) -> Session {
        let now = octoauth_core::now_utc();
        Session {
            id: "s1".to_string(),
            session_type: SessionType::OpenIdConnect,
            parent_id: None,
            credentials_id: Some("cred-1".to_string()),
            created_at: now,
            modified_at: now,
            expires_at: now.plus_seconds(600),
            max_expires_at: now.plus_seconds(3600),
            touch_extension_seconds: 300,
            version: 1,
            authorization: authz
                .iter()
                .map(|(t, r)| ((*t).to_string(), r.iter().map(|s| (*s).to_string()).collect::<HashSet<_>>()))
                .collect::<HashMap<_, _>>(),
            access_token: None,
            refresh_token: None,
            id_token: None,
            cookie_session_id: None,
        }
    }

    #[test]
    fn delegates_resource_checks_to_rbac() {
        let ctx = RequestAuthContext::new(session(&[("acme", &["patient:read"])]));
        assert!(ctx.has_resource_access("acme", &["patient:read"]));
        assert!(!ctx.has_resource_access("acme", &["patient:write"]));
        assert!(!ctx.is_superuser());
    }

    #[test]
    fn credentials_id_surfaces_from_session() {
        let ctx = RequestAuthContext::new(session(&[]));
        assert_eq!(ctx.credentials_id(), Some("cred-1"));
    }
}
