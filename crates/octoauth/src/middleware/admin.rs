//! The Private pipeline of the Request Binding Middleware (spec §4.7):
//! the gate applied to the admin/diagnostics API surface.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::config::{ApiAuthConfig, ApiConfig, AuthorizationResource};
use crate::error::AuthError;
use crate::rbac;

use super::auth::{AuthState, BearerAuth};
use super::types::RequestAuthContext;

/// Shared state for the Private pipeline: the Public pipeline's state
/// plus the admin-gating config.
#[derive(Clone)]
pub struct PrivateAuthState {
    pub auth: AuthState,
    pub api: ApiConfig,
    pub api_auth: ApiAuthConfig,
}

impl PrivateAuthState {
    #[must_use]
    pub fn new(auth: AuthState, api: ApiConfig, api_auth: ApiAuthConfig) -> Self {
        Self { auth, api, api_auth }
    }
}

fn presented_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// A validated Private-pipeline request: either a pre-shared diagnostics
/// bearer (no session), or a session carrying the configured
/// authorization resource (or superuser).
#[derive(Debug, Clone)]
pub struct PrivateAuth(pub Option<RequestAuthContext>);

impl<S> FromRequestParts<S> for PrivateAuth
where
    S: Send + Sync,
    PrivateAuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let private_state = PrivateAuthState::from_ref(state);

        if let Some(configured) = private_state.api_auth.bearer.as_deref()
            && presented_bearer(parts) == Some(configured)
        {
            return Ok(PrivateAuth(None));
        }

        if !private_state.api.require_authentication {
            return Ok(PrivateAuth(None));
        }

        let BearerAuth(ctx) = BearerAuth::from_request_parts(parts, &private_state.auth).await?;

        match &private_state.api.authorization_resource {
            AuthorizationResource::Disabled => Ok(PrivateAuth(Some(ctx))),
            AuthorizationResource::Resource(resource) => {
                let authz = &ctx.session.authorization;
                let granted = rbac::is_superuser(authz)
                    || authz.values().any(|resources| resources.contains(resource.as_str()));
                if granted {
                    Ok(PrivateAuth(Some(ctx)))
                } else {
                    tracing::debug!(resource = %resource, "private pipeline denied: missing authorization resource");
                    Err(AuthError::forbidden(format!("missing resource: {resource}")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::sync::Arc;

    fn state(api: ApiConfig, api_auth: ApiAuthConfig) -> PrivateAuthState {
        let session_store = crate::session_store::SessionStore::new(
            Arc::new(octoauth_storage::MemoryStorage::new()),
            crate::config::SessionConfig::default(),
        );
        PrivateAuthState::new(AuthState::new(Arc::new(session_store)), api, api_auth)
    }

    #[test]
    fn presented_bearer_reads_the_authorization_header() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer secret-token")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(presented_bearer(&parts), Some("secret-token"));
    }

    #[tokio::test]
    async fn require_authentication_false_passes_through_without_a_session() {
        let private_state = state(
            ApiConfig {
                require_authentication: false,
                ..ApiConfig::default()
            },
            ApiAuthConfig::default(),
        );
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let PrivateAuth(ctx) = PrivateAuth::from_request_parts(&mut parts, &private_state).await.unwrap();
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn preshared_diagnostics_bearer_bypasses_session_lookup() {
        let private_state = state(
            ApiConfig::default(),
            ApiAuthConfig {
                bearer: Some("diagnostics-secret".to_string()),
            },
        );
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer diagnostics-secret")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let PrivateAuth(ctx) = PrivateAuth::from_request_parts(&mut parts, &private_state).await.unwrap();
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn missing_bearer_is_unauthenticated_when_authentication_required() {
        let private_state = state(ApiConfig::default(), ApiAuthConfig::default());
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let err = PrivateAuth::from_request_parts(&mut parts, &private_state).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }
}
