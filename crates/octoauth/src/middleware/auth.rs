//! Bearer/cookie request binding: the Public pipeline of the Request
//! Binding Middleware (spec §4.7).
//!
//! Resolution order: `Authorization: Bearer` header, then the session
//! cookie, then (for long-lived connections that can't set headers) a
//! `token` query parameter. The resolved token is matched against a
//! session's `access_token`, `id_token`, or `cookie_session_id` field.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use crate::error::AuthError;
use crate::session_store::SessionStore;
use crate::token::TokenVerifier;

use super::types::RequestAuthContext;

/// Shared state the bearer/cookie extractors read from.
#[derive(Clone)]
pub struct AuthState {
    pub session_store: Arc<SessionStore>,
    pub cookie_name: String,
    /// When set, a presented token is tried as a signed ID/access token
    /// first: decode it, then load the session it names directly by id.
    /// Falls back to the encrypted-field lookup below when absent, or when
    /// the token doesn't decode as one of ours.
    pub token_verifier: Option<Arc<TokenVerifier>>,
}

impl AuthState {
    #[must_use]
    pub fn new(session_store: Arc<SessionStore>) -> Self {
        Self {
            session_store,
            cookie_name: "octoauth_session".to_string(),
            token_verifier: None,
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_token_verifier(mut self, verifier: Arc<TokenVerifier>) -> Self {
        self.token_verifier = Some(verifier);
        self
    }
}

/// Resolves a session from whichever credential the request carries.
async fn resolve_session(
    state: &AuthState,
    parts: &Parts,
) -> Result<RequestAuthContext, AuthError> {
    let token = extract_bearer(parts)
        .or_else(|| extract_cookie(parts, &state.cookie_name))
        .or_else(|| extract_query_token(parts))
        .ok_or(AuthError::Unauthenticated)?;

    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }

    // Try ID-token decode first: a signed access/ID token carries its
    // session id directly, so a successful decode skips the encrypted
    // field lookup entirely.
    if let Some(verifier) = &state.token_verifier
        && let Ok(claims) = verifier.verify(&token)
        && let Ok(session) = state.session_store.get(&claims.session_id).await
    {
        return Ok(RequestAuthContext::new(session));
    }

    for field in ["access_token", "id_token", "cookie_session_id"] {
        if let Ok(session) = state.session_store.get_by_field(field, &token).await {
            return Ok(RequestAuthContext::new(session));
        }
    }

    Err(AuthError::Unauthenticated)
}

fn extract_bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

fn extract_cookie(parts: &Parts, cookie_name: &str) -> Option<String> {
    let header = parts.headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.trim().to_string())
    })
}

fn extract_query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token").then(|| value.to_string())
    })
}

/// Requires a valid bearer/cookie-bound session. Fails with
/// [`AuthError::Unauthenticated`] otherwise.
pub struct BearerAuth(pub RequestAuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let ctx = resolve_session(&auth_state, parts).await?;
        Ok(BearerAuth(ctx))
    }
}

/// Like [`BearerAuth`], but resolves to `None` rather than failing when no
/// credential is present.
pub struct OptionalBearerAuth(pub Option<RequestAuthContext>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        match resolve_session(&auth_state, parts).await {
            Ok(ctx) => Ok(OptionalBearerAuth(Some(ctx))),
            Err(AuthError::Unauthenticated) => Ok(OptionalBearerAuth(None)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token_from_authorization_header() {
        let request = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer abc123")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(extract_bearer(&parts), Some("abc123".to_string()));
    }

    #[test]
    fn extracts_token_from_named_cookie() {
        let request = axum::http::Request::builder()
            .header(COOKIE, "other=1; octoauth_session=sess-value")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(extract_cookie(&parts, "octoauth_session"), Some("sess-value".to_string()));
    }

    #[test]
    fn extracts_token_from_query_parameter() {
        let request = axum::http::Request::builder()
            .uri("https://example.com/ws?token=qtoken")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(extract_query_token(&parts), Some("qtoken".to_string()));
    }

    #[test]
    fn missing_credentials_extract_nothing() {
        let request = axum::http::Request::builder().body(()).unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(extract_bearer(&parts), None);
        assert_eq!(extract_cookie(&parts, "octoauth_session"), None);
        assert_eq!(extract_query_token(&parts), None);
    }

    mod resolution {
        use super::*;
        use crate::config::{SessionConfig, TouchExtension};
        use crate::session_store::{SessionField, SessionStore};
        use crate::token::Claims;
        use crate::types::SessionType;
        use jsonwebtoken::{EncodingKey, Header, encode};
        use std::collections::HashMap;
        use std::time::Duration as StdDuration;

        fn session_store() -> Arc<SessionStore> {
            let config = SessionConfig {
                aes_key: "test-key-material".to_string(),
                expiration: StdDuration::from_secs(100),
                touch_extension: TouchExtension::Ratio(0.5),
                maximum_age: StdDuration::from_secs(1000),
                minimum_refresh_interval: StdDuration::from_secs(0),
            };
            Arc::new(SessionStore::new(Arc::new(octoauth_storage::MemoryStorage::new()), config))
        }

        fn request_with_bearer(token: &str) -> Parts {
            let request = axum::http::Request::builder()
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(())
                .unwrap();
            request.into_parts().0
        }

        #[tokio::test]
        async fn resolves_a_session_by_its_encrypted_cookie_session_id() {
            let store = session_store();
            let session = store
                .create(
                    SessionType::Root,
                    None,
                    None,
                    None,
                    HashMap::new(),
                    vec![SessionField::new("cookie_session_id", "cookie-value-0123456789")],
                )
                .await
                .unwrap();

            let state = AuthState::new(store);
            let request = axum::http::Request::builder()
                .header(COOKIE, "octoauth_session=cookie-value-0123456789")
                .body(())
                .unwrap();
            let (parts, _) = request.into_parts();

            let ctx = resolve_session(&state, &parts).await.unwrap();
            assert_eq!(ctx.session.id, session.id);
        }

        #[tokio::test]
        async fn rejects_an_encrypted_field_that_does_not_match_any_session() {
            let state = AuthState::new(session_store());
            let parts = request_with_bearer("no-such-token-value");
            assert!(matches!(resolve_session(&state, &parts).await, Err(AuthError::Unauthenticated)));
        }

        #[tokio::test]
        async fn resolves_a_session_via_token_verifier_decode_before_the_encrypted_lookup() {
            let store = session_store();
            let session = store.create(SessionType::OpenIdConnect, None, None, None, HashMap::new(), vec![]).await.unwrap();

            let secret = b"hmac-secret";
            let verifier = Arc::new(TokenVerifier::new_hmac(secret, "https://issuer.example.com", "octoauth"));
            let claims = Claims {
                sub: "cred-1".to_string(),
                iss: "https://issuer.example.com".to_string(),
                aud: "octoauth".to_string(),
                exp: i64::MAX / 2,
                iat: 0,
                session_id: session.id.clone(),
            };
            let token = encode(
                &Header::new(jsonwebtoken::Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(secret),
            )
            .unwrap();

            let state = AuthState::new(store).with_token_verifier(verifier);
            let parts = request_with_bearer(&token);

            let ctx = resolve_session(&state, &parts).await.unwrap();
            assert_eq!(ctx.session.id, session.id);
        }
    }
}
