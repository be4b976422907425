//! # octoauth
//!
//! Identity and access control service: OIDC/OAuth2 session lifecycle,
//! client registry, RBAC evaluation, and credential registration.
//!
//! ## Overview
//!
//! A session is the unit of authentication: created on login or token
//! exchange, touched on use, expired on a timer. Requests are bound to a
//! session by the [`middleware`] extractors, which resolve a bearer token,
//! cookie, or query parameter to a [`types::Session`] and expose its
//! authorization map through [`rbac`].
//!
//! ## Modules
//!
//! - [`config`] - process configuration for every component below
//! - [`crypto`] - AES-CBC encryption at rest, secret generation, password hashing
//! - [`session_store`] - session create/touch/get/delete/sweep
//! - [`client_registry`] - OIDC client registration and authorization
//! - [`rbac`] - tenant-scoped resource access decisions
//! - [`registration`] - credential draft/invitation workflow
//! - [`roles`] - role assignment API
//! - [`token`] - verification of tokens minted by an external OIDC server
//! - [`middleware`] - request-binding axum extractors
//! - [`types`] - shared domain types

pub mod client_registry;
pub mod config;
pub mod crypto;
pub mod error;
pub mod middleware;
pub mod rbac;
pub mod registration;
pub mod roles;
pub mod session_store;
pub mod token;
pub mod types;

pub use client_registry::{ClientRegistry, ClientPatch, RedirectPolicy, Registered};
pub use config::{ApiAuthConfig, ApiConfig, AuthConfig, AuthorizationResource};
pub use error::{AuthError, ErrorCategory};
pub use middleware::{AuthState, BearerAuth, OptionalBearerAuth, PrivateAuth, PrivateAuthState, RequestAuthContext};
pub use registration::{CredentialsProvider, DocumentCredentialsProvider, DraftCredentials, RegistrationEngine};
pub use roles::RoleAssignmentService;
pub use session_store::{SessionField, SessionStore};
pub use token::{Claims, TokenError, TokenVerifier};
pub use types::{
    ApplicationType, AuthorizationMap, Client, ClientValidationError, CodeChallengeMethod,
    CredentialPatch, CredentialPreview, GrantType, RegistrationInfo, ResponseType, Session,
    SessionType, TokenEndpointAuthMethod,
};

/// Result type for every service method in this crate.
pub type AuthResult<T> = Result<T, AuthError>;

/// Convenient single-import surface for downstream crates.
///
/// ```ignore
/// use octoauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::client_registry::{ClientPatch, ClientRegistry, RedirectPolicy, Registered};
    pub use crate::config::{ApiAuthConfig, ApiConfig, AuthConfig, AuthorizationResource};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::middleware::{
        AuthState, BearerAuth, OptionalBearerAuth, PrivateAuth, PrivateAuthState, RequestAuthContext,
    };
    pub use crate::rbac;
    pub use crate::registration::{CredentialsProvider, DocumentCredentialsProvider, DraftCredentials, RegistrationEngine};
    pub use crate::roles::RoleAssignmentService;
    pub use crate::session_store::{SessionField, SessionStore};
    pub use crate::token::{Claims, TokenError, TokenVerifier};
    pub use crate::types::{
        ApplicationType, AuthorizationMap, Client, ClientValidationError, CodeChallengeMethod,
        CredentialPatch, CredentialPreview, GrantType, RegistrationInfo, ResponseType, Session,
        SessionType, TokenEndpointAuthMethod,
    };
}
