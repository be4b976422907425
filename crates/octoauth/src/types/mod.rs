//! Domain types shared across the session store, client registry, RBAC
//! evaluator, and registration engine.

pub mod client;
pub mod credential;
pub mod session;

pub use client::{
    ApplicationType, Client, ClientValidationError, CodeChallengeMethod, GrantType, ResponseType,
    TokenEndpointAuthMethod,
};
pub use credential::{CredentialPatch, CredentialPreview};
pub use session::{AuthorizationMap, RegistrationInfo, Session, SessionType};
