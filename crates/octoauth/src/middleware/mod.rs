//! Request Binding Middleware (spec §4.7): axum extractors that resolve a
//! request's credentials to a session and expose RBAC helpers to handlers.
//!
//! Two pipelines:
//!
//! - [`auth`] - the Public pipeline ([`BearerAuth`]/[`OptionalBearerAuth`]):
//!   bearer header, session cookie, or query token, matched against a
//!   session's token fields.
//! - [`admin`] - the Private pipeline ([`PrivateAuth`]): gates the
//!   admin/diagnostics surface behind a configured authorization resource,
//!   or a pre-shared diagnostics bearer.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use octoauth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(ctx): BearerAuth) -> String {
//!     format!("tenant access: {}", ctx.is_superuser())
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(auth_state);
//! ```

pub mod admin;
pub mod auth;
pub mod error;
pub mod types;

pub use admin::{PrivateAuth, PrivateAuthState};
pub use auth::{AuthState, BearerAuth, OptionalBearerAuth};
pub use types::RequestAuthContext;
