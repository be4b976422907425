//! Configuration for the session store, client registry, registration
//! engine, and request-binding middleware.
//!
//! Every key from the external-interfaces section of the design is
//! represented here, `#[serde(default)]` so a partial TOML document still
//! produces a usable config, mirroring the teacher's per-section
//! `Default` impls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [session]
/// aes_key = "change-me"
/// expiration = "15m"
///
/// [api]
/// require_authentication = true
/// authorization_resource = "auth:access"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session: SessionConfig,
    pub client: ClientConfig,
    pub registration: RegistrationConfig,
    pub api: ApiConfig,
    pub api_auth: ApiAuthConfig,
    pub general: GeneralConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            client: ClientConfig::default(),
            registration: RegistrationConfig::default(),
            api: ApiConfig::default(),
            api_auth: ApiAuthConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

/// A `touch_extension` is either a ratio of the session's own expiration
/// (`0.0..=1.0`) or an absolute duration - the config key documents both
/// shapes, so both are accepted on deserialize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchExtension {
    Ratio(f64),
    Absolute(Duration),
}

impl TouchExtension {
    #[must_use]
    pub fn seconds_for(&self, session_expiration_seconds: i64) -> i64 {
        match self {
            Self::Ratio(ratio) => ((session_expiration_seconds as f64) * ratio).round() as i64,
            Self::Absolute(duration) => duration.as_secs() as i64,
        }
    }
}

impl Serialize for TouchExtension {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Ratio(r) => serializer.serialize_f64(*r),
            Self::Absolute(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for TouchExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Ratio(f64),
            Duration(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Ratio(r) => Ok(TouchExtension::Ratio(r)),
            Repr::Duration(s) => humantime::parse_duration(&s)
                .map(TouchExtension::Absolute)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// `[session]` - lifetime, extension, and encryption settings for the
/// Session Store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key material used to derive the AES-256 key for sensitive fields.
    /// Must be non-empty; there is no safe default.
    pub aes_key: String,

    #[serde(with = "humantime_serde")]
    pub expiration: Duration,

    pub touch_extension: TouchExtension,

    #[serde(with = "humantime_serde")]
    pub maximum_age: Duration,

    /// Touches within this window of the last modification are no-ops.
    #[serde(with = "humantime_serde")]
    pub minimum_refresh_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            aes_key: String::new(),
            expiration: Duration::from_secs(15 * 60),
            touch_extension: TouchExtension::Ratio(0.5),
            maximum_age: Duration::from_secs(12 * 3600),
            minimum_refresh_interval: Duration::from_secs(60),
        }
    }
}

/// `[client]` - OIDC client registration defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 0 means secrets never expire.
    #[serde(with = "humantime_serde")]
    pub client_secret_expiration: Duration,
    pub allow_custom_client_id: bool,
    pub allow_insecure_web_client_uris: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_secret_expiration: Duration::ZERO,
            allow_custom_client_id: true,
            allow_insecure_web_client_uris: false,
        }
    }
}

/// `[registration]` - invitation/registration-draft settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    #[serde(with = "humantime_serde")]
    pub expiration: Duration,
    /// Not yet implemented; `RegistrationEngine::new` rejects this.
    pub enable_encryption: bool,
    /// Not yet implemented; `RegistrationEngine::new` rejects this.
    pub enable_self_registration: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(7 * 24 * 3600),
            enable_encryption: false,
            enable_self_registration: false,
        }
    }
}

/// The configured `[api] authorization_resource` key, or the sentinel that
/// disables the RBAC gate entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResource {
    Disabled,
    Resource(String),
}

impl Serialize for AuthorizationResource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Disabled => serializer.serialize_str("DISABLED"),
            Self::Resource(r) => serializer.serialize_str(r),
        }
    }
}

impl<'de> Deserialize<'de> for AuthorizationResource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(if s == "DISABLED" {
            Self::Disabled
        } else {
            Self::Resource(s)
        })
    }
}

/// `[api]` - the Request Binding Middleware's gating behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub require_authentication: bool,
    pub authorization_resource: AuthorizationResource,
    pub allow_access_token_auth: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            require_authentication: true,
            authorization_resource: AuthorizationResource::Disabled,
            allow_access_token_auth: false,
        }
    }
}

/// `[api_auth]` - the diagnostics subtree's pre-shared bearer token.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiAuthConfig {
    pub bearer: Option<String>,
}

/// `[general]` - cross-cutting settings, e.g. the web UI base URL used to
/// build registration links.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub auth_webui_base_url: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            auth_webui_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Builds the URI an invited user follows to complete registration.
    #[must_use]
    pub fn registration_uri(&self, registration_code: &str) -> String {
        format!("{}#register?code={}", self.auth_webui_base_url, registration_code)
    }
}
