//! OIDC Client domain type and registration-time validation.

use serde::{Deserialize, Serialize};

/// How a relying party presents its id on a user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Web,
    Native,
}

impl Default for ApplicationType {
    fn default() -> Self {
        Self::Web
    }
}

/// OAuth 2.0 response types a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
}

/// OAuth 2.0 grant types a client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
}

/// How a client authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    None,
    ClientSecretBasic,
}

impl Default for TokenEndpointAuthMethod {
    fn default() -> Self {
        Self::None
    }
}

/// PKCE code challenge methods a client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeChallengeMethod {
    Plain,
    #[serde(rename = "S256")]
    S256,
}

/// An OIDC relying party registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_domain: Option<String>,

    pub redirect_uris: Vec<String>,
    pub application_type: ApplicationType,
    pub response_types: Vec<ResponseType>,
    pub grant_types: Vec<GrantType>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub code_challenge_methods: Vec<CodeChallengeMethod>,
}

impl Client {
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self.token_endpoint_auth_method, TokenEndpointAuthMethod::None)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientValidationError {
    #[error("redirect_uris must not be empty")]
    NoRedirectUris,
    #[error("redirect_uri '{0}' is not allowed for this application_type")]
    InvalidRedirectUri(String),
    #[error("response_types requires code => authorization_code to also be granted")]
    MissingAuthorizationCodeGrant,
    #[error("code_challenge_methods cannot combine 'plain' with other methods")]
    PlainCannotCoexist,
    #[error("cookie_domain '{0}' is not a valid domain pattern")]
    InvalidCookieDomain(String),
}

fn cookie_domain_pattern() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[a-z0-9.-]{1,61}\.[a-z]{2,}$").expect("valid regex"))
}

/// Validates a redirect URI against the application type and an optional
/// override allowing insecure (non-HTTPS, non-loopback) web client URIs.
fn validate_redirect_uri(uri: &str, app_type: ApplicationType, allow_insecure_web: bool) -> bool {
    let Ok(parsed) = url::Url::parse(uri) else {
        return false;
    };
    if parsed.fragment().is_some() {
        return false;
    }
    match app_type {
        ApplicationType::Web => {
            if allow_insecure_web {
                return true;
            }
            parsed.scheme() == "https" && parsed.host_str().is_some_and(|h| h != "localhost")
        }
        ApplicationType::Native => {
            parsed.scheme() != "http"
                || parsed.host_str() == Some("localhost")
        }
    }
}

impl Client {
    /// Validates the full effective set of client metadata constraints
    /// (spec §3/§4.4). Called on both registration and update.
    pub fn validate(&self, allow_insecure_web_uris: bool) -> Result<(), ClientValidationError> {
        if self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        for uri in &self.redirect_uris {
            if !validate_redirect_uri(uri, self.application_type, allow_insecure_web_uris) {
                return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
            }
        }

        if self.response_types.contains(&ResponseType::Code)
            && !self.grant_types.contains(&GrantType::AuthorizationCode)
        {
            return Err(ClientValidationError::MissingAuthorizationCodeGrant);
        }

        if self.code_challenge_methods.contains(&CodeChallengeMethod::Plain)
            && self.code_challenge_methods.len() > 1
        {
            return Err(ClientValidationError::PlainCannotCoexist);
        }

        if let Some(domain) = &self.cookie_domain
            && !cookie_domain_pattern().is_match(domain)
        {
            return Err(ClientValidationError::InvalidCookieDomain(domain.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_client() -> Client {
        Client {
            client_id: "test-client-id".to_string(),
            client_secret: None,
            client_secret_expires_at: None,
            client_name: "Test Client".to_string(),
            client_uri: None,
            cookie_domain: None,
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            application_type: ApplicationType::Web,
            response_types: vec![ResponseType::Code],
            grant_types: vec![GrantType::AuthorizationCode],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            code_challenge_methods: vec![CodeChallengeMethod::S256],
        }
    }

    #[test]
    fn valid_public_web_client_passes() {
        assert!(base_client().validate(false).is_ok());
    }

    #[test]
    fn empty_redirect_uris_is_rejected() {
        let mut client = base_client();
        client.redirect_uris.clear();
        assert_eq!(client.validate(false), Err(ClientValidationError::NoRedirectUris));
    }

    #[test]
    fn insecure_web_redirect_uri_rejected_by_default() {
        let mut client = base_client();
        client.redirect_uris = vec!["http://app.example.com/callback".to_string()];
        assert!(client.validate(false).is_err());
        assert!(client.validate(true).is_ok());
    }

    #[test]
    fn web_client_cannot_use_localhost() {
        let mut client = base_client();
        client.redirect_uris = vec!["https://localhost/callback".to_string()];
        assert!(client.validate(false).is_err());
    }

    #[test]
    fn native_client_allows_custom_scheme_or_loopback_http() {
        let mut client = base_client();
        client.application_type = ApplicationType::Native;
        client.redirect_uris = vec!["com.example.app:/callback".to_string()];
        assert!(client.validate(false).is_ok());

        client.redirect_uris = vec!["http://localhost/callback".to_string()];
        assert!(client.validate(false).is_ok());

        client.redirect_uris = vec!["http://example.com/callback".to_string()];
        assert!(client.validate(false).is_err());
    }

    #[test]
    fn fragment_in_redirect_uri_is_rejected() {
        let mut client = base_client();
        client.redirect_uris = vec!["https://app.example.com/callback#frag".to_string()];
        assert!(client.validate(false).is_err());
    }

    #[test]
    fn code_response_type_requires_authorization_code_grant() {
        let mut client = base_client();
        client.grant_types.clear();
        assert_eq!(
            client.validate(false),
            Err(ClientValidationError::MissingAuthorizationCodeGrant)
        );
    }

    #[test]
    fn plain_pkce_cannot_coexist_with_other_methods() {
        let mut client = base_client();
        client.code_challenge_methods = vec![CodeChallengeMethod::Plain, CodeChallengeMethod::S256];
        assert_eq!(client.validate(false), Err(ClientValidationError::PlainCannotCoexist));
    }

    #[test]
    fn cookie_domain_must_match_pattern() {
        let mut client = base_client();
        client.cookie_domain = Some("not a domain".to_string());
        assert!(client.validate(false).is_err());

        client.cookie_domain = Some("example.com".to_string());
        assert!(client.validate(false).is_ok());
    }

    #[test]
    fn is_public_reflects_auth_method() {
        let mut client = base_client();
        assert!(client.is_public());
        client.token_endpoint_auth_method = TokenEndpointAuthMethod::ClientSecretBasic;
        assert!(!client.is_public());
    }
}
