//! OIDC Client Registry (spec §4.4): register, reset secrets, update, and
//! authorize clients, plus a substring-search listing.

use std::sync::Arc;

use octoauth_core::{generate_id, generate_secret, now_utc};
use octoauth_storage::{Filter, Sort, SortDirection, StoragePort, upsertor};
use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::crypto;
use crate::error::{AuthError, AuthResult};
use crate::types::{
    ApplicationType, Client, CodeChallengeMethod, GrantType, ResponseType, TokenEndpointAuthMethod,
};

const COLLECTION: &str = "clients";

/// How `authorize_client` matches a presented redirect URI against the
/// client's registered set. Spec §4.4 leaves this a parameterized policy
/// hook; `FullMatch` is the safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    #[default]
    FullMatch,
    StartsWith,
}

impl RedirectPolicy {
    fn matches(self, registered: &[String], presented: &str) -> bool {
        match self {
            Self::FullMatch => registered.iter().any(|r| r == presented),
            Self::StartsWith => registered.iter().any(|r| presented.starts_with(r.as_str())),
        }
    }
}

/// What `register` returns; mirrors the wire shape from spec §4.4.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Registered {
    pub client_id: String,
    pub client_id_issued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
}

/// Whitelisted fields an `update` call may change (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub cookie_domain: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub application_type: Option<ApplicationType>,
    pub response_types: Option<Vec<ResponseType>>,
    pub grant_types: Option<Vec<GrantType>>,
    pub code_challenge_methods: Option<Vec<CodeChallengeMethod>>,
}

pub struct ClientRegistry {
    storage: Arc<dyn StoragePort>,
    config: ClientConfig,
    aes_key: String,
    redirect_policy: RedirectPolicy,
}

impl ClientRegistry {
    /// `aes_key` is the same key material used by the Session Store
    /// (spec §4.1) - client secrets are a sensitive field too.
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>, config: ClientConfig, aes_key: impl Into<String>) -> Self {
        Self {
            storage,
            config,
            aes_key: aes_key.into(),
            redirect_policy: RedirectPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    pub async fn register(&self, mut client: Client) -> AuthResult<Registered> {
        client
            .validate(self.config.allow_insecure_web_client_uris)
            .map_err(|e| AuthError::client_policy_violation(e.to_string()))?;

        if client.client_id.is_empty() {
            client.client_id = generate_id();
        } else if !self.config.allow_custom_client_id {
            return Err(AuthError::client_policy_violation("client_id"));
        }

        let now = now_utc();
        let (secret, expires_at) = match client.token_endpoint_auth_method {
            TokenEndpointAuthMethod::None => (None, None),
            TokenEndpointAuthMethod::ClientSecretBasic => {
                let secret = generate_secret();
                let expires_at = if self.config.client_secret_expiration.is_zero() {
                    None
                } else {
                    Some(now.plus_seconds(self.config.client_secret_expiration.as_secs() as i64).unix_timestamp())
                };
                (Some(secret), expires_at)
            }
        };

        let builder = upsertor(self.storage.clone(), COLLECTION, Some(client.client_id.clone()), None)
            .set("client_name", json!(client.client_name))
            .set("client_uri", client.client_uri.clone().map(Value::from).unwrap_or(Value::Null))
            .set("cookie_domain", client.cookie_domain.clone().map(Value::from).unwrap_or(Value::Null))
            .set("redirect_uris", json!(client.redirect_uris))
            .set("application_type", json!(client.application_type))
            .set("response_types", json!(client.response_types))
            .set("grant_types", json!(client.grant_types))
            .set("token_endpoint_auth_method", json!(client.token_endpoint_auth_method))
            .set("code_challenge_methods", json!(client.code_challenge_methods))
            .set("client_secret_expires_at", expires_at.map(Value::from).unwrap_or(Value::Null))
            .set("created_at", json!(now.to_string()));

        let builder = if let Some(secret) = &secret {
            let encrypted = crypto::encrypt(&self.aes_key, secret)
                .map_err(|e| AuthError::internal(format!("failed to encrypt client secret: {e}")))?;
            builder.set_encrypted("client_secret", json!(encrypted))
        } else {
            builder
        };

        let id = builder.execute().await.map_err(|err| match err {
            octoauth_storage::StorageError::Conflict { .. } => {
                AuthError::conflict("client_id", client.client_id.clone())
            }
            other => AuthError::from(other),
        })?;

        Ok(Registered {
            client_id: id,
            client_id_issued_at: now.unix_timestamp(),
            client_secret: secret,
            client_secret_expires_at: expires_at,
        })
    }

    pub async fn reset_secret(&self, client_id: &str) -> AuthResult<Registered> {
        let client = self.get(client_id).await?;
        if client.is_public() {
            return Err(AuthError::client_policy_violation("token_endpoint_auth_method"));
        }

        let now = now_utc();
        let secret = generate_secret();
        let expires_at = if self.config.client_secret_expiration.is_zero() {
            None
        } else {
            Some(now.plus_seconds(self.config.client_secret_expiration.as_secs() as i64).unix_timestamp())
        };

        let encrypted = crypto::encrypt(&self.aes_key, &secret)
            .map_err(|e| AuthError::internal(format!("failed to encrypt client secret: {e}")))?;

        let version = self.document_version(client_id).await?;
        upsertor(self.storage.clone(), COLLECTION, Some(client_id.to_string()), Some(version))
            .set_encrypted("client_secret", json!(encrypted))
            .set("client_secret_expires_at", expires_at.map(Value::from).unwrap_or(Value::Null))
            .execute()
            .await?;

        Ok(Registered {
            client_id: client_id.to_string(),
            client_id_issued_at: now.unix_timestamp(),
            client_secret: Some(secret),
            client_secret_expires_at: expires_at,
        })
    }

    pub async fn update(&self, client_id: &str, patch: ClientPatch) -> AuthResult<Client> {
        let mut merged = self.get(client_id).await?;
        if let Some(v) = patch.client_name {
            merged.client_name = v;
        }
        if let Some(v) = patch.redirect_uris {
            merged.redirect_uris = v;
        }
        if let Some(v) = patch.application_type {
            merged.application_type = v;
        }
        if let Some(v) = patch.response_types {
            merged.response_types = v;
        }
        if let Some(v) = patch.grant_types {
            merged.grant_types = v;
        }
        if let Some(v) = patch.code_challenge_methods {
            merged.code_challenge_methods = v;
        }
        merged.client_uri = patch.client_uri.or(merged.client_uri);
        merged.cookie_domain = patch.cookie_domain.or(merged.cookie_domain);

        merged
            .validate(self.config.allow_insecure_web_client_uris)
            .map_err(|e| AuthError::client_policy_violation(e.to_string()))?;

        let version = self.document_version(client_id).await?;
        let mut builder = upsertor(self.storage.clone(), COLLECTION, Some(client_id.to_string()), Some(version))
            .set("client_name", json!(merged.client_name))
            .set("redirect_uris", json!(merged.redirect_uris))
            .set("application_type", json!(merged.application_type))
            .set("response_types", json!(merged.response_types))
            .set("grant_types", json!(merged.grant_types))
            .set("code_challenge_methods", json!(merged.code_challenge_methods));

        builder = match &merged.client_uri {
            Some(v) => builder.set("client_uri", json!(v)),
            None => builder.unset("client_uri"),
        };
        builder = match &merged.cookie_domain {
            Some(v) => builder.set("cookie_domain", json!(v)),
            None => builder.unset("cookie_domain"),
        };

        builder.execute().await?;
        self.get(client_id).await
    }

    /// Validates a token-endpoint / authorization request against the
    /// registered client. Returns `Ok(())` on success.
    pub async fn authorize_client(
        &self,
        client_id: &str,
        redirect_uri: &str,
        client_secret: Option<&str>,
        grant_type: Option<GrantType>,
        response_type: ResponseType,
        code_challenge_method: Option<CodeChallengeMethod>,
        // Requested scope is not policed per-client yet; the scope/role
        // mapping lives one layer up, in authorization decisions. Accepted
        // here to keep the signature faithful to the full request shape.
        _scope: Option<&str>,
    ) -> AuthResult<()> {
        let client = self
            .get(client_id)
            .await
            .map_err(|_| AuthError::ClientNotFound { client_id: client_id.to_string() })?;

        self.check_secret(&client, client_secret).await?;

        if let Some(grant_type) = grant_type
            && !client.grant_types.contains(&grant_type)
        {
            return Err(AuthError::client_policy_violation("grant_type"));
        }
        if !client.response_types.contains(&response_type) {
            return Err(AuthError::client_policy_violation("response_type"));
        }
        if let Some(method) = code_challenge_method
            && !client.code_challenge_methods.contains(&method)
        {
            return Err(AuthError::client_policy_violation("code_challenge_method"));
        }
        if !self.redirect_policy.matches(&client.redirect_uris, redirect_uri) {
            return Err(AuthError::client_policy_violation("redirect_uri"));
        }

        Ok(())
    }

    async fn check_secret(&self, client: &Client, presented: Option<&str>) -> AuthResult<()> {
        if client.is_public() {
            if presented.is_some_and(|s| !s.is_empty()) {
                return Err(AuthError::InvalidClientSecret);
            }
            return Ok(());
        }

        let doc = self.storage.get(COLLECTION, &client.client_id).await?;
        if let Some(expires_at) = doc.get("client_secret_expires_at").and_then(Value::as_i64)
            && expires_at < now_utc().unix_timestamp()
        {
            return Err(AuthError::InvalidClientSecret);
        }
        let stored = doc
            .get("client_secret")
            .and_then(Value::as_str)
            .ok_or(AuthError::InvalidClientSecret)?;
        let stored = crypto::decrypt(&self.aes_key, stored).map_err(|e| AuthError::internal(e.to_string()))?;
        if presented != Some(stored.as_str()) {
            return Err(AuthError::InvalidClientSecret);
        }
        Ok(())
    }

    pub async fn delete(&self, client_id: &str) -> AuthResult<()> {
        self.storage.delete(COLLECTION, client_id).await?;
        Ok(())
    }

    pub async fn get(&self, client_id: &str) -> AuthResult<Client> {
        let doc = self.storage.get(COLLECTION, client_id).await?;
        to_client(&doc)
    }

    /// Substring match over `_id` prefix and case-insensitive
    /// `client_name`, newest first, with the secret stripped.
    pub async fn iterate(&self, query: Option<&str>, skip: u64, limit: u64) -> AuthResult<Vec<Client>> {
        let docs = self
            .storage
            .iterate(
                COLLECTION,
                &Filter::new(),
                Some(&Sort::by("created_at", SortDirection::Descending)),
                0,
                u64::MAX,
            )
            .await?;

        let mut clients = Vec::new();
        for doc in docs {
            if let Some(query) = query {
                let id_matches = doc.get("_id").and_then(Value::as_str).is_some_and(|id| id.starts_with(query));
                let name_matches = doc
                    .get("client_name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(&query.to_lowercase()));
                if !id_matches && !name_matches {
                    continue;
                }
            }
            clients.push(to_client(&doc)?);
        }

        Ok(clients.into_iter().skip(skip as usize).take(limit as usize).collect())
    }

    async fn document_version(&self, client_id: &str) -> AuthResult<u64> {
        let doc = self.storage.get(COLLECTION, client_id).await?;
        Ok(doc.get("_v").and_then(Value::as_u64).unwrap_or(0))
    }
}

fn to_client(doc: &Value) -> AuthResult<Client> {
    Ok(Client {
        client_id: doc
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::internal("client document missing _id"))?,
        client_secret: None,
        client_secret_expires_at: doc.get("client_secret_expires_at").and_then(Value::as_i64),
        client_name: doc.get("client_name").and_then(Value::as_str).unwrap_or_default().to_string(),
        client_uri: doc.get("client_uri").and_then(Value::as_str).map(str::to_string),
        cookie_domain: doc.get("cookie_domain").and_then(Value::as_str).map(str::to_string),
        redirect_uris: serde_json::from_value(doc.get("redirect_uris").cloned().unwrap_or_default())
            .unwrap_or_default(),
        application_type: serde_json::from_value(doc.get("application_type").cloned().unwrap_or_default())
            .unwrap_or_default(),
        response_types: serde_json::from_value(doc.get("response_types").cloned().unwrap_or_default())
            .unwrap_or_default(),
        grant_types: serde_json::from_value(doc.get("grant_types").cloned().unwrap_or_default())
            .unwrap_or_default(),
        token_endpoint_auth_method: serde_json::from_value(
            doc.get("token_endpoint_auth_method").cloned().unwrap_or_default(),
        )
        .unwrap_or_default(),
        code_challenge_methods: serde_json::from_value(doc.get("code_challenge_methods").cloned().unwrap_or_default())
            .unwrap_or_default(),
    })
}
