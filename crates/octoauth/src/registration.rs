//! Registration Engine (spec §4.6): credential drafts, invitation codes,
//! and the flow that turns an invitation into a usable credential.

use std::sync::Arc;

use octoauth_core::{generate_secret, now_utc};
use octoauth_storage::{Filter, StoragePort, upsertor};
use serde_json::{Value, json};

use crate::config::RegistrationConfig;
use crate::crypto;
use crate::error::{AuthError, AuthResult};
use crate::types::{CredentialPatch, CredentialPreview};

const COLLECTION: &str = "credentials";

/// What a caller supplies to start an invitation.
#[derive(Debug, Clone, Default)]
pub struct DraftCredentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tenants: Vec<String>,
    pub roles: Vec<String>,
    pub invited_by: Option<String>,
    pub invited_from: Option<String>,
}

/// A credentials backend the Registration Engine can draft new credentials
/// into (spec §9: "Registration chooses the first provider advertising
/// registration support"). Multiple providers can coexist - an LDAP-backed
/// one and a local one, for instance - each owning its own storage
/// collection and deciding for itself whether it accepts new drafts.
pub trait CredentialsProvider: Send + Sync {
    /// Name used to select this provider explicitly.
    fn name(&self) -> &str;

    /// Whether this provider accepts new-credential drafts. `draft_credentials`
    /// picks the first provider in registration order for which this is `true`.
    fn registration_enabled(&self) -> bool;

    /// The storage collection backing this provider's credentials.
    fn collection(&self) -> &str;
}

/// The only provider this engine ships: a document-store-backed provider
/// identical to what the engine wrote directly before providers existed.
pub struct DocumentCredentialsProvider {
    name: String,
    collection: String,
}

impl DocumentCredentialsProvider {
    #[must_use]
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
        }
    }
}

impl Default for DocumentCredentialsProvider {
    fn default() -> Self {
        Self::new("local", COLLECTION)
    }
}

impl CredentialsProvider for DocumentCredentialsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn registration_enabled(&self) -> bool {
        true
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

pub struct RegistrationEngine {
    storage: Arc<dyn StoragePort>,
    config: RegistrationConfig,
    providers: Vec<Arc<dyn CredentialsProvider>>,
}

impl RegistrationEngine {
    /// Fails fast if a config flag enables a feature not yet implemented
    /// (spec §9 "Registration features NYI"). Registers a single default
    /// [`DocumentCredentialsProvider`]; use [`Self::with_providers`] to
    /// register additional ones.
    pub fn new(storage: Arc<dyn StoragePort>, config: RegistrationConfig) -> AuthResult<Self> {
        Self::with_providers(storage, config, vec![Arc::new(DocumentCredentialsProvider::default())])
    }

    /// Like [`Self::new`], but with an explicit, ordered provider list.
    /// `draft_credentials` without an explicit provider name picks the
    /// first entry here with `registration_enabled() == true`.
    pub fn with_providers(
        storage: Arc<dyn StoragePort>,
        config: RegistrationConfig,
        providers: Vec<Arc<dyn CredentialsProvider>>,
    ) -> AuthResult<Self> {
        if config.enable_encryption {
            return Err(AuthError::Unimplemented {
                feature: "registration.enable_encryption".to_string(),
            });
        }
        if config.enable_self_registration {
            return Err(AuthError::Unimplemented {
                feature: "registration.enable_self_registration".to_string(),
            });
        }
        Ok(Self { storage, config, providers })
    }

    /// Picks `provider` by name if given, else the first provider that
    /// advertises `registration_enabled()`.
    fn select_provider(&self, provider: Option<&str>) -> AuthResult<&Arc<dyn CredentialsProvider>> {
        if let Some(name) = provider {
            return self
                .providers
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| AuthError::not_found(format!("credentials provider '{name}'")));
        }
        self.providers
            .iter()
            .find(|p| p.registration_enabled())
            .ok_or_else(|| AuthError::Unimplemented {
                feature: "registration: no provider advertises registration support".to_string(),
            })
    }

    pub async fn draft_credentials(
        &self,
        data: DraftCredentials,
        expiration: Option<std::time::Duration>,
        provider: Option<&str>,
    ) -> AuthResult<(String, String)> {
        let provider = self.select_provider(provider)?;
        let collection = provider.collection().to_string();

        let now = now_utc();
        let code = generate_secret();
        let expires_at = now.plus_seconds(expiration.unwrap_or(self.config.expiration).as_secs() as i64);

        let mut builder = upsertor(self.storage.clone(), &collection, None, None)
            .set("suspended", json!(true))
            .set("registered", Value::Null)
            .set("tenants", json!(data.tenants))
            .set("roles", json!(data.roles))
            .set("registration_code", json!(code))
            .set("registration_expires_at", json!(expires_at.to_string()))
            .set("registration_invited_by", data.invited_by.clone().map(Value::from).unwrap_or(Value::Null))
            .set("registration_invited_from", data.invited_from.clone().map(Value::from).unwrap_or(Value::Null));

        if let Some(username) = &data.username {
            builder = builder.set("username", json!(username));
        }
        if let Some(email) = &data.email {
            builder = builder.set("email", json!(email));
        }
        if let Some(phone) = &data.phone {
            builder = builder.set("phone", json!(phone));
        }

        let id = builder.execute().await.map_err(|err| match err {
            octoauth_storage::StorageError::Conflict { key, value, .. } => AuthError::conflict(key, value),
            other => AuthError::from(other),
        })?;

        Ok((id, code))
    }

    pub async fn get_credential_by_registration_code(&self, code: &str) -> AuthResult<CredentialPreview> {
        let doc = self.load_draft(code).await?;
        Ok(to_preview(&doc))
    }

    pub async fn update_credential_by_registration_code(&self, code: &str, patch: CredentialPatch) -> AuthResult<()> {
        let doc = self.load_draft(code).await?;
        let id = doc.get("_id").and_then(Value::as_str).ok_or_else(|| AuthError::internal("draft missing _id"))?;
        let version = doc.get("_v").and_then(Value::as_u64).unwrap_or(0);

        let mut builder = upsertor(self.storage.clone(), COLLECTION, Some(id.to_string()), Some(version));
        if let Some(v) = patch.username {
            builder = builder.set("username", json!(v));
        }
        if let Some(v) = patch.email {
            builder = builder.set("email", json!(v));
        }
        if let Some(v) = patch.phone {
            builder = builder.set("phone", json!(v));
        }
        if let Some(v) = patch.password {
            let hash = crypto::hash_password(&v).map_err(|e| AuthError::internal(e.to_string()))?;
            builder = builder.set("password_hash", json!(hash));
        }

        builder.execute().await.map_err(|err| match err {
            octoauth_storage::StorageError::Conflict { key, value, .. } => AuthError::conflict(key, value),
            other => AuthError::from(other),
        })?;
        Ok(())
    }

    /// Requires `username`, `email`, and a password already set on the
    /// draft; clears the invitation and marks the credential active.
    pub async fn complete_registration(&self, code: &str) -> AuthResult<String> {
        let doc = self.load_draft(code).await?;
        let id = doc.get("_id").and_then(Value::as_str).ok_or_else(|| AuthError::internal("draft missing _id"))?.to_string();
        let version = doc.get("_v").and_then(Value::as_u64).unwrap_or(0);

        if doc.get("username").and_then(Value::as_str).is_none() {
            return Err(AuthError::validation("username", "required to complete registration"));
        }
        if doc.get("email").and_then(Value::as_str).is_none() {
            return Err(AuthError::validation("email", "required to complete registration"));
        }
        if doc.get("password_hash").and_then(Value::as_str).is_none() {
            return Err(AuthError::validation("password", "required to complete registration"));
        }

        upsertor(self.storage.clone(), COLLECTION, Some(id.clone()), Some(version))
            .set("suspended", json!(false))
            .set("registered", json!(now_utc().to_string()))
            .unset("registration_code")
            .unset("registration_expires_at")
            .unset("registration_invited_by")
            .unset("registration_invited_from")
            .execute()
            .await?;

        tracing::info!(event = "credentials_registered", credentials_id = %id, "registration completed");

        Ok(id)
    }

    /// Transfers tenants and roles from the draft onto
    /// `existing_credentials_id`, then deletes the draft.
    pub async fn complete_registration_with_existing_credentials(
        &self,
        code: &str,
        existing_credentials_id: &str,
    ) -> AuthResult<()> {
        let draft = self.load_draft(code).await?;
        let draft_id = draft.get("_id").and_then(Value::as_str).ok_or_else(|| AuthError::internal("draft missing _id"))?.to_string();
        let draft_tenants: Vec<String> =
            serde_json::from_value(draft.get("tenants").cloned().unwrap_or_default()).unwrap_or_default();
        let draft_roles: Vec<String> =
            serde_json::from_value(draft.get("roles").cloned().unwrap_or_default()).unwrap_or_default();

        let existing = self.storage.get(COLLECTION, existing_credentials_id).await?;
        let existing_version = existing.get("_v").and_then(Value::as_u64).unwrap_or(0);
        let mut merged_tenants: Vec<String> =
            serde_json::from_value(existing.get("tenants").cloned().unwrap_or_default()).unwrap_or_default();
        for tenant in draft_tenants {
            if !merged_tenants.contains(&tenant) {
                merged_tenants.push(tenant);
            }
        }
        let mut merged_roles: Vec<String> =
            serde_json::from_value(existing.get("roles").cloned().unwrap_or_default()).unwrap_or_default();
        for role in draft_roles {
            if !merged_roles.contains(&role) {
                merged_roles.push(role);
            }
        }

        upsertor(self.storage.clone(), COLLECTION, Some(existing_credentials_id.to_string()), Some(existing_version))
            .set("tenants", json!(merged_tenants))
            .set("roles", json!(merged_roles))
            .execute()
            .await?;

        self.storage.delete(COLLECTION, &draft_id).await?;

        tracing::info!(
            event = "credentials_registered_existing",
            credentials_id = %existing_credentials_id,
            "registration merged into existing credentials"
        );

        Ok(())
    }

    /// Removes every draft whose invitation has expired. Intended to be
    /// driven by a periodic background tick.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let now = now_utc();
        let docs = self.storage.iterate(COLLECTION, &Filter::new(), None, 0, u64::MAX).await?;
        let mut deleted = 0u64;
        for doc in docs {
            if doc.get("registration_code").and_then(Value::as_str).is_none() {
                continue;
            }
            let Some(expires_at) = doc.get("registration_expires_at").and_then(Value::as_str) else {
                continue;
            };
            let Ok(expires_at) = expires_at.parse::<octoauth_core::Timestamp>() else {
                continue;
            };
            if expires_at < now
                && let Some(id) = doc.get("_id").and_then(Value::as_str)
            {
                self.storage.delete(COLLECTION, id).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn load_draft(&self, code: &str) -> AuthResult<Value> {
        let doc = self
            .storage
            .get_by(COLLECTION, "registration_code", code)
            .await
            .map_err(|_| AuthError::not_found("registration draft"))?;

        let expires_at = doc
            .get("registration_expires_at")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<octoauth_core::Timestamp>().ok())
            .ok_or_else(|| AuthError::internal("draft missing registration_expires_at"))?;

        if expires_at < now_utc() {
            return Err(AuthError::not_found("registration draft"));
        }
        Ok(doc)
    }
}

fn to_preview(doc: &Value) -> CredentialPreview {
    CredentialPreview {
        email: doc.get("email").and_then(Value::as_str).map(str::to_string),
        phone: doc.get("phone").and_then(Value::as_str).map(str::to_string),
        username: doc.get("username").and_then(Value::as_str).map(str::to_string),
        tenants: serde_json::from_value(doc.get("tenants").cloned().unwrap_or_default()).unwrap_or_default(),
        password: doc.get("password_hash").and_then(Value::as_str).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octoauth_storage::MemoryStorage;
    use std::time::Duration as StdDuration;

    fn engine() -> RegistrationEngine {
        RegistrationEngine::new(Arc::new(MemoryStorage::new()), RegistrationConfig {
            expiration: StdDuration::from_secs(3600),
            enable_encryption: false,
            enable_self_registration: false,
        })
        .unwrap()
    }

    #[test]
    fn construction_rejects_nyi_feature_flags() {
        let storage: Arc<dyn StoragePort> = Arc::new(MemoryStorage::new());
        let err = RegistrationEngine::new(storage, RegistrationConfig {
            expiration: StdDuration::from_secs(3600),
            enable_encryption: true,
            enable_self_registration: false,
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::Unimplemented { .. }));
    }

    #[tokio::test]
    async fn draft_then_fetch_by_code_returns_preview() {
        let engine = engine();
        let (_, code) = engine
            .draft_credentials(
                DraftCredentials {
                    email: Some("invitee@example.com".to_string()),
                    tenants: vec!["acme".to_string()],
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();

        let preview = engine.get_credential_by_registration_code(&code).await.unwrap();
        assert_eq!(preview.email.as_deref(), Some("invitee@example.com"));
        assert!(!preview.password);
    }

    #[tokio::test]
    async fn expired_draft_is_not_found() {
        let engine = engine();
        let (_, code) = engine
            .draft_credentials(DraftCredentials::default(), Some(StdDuration::from_secs(0)), None)
            .await
            .unwrap();

        let err = engine.get_credential_by_registration_code(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn complete_registration_requires_username_email_and_password() {
        let engine = engine();
        let (_, code) = engine.draft_credentials(DraftCredentials::default(), None, None).await.unwrap();

        let err = engine.complete_registration(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));

        engine
            .update_credential_by_registration_code(
                &code,
                CredentialPatch {
                    username: Some("alice".to_string()),
                    email: Some("alice@example.com".to_string()),
                    password: Some("hunter2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let credentials_id = engine.complete_registration(&code).await.unwrap();
        assert!(!credentials_id.is_empty());

        let err = engine.get_credential_by_registration_code(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }), "registration_code must be cleared on completion");
    }

    #[tokio::test]
    async fn sweep_expired_removes_only_expired_drafts() {
        let engine = engine();
        engine
            .draft_credentials(DraftCredentials::default(), Some(StdDuration::from_secs(0)), None)
            .await
            .unwrap();
        engine
            .draft_credentials(DraftCredentials::default(), Some(StdDuration::from_secs(3600)), None)
            .await
            .unwrap();

        let deleted = engine.sweep_expired().await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn complete_registration_with_existing_credentials_merges_tenants_and_roles() {
        let engine = engine();
        let (existing_id, _) = engine
            .draft_credentials(
                DraftCredentials {
                    tenants: vec!["tenant-a".to_string()],
                    roles: vec!["viewer".to_string()],
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();

        let (_, draft_code) = engine
            .draft_credentials(
                DraftCredentials {
                    tenants: vec!["tenant-b".to_string()],
                    roles: vec!["editor".to_string()],
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();

        engine
            .complete_registration_with_existing_credentials(&draft_code, &existing_id)
            .await
            .unwrap();

        assert!(engine.get_credential_by_registration_code(&draft_code).await.is_err());

        let merged = engine.storage.get(COLLECTION, &existing_id).await.unwrap();
        let tenants: Vec<String> = serde_json::from_value(merged["tenants"].clone()).unwrap();
        let roles: Vec<String> = serde_json::from_value(merged["roles"].clone()).unwrap();
        assert_eq!(tenants, vec!["tenant-a".to_string(), "tenant-b".to_string()]);
        assert_eq!(roles, vec!["viewer".to_string(), "editor".to_string()]);
    }

    #[tokio::test]
    async fn draft_credentials_rejects_an_unknown_provider_name() {
        let engine = engine();
        let err = engine.draft_credentials(DraftCredentials::default(), None, Some("ldap")).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn draft_credentials_picks_the_named_provider_when_multiple_exist() {
        let storage: Arc<dyn StoragePort> = Arc::new(MemoryStorage::new());
        let providers: Vec<Arc<dyn CredentialsProvider>> = vec![
            Arc::new(DocumentCredentialsProvider::new("primary", "credentials")),
            Arc::new(DocumentCredentialsProvider::new("secondary", "credentials_secondary")),
        ];
        let engine = RegistrationEngine::with_providers(storage.clone(), RegistrationConfig {
            expiration: StdDuration::from_secs(3600),
            enable_encryption: false,
            enable_self_registration: false,
        }, providers)
        .unwrap();

        let (id, _) = engine.draft_credentials(DraftCredentials::default(), None, Some("secondary")).await.unwrap();
        assert!(storage.get("credentials_secondary", &id).await.is_ok());
        assert!(storage.get("credentials", &id).await.is_err());
    }
}
