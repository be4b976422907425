//! Session Store (spec §4.3): create, touch, fetch, and expire sessions,
//! including the parent/child cascade.

use std::sync::Arc;

use octoauth_core::{Timestamp, generate_id, now_utc};
use octoauth_storage::{Filter, StoragePort, upsertor};
use serde_json::{Value, json};

use crate::config::{SessionConfig, TouchExtension};
use crate::crypto;
use crate::error::{AuthError, AuthResult};
use crate::types::{AuthorizationMap, Session, SessionType};

const COLLECTION: &str = "sessions";

/// Fields whose values are encrypted at rest (spec §4.1/§4.3).
const SENSITIVE_FIELDS: &[&str] = &["access_token", "refresh_token", "id_token", "cookie_session_id"];

/// A single `key = value` pair applied when a session is created, with a
/// flag marking it for encryption.
pub struct SessionField {
    pub key: &'static str,
    pub value: String,
}

impl SessionField {
    #[must_use]
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    fn is_sensitive(&self) -> bool {
        SENSITIVE_FIELDS.contains(&self.key)
    }
}

pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
    config: SessionConfig,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>, config: SessionConfig) -> Self {
        Self { storage, config }
    }

    /// Creates a session. `expiration` overrides the configured default;
    /// a value beyond `maximum_age` is clamped (and logged).
    pub async fn create(
        &self,
        session_type: SessionType,
        parent_id: Option<&str>,
        credentials_id: Option<&str>,
        expiration: Option<std::time::Duration>,
        authorization: AuthorizationMap,
        fields: Vec<SessionField>,
    ) -> AuthResult<Session> {
        if let Some(parent_id) = parent_id {
            self.storage
                .get(COLLECTION, parent_id)
                .await
                .map_err(|_| AuthError::not_found(format!("parent session {parent_id}")))?;
        }

        let now = now_utc();
        let max_expires_at = now.plus_seconds(self.config.maximum_age.as_secs() as i64);
        let requested_seconds = expiration.unwrap_or(self.config.expiration).as_secs() as i64;
        let mut expires_at = now.plus_seconds(requested_seconds);
        if expires_at > max_expires_at {
            tracing::warn!(
                requested_seconds,
                max_age_seconds = self.config.maximum_age.as_secs(),
                "requested session expiration exceeds maximum_age; clamping"
            );
            expires_at = max_expires_at;
        }

        let touch_extension_seconds = self.config.touch_extension.seconds_for(requested_seconds);

        let mut builder = upsertor(self.storage.clone(), COLLECTION, None, None)
            .set("session_type", json!(session_type_str(session_type)))
            .set("parent_id", parent_id.map(Value::from).unwrap_or(Value::Null))
            .set("credentials_id", credentials_id.map(Value::from).unwrap_or(Value::Null))
            .set("created_at", json!(now.to_string()))
            .set("modified_at", json!(now.to_string()))
            .set("expires_at", json!(expires_at.to_string()))
            .set("max_expires_at", json!(max_expires_at.to_string()))
            .set("touch_extension_seconds", json!(touch_extension_seconds))
            .set("authorization", json!(authorization));

        for field in fields {
            if field.is_sensitive() {
                let encrypted = crypto::encrypt(&self.config.aes_key, &field.value)
                    .map_err(|e| AuthError::internal(format!("failed to encrypt {}: {e}", field.key)))?;
                builder = builder.set_encrypted(field.key, json!(encrypted));
            } else {
                builder = builder.set(field.key, json!(field.value));
            }
        }

        let id = builder.execute().await?;
        self.load(&id).await
    }

    /// Extends `session`'s expiration, never shrinking it and never
    /// exceeding `max_expires_at`. No-op within `minimum_refresh_interval`
    /// of the last modification, or once already at `max_expires_at`.
    pub async fn touch(&self, session: &Session, expiration: Option<std::time::Duration>) -> AuthResult<()> {
        let now = now_utc();
        if now.unix_timestamp() - session.modified_at.unix_timestamp()
            < self.config.minimum_refresh_interval.as_secs() as i64
        {
            return Ok(());
        }
        if session.expires_at == session.max_expires_at {
            return Ok(());
        }

        let extension_seconds = expiration
            .map(|d| d.as_secs() as i64)
            .unwrap_or(session.touch_extension_seconds);
        let mut new_expires_at = now.plus_seconds(extension_seconds);

        if new_expires_at < session.expires_at {
            return Ok(());
        }
        if new_expires_at > session.max_expires_at {
            new_expires_at = session.max_expires_at;
        }

        let result = upsertor(self.storage.clone(), COLLECTION, Some(session.id.clone()), Some(session.version))
            .set("modified_at", json!(now.to_string()))
            .set("expires_at", json!(new_expires_at.to_string()))
            .execute()
            .await;

        if let Err(err) = result
            && matches!(err, octoauth_storage::StorageError::VersionConflict { .. })
        {
            tracing::debug!(session_id = %session.id, "touch lost the optimistic-version race; treating as already extended");
            return Ok(());
        }
        result.map(|_| ()).map_err(AuthError::from)
    }

    pub async fn get(&self, id: &str) -> AuthResult<Session> {
        self.load(id).await
    }

    /// Looks a session up by an exact field match. Sensitive fields are
    /// stored encrypted, so `value` is re-encrypted the same way before the
    /// query runs - `encrypt` is deterministic, so this yields exactly the
    /// ciphertext that was stored for the same plaintext.
    pub async fn get_by_field(&self, field: &str, value: &str) -> AuthResult<Session> {
        let query_value = if SENSITIVE_FIELDS.contains(&field) {
            crypto::encrypt(&self.config.aes_key, value)
                .map_err(|e| AuthError::internal(format!("failed to encrypt lookup value for {field}: {e}")))?
        } else {
            value.to_string()
        };
        let doc = self.storage.get_by(COLLECTION, field, &query_value).await?;
        self.to_session(doc)
    }

    /// Deletes `id` and every direct child session. Idempotent.
    pub async fn delete(&self, id: &str) -> AuthResult<()> {
        let children = self
            .storage
            .iterate(COLLECTION, &Filter::new().eq("parent_id", id), None, 0, u64::MAX)
            .await?;
        for child in children {
            if let Some(child_id) = child.get("_id").and_then(Value::as_str) {
                self.storage.delete(COLLECTION, child_id).await?;
            }
        }
        self.storage.delete(COLLECTION, id).await?;
        Ok(())
    }

    /// Deletes every session belonging to `credentials_id`, returning
    /// `(deleted_count, failed_count)`.
    pub async fn delete_sessions_by_credentials(&self, credentials_id: &str) -> AuthResult<(u64, u64)> {
        let docs = self
            .storage
            .iterate(
                COLLECTION,
                &Filter::new().eq("credentials_id", credentials_id),
                None,
                0,
                u64::MAX,
            )
            .await?;
        self.delete_each(docs).await
    }

    /// Deletes every session in the store.
    pub async fn delete_all(&self) -> AuthResult<(u64, u64)> {
        let docs = self.storage.iterate(COLLECTION, &Filter::new(), None, 0, u64::MAX).await?;
        self.delete_each(docs).await
    }

    /// Deletes every session whose `expires_at < now`. Intended to be
    /// driven by a periodic background tick.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let now = now_utc();
        let docs = self.storage.iterate(COLLECTION, &Filter::new(), None, 0, u64::MAX).await?;
        let mut deleted = 0u64;
        for doc in docs {
            let Some(expires_at) = doc.get("expires_at").and_then(Value::as_str) else {
                continue;
            };
            let Ok(expires_at) = expires_at.parse::<Timestamp>() else {
                continue;
            };
            if expires_at < now
                && let Some(id) = doc.get("_id").and_then(Value::as_str)
            {
                if let Err(err) = self.storage.delete(COLLECTION, id).await {
                    tracing::warn!(session_id = id, error = %err, "failed to delete expired session; will retry next sweep");
                    continue;
                }
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_each(&self, docs: Vec<Value>) -> AuthResult<(u64, u64)> {
        let mut deleted = 0u64;
        let mut failed = 0u64;
        for doc in docs {
            let Some(id) = doc.get("_id").and_then(Value::as_str) else {
                failed += 1;
                continue;
            };
            match self.delete(id).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    tracing::warn!(session_id = id, error = %err, "failed to delete session");
                    failed += 1;
                }
            }
        }
        Ok((deleted, failed))
    }

    async fn load(&self, id: &str) -> AuthResult<Session> {
        let doc = self.storage.get(COLLECTION, id).await?;
        self.to_session(doc)
    }

    fn to_session(&self, doc: Value) -> AuthResult<Session> {
        let decrypt_field = |name: &str| -> AuthResult<Option<String>> {
            match doc.get(name).and_then(Value::as_str) {
                None => Ok(None),
                Some(raw) => {
                    if crypto::is_legacy_plaintext(raw) {
                        tracing::warn!(field = name, "read legacy unencrypted value from a sensitive session field");
                    }
                    crypto::decrypt(&self.config.aes_key, raw)
                        .map(Some)
                        .map_err(|e| AuthError::internal(format!("failed to decrypt {name}: {e}")))
                }
            }
        };

        Ok(Session {
            id: doc
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(generate_id),
            session_type: parse_session_type(doc.get("session_type").and_then(Value::as_str).unwrap_or("root")),
            parent_id: doc.get("parent_id").and_then(Value::as_str).map(str::to_string),
            credentials_id: doc.get("credentials_id").and_then(Value::as_str).map(str::to_string),
            created_at: parse_ts(&doc, "created_at")?,
            modified_at: parse_ts(&doc, "modified_at")?,
            expires_at: parse_ts(&doc, "expires_at")?,
            max_expires_at: parse_ts(&doc, "max_expires_at")?,
            touch_extension_seconds: doc.get("touch_extension_seconds").and_then(Value::as_i64).unwrap_or(0),
            version: doc.get("_v").and_then(Value::as_u64).unwrap_or(0),
            authorization: serde_json::from_value(doc.get("authorization").cloned().unwrap_or_default())
                .unwrap_or_default(),
            access_token: decrypt_field("access_token")?,
            refresh_token: decrypt_field("refresh_token")?,
            id_token: decrypt_field("id_token")?,
            cookie_session_id: decrypt_field("cookie_session_id")?,
        })
    }
}

fn parse_ts(doc: &Value, field: &str) -> AuthResult<Timestamp> {
    doc.get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AuthError::internal(format!("session document missing or invalid field '{field}'")))
}

fn session_type_str(t: SessionType) -> &'static str {
    match t {
        SessionType::Root => "root",
        SessionType::OpenIdConnect => "openidconnect",
        SessionType::M2M => "m2m",
    }
}

fn parse_session_type(s: &str) -> SessionType {
    match s {
        "openidconnect" => SessionType::OpenIdConnect,
        "m2m" => SessionType::M2M,
        _ => SessionType::Root,
    }
}
