//! Role Assignment API (spec §4.8): per-credential, per-tenant role sets
//! gated by the RBAC evaluator, stored alongside the credential document.
//!
//! Roles are identified by `role_id = "<tenant>/<role_name>"`, or
//! `"*/<role_name>"` for a global role. They're stored as a flat `roles`
//! array on the credential document the Registration Engine already owns.

use std::sync::Arc;

use octoauth_storage::{StoragePort, upsertor};
use serde_json::Value;

use crate::error::{AuthError, AuthResult};
use crate::rbac::{self, GLOBAL_TENANT};
use crate::types::AuthorizationMap;

const COLLECTION: &str = "credentials";
const ROLE_ASSIGN_RESOURCE: &str = "authz:role_assign";

pub struct RoleAssignmentService {
    storage: Arc<dyn StoragePort>,
}

impl RoleAssignmentService {
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// `GET /roles/{tenant}/{cid}`
    pub async fn get_roles(
        &self,
        caller: &AuthorizationMap,
        tenant: &str,
        credentials_id: &str,
    ) -> AuthResult<Vec<String>> {
        self.require_tenant_visibility(caller, tenant)?;
        let doc = self.storage.get(COLLECTION, credentials_id).await?;
        Ok(roles_for_tenant(&doc, tenant))
    }

    /// `PUT /roles/{tenant}` - batch read over a list of credential ids.
    pub async fn get_roles_batch(
        &self,
        caller: &AuthorizationMap,
        tenant: &str,
        credentials_ids: &[String],
    ) -> AuthResult<Vec<(String, Vec<String>)>> {
        self.require_tenant_visibility(caller, tenant)?;
        let mut out = Vec::with_capacity(credentials_ids.len());
        for cid in credentials_ids {
            let doc = self.storage.get(COLLECTION, cid).await?;
            out.push((cid.clone(), roles_for_tenant(&doc, tenant)));
        }
        Ok(out)
    }

    /// `PUT /roles/{tenant}/{cid}`: replaces the tenant-scoped role set.
    /// Global (`*/...`) entries in `roles` are only honored when `tenant`
    /// is a named tenant and the caller is a superuser.
    pub async fn set_roles(
        &self,
        caller: &AuthorizationMap,
        tenant: &str,
        credentials_id: &str,
        roles: Vec<String>,
    ) -> AuthResult<()> {
        self.require_role_assign(caller, tenant)?;

        let doc = self.storage.get(COLLECTION, credentials_id).await?;
        let version = document_version(&doc);
        let mut current = roles_list(&doc);

        let tenant_prefix = format!("{tenant}/");
        let allow_global = tenant != GLOBAL_TENANT && rbac::is_superuser(caller);

        current.retain(|r| !r.starts_with(&tenant_prefix));
        if allow_global {
            current.retain(|r| !r.starts_with("*/"));
        }

        current.extend(roles.iter().filter(|r| r.starts_with(&tenant_prefix)).cloned());
        if allow_global {
            current.extend(roles.iter().filter(|r| r.starts_with("*/")).cloned());
        }

        self.write_roles(credentials_id, version, current).await
    }

    /// `POST /role_assign/{cid}/{tenant}/{role}`
    pub async fn assign_role(
        &self,
        caller: &AuthorizationMap,
        credentials_id: &str,
        tenant: &str,
        role: &str,
    ) -> AuthResult<()> {
        self.require_role_assign(caller, tenant)?;
        let role_id = format!("{tenant}/{role}");

        let doc = self.storage.get(COLLECTION, credentials_id).await?;
        let version = document_version(&doc);
        let mut roles = roles_list(&doc);
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
        self.write_roles(credentials_id, version, roles).await
    }

    /// `DELETE /role_assign/{cid}/{tenant}/{role}`
    pub async fn unassign_role(
        &self,
        caller: &AuthorizationMap,
        credentials_id: &str,
        tenant: &str,
        role: &str,
    ) -> AuthResult<()> {
        self.require_role_assign(caller, tenant)?;
        let role_id = format!("{tenant}/{role}");

        let doc = self.storage.get(COLLECTION, credentials_id).await?;
        let version = document_version(&doc);
        let mut roles = roles_list(&doc);
        roles.retain(|r| *r != role_id);
        self.write_roles(credentials_id, version, roles).await
    }

    async fn write_roles(&self, credentials_id: &str, version: u64, roles: Vec<String>) -> AuthResult<()> {
        upsertor(
            self.storage.clone(),
            COLLECTION,
            Some(credentials_id.to_string()),
            Some(version),
        )
        .set("roles", Value::Array(roles.into_iter().map(Value::String).collect()))
        .execute()
        .await?;
        Ok(())
    }

    /// `GET`/`PUT` visibility gate: tenant assigned, cross-tenant access,
    /// or the global tenant sentinel.
    fn require_tenant_visibility(&self, caller: &AuthorizationMap, tenant: &str) -> AuthResult<()> {
        if tenant == GLOBAL_TENANT || rbac::has_tenant_assigned(caller, tenant) || rbac::can_access_all_tenants(caller) {
            Ok(())
        } else {
            Err(AuthError::forbidden(format!("no visibility into tenant {tenant}")))
        }
    }

    /// Write gate: requires `ROLE_ASSIGN` on `tenant` (or superuser); a
    /// global (`*`) write additionally requires superuser outright.
    fn require_role_assign(&self, caller: &AuthorizationMap, tenant: &str) -> AuthResult<()> {
        if tenant == GLOBAL_TENANT && !rbac::is_superuser(caller) {
            return Err(AuthError::forbidden("global role assignment requires superuser"));
        }
        if !rbac::decide(caller, tenant, &[ROLE_ASSIGN_RESOURCE]) {
            return Err(AuthError::forbidden(format!("missing {ROLE_ASSIGN_RESOURCE} on {tenant}")));
        }
        Ok(())
    }
}

fn roles_list(doc: &Value) -> Vec<String> {
    doc.get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn roles_for_tenant(doc: &Value, tenant: &str) -> Vec<String> {
    let prefix = format!("{tenant}/");
    roles_list(doc).into_iter().filter(|r| r.starts_with(&prefix)).collect()
}

fn document_version(doc: &Value) -> u64 {
    doc.get("_v").and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octoauth_storage::MemoryStorage;
    use std::collections::{HashMap, HashSet};

    fn service() -> RoleAssignmentService {
        RoleAssignmentService::new(Arc::new(MemoryStorage::new()))
    }

    async fn seed_credential(service: &RoleAssignmentService, cid: &str) {
        upsertor(service.storage.clone(), COLLECTION, Some(cid.to_string()), None)
            .set("username", cid)
            .execute()
            .await
            .unwrap();
    }

    fn authz(entries: &[(&str, &[&str])]) -> AuthorizationMap {
        entries
            .iter()
            .map(|(t, r)| ((*t).to_string(), r.iter().map(|s| (*s).to_string()).collect::<HashSet<_>>()))
            .collect::<HashMap<_, _>>()
    }

    #[tokio::test]
    async fn assign_then_get_roles_round_trips() {
        let svc = service();
        seed_credential(&svc, "cred-1").await;
        let caller = authz(&[("acme", &[ROLE_ASSIGN_RESOURCE])]);

        svc.assign_role(&caller, "cred-1", "acme", "admin").await.unwrap();
        let roles = svc.get_roles(&caller, "acme", "cred-1").await.unwrap();
        assert_eq!(roles, vec!["acme/admin".to_string()]);
    }

    #[tokio::test]
    async fn unassign_removes_only_the_named_role() {
        let svc = service();
        seed_credential(&svc, "cred-1").await;
        let caller = authz(&[("acme", &[ROLE_ASSIGN_RESOURCE])]);

        svc.assign_role(&caller, "cred-1", "acme", "admin").await.unwrap();
        svc.assign_role(&caller, "cred-1", "acme", "auditor").await.unwrap();
        svc.unassign_role(&caller, "cred-1", "acme", "admin").await.unwrap();

        let roles = svc.get_roles(&caller, "acme", "cred-1").await.unwrap();
        assert_eq!(roles, vec!["acme/auditor".to_string()]);
    }

    #[tokio::test]
    async fn global_role_assignment_requires_superuser() {
        let svc = service();
        seed_credential(&svc, "cred-1").await;
        let caller = authz(&[("acme", &[ROLE_ASSIGN_RESOURCE])]);

        let err = svc.assign_role(&caller, "cred-1", "*", "ops").await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        let superuser = authz(&[("acme", &[rbac::SUPERUSER_RESOURCE])]);
        svc.assign_role(&superuser, "cred-1", "*", "ops").await.unwrap();
    }

    #[tokio::test]
    async fn tenant_visibility_requires_assignment_or_cross_tenant_access() {
        let svc = service();
        seed_credential(&svc, "cred-1").await;
        let stranger = authz(&[("other-tenant", &["something"])]);

        let err = svc.get_roles(&stranger, "acme", "cred-1").await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        let cross_tenant = authz(&[("other-tenant", &[rbac::CROSS_TENANT_RESOURCE])]);
        svc.get_roles(&cross_tenant, "acme", "cred-1").await.unwrap();
    }

    #[tokio::test]
    async fn set_roles_replaces_only_the_tenant_scope_unless_superuser() {
        let svc = service();
        seed_credential(&svc, "cred-1").await;
        let superuser = authz(&[("acme", &[rbac::SUPERUSER_RESOURCE])]);

        svc.assign_role(&superuser, "cred-1", "acme", "old").await.unwrap();
        svc.assign_role(&superuser, "cred-1", "*", "global-old").await.unwrap();

        svc.set_roles(
            &superuser,
            "acme",
            "cred-1",
            vec!["acme/new".to_string(), "*/global-new".to_string()],
        )
        .await
        .unwrap();

        let mut roles = svc.get_roles(&superuser, "*", "cred-1").await.unwrap();
        roles.sort();
        assert_eq!(roles, vec!["*/global-new".to_string()]);

        let mut roles = svc.get_roles(&superuser, "acme", "cred-1").await.unwrap();
        roles.sort();
        assert_eq!(roles, vec!["acme/new".to_string()]);
    }
}
