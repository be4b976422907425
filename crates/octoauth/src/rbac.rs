//! RBAC Evaluator (spec §4.5).
//!
//! A session's `AuthorizationMap` is `tenant -> resources`. Access to a
//! tenant's resources is granted if every required resource is present
//! under that tenant, or if the session holds the superuser resource
//! under any tenant.

use crate::types::AuthorizationMap;

/// The superuser resource. Holding this under any tenant grants access to
/// every tenant's resources.
pub const SUPERUSER_RESOURCE: &str = "authz:superuser";

/// The resource that grants cross-tenant read/write without being a full
/// superuser.
pub const CROSS_TENANT_RESOURCE: &str = "authz:cross_tenant";

/// The reserved tenant key used for resources that apply everywhere.
pub const GLOBAL_TENANT: &str = "*";

/// `true` if the authorization map holds [`SUPERUSER_RESOURCE`] under any
/// tenant.
#[must_use]
pub fn is_superuser(authz: &AuthorizationMap) -> bool {
    authz.values().any(|resources| resources.contains(SUPERUSER_RESOURCE))
}

/// `true` if the authorization map can act across every tenant (superuser,
/// or holder of the dedicated cross-tenant resource).
#[must_use]
pub fn can_access_all_tenants(authz: &AuthorizationMap) -> bool {
    is_superuser(authz) || authz.values().any(|resources| resources.contains(CROSS_TENANT_RESOURCE))
}

/// `true` if `tenant` has any resources assigned in the authorization map
/// (i.e. the caller has at least been granted something in that tenant).
#[must_use]
pub fn has_tenant_assigned(authz: &AuthorizationMap, tenant: &str) -> bool {
    authz.get(tenant).is_some_and(|resources| !resources.is_empty())
}

/// Decides whether `authz` grants every resource in `required` within
/// `tenant`. Superusers are granted access regardless of tenant.
#[must_use]
pub fn decide(authz: &AuthorizationMap, tenant: &str, required: &[&str]) -> bool {
    if is_superuser(authz) {
        return true;
    }
    let Some(granted) = authz.get(tenant) else {
        return required.is_empty();
    };
    required.iter().all(|resource| granted.contains(*resource))
}
