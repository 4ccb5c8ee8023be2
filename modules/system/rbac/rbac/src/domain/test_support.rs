//! Shared fixtures for domain tests.

use std::sync::Arc;

use async_trait::async_trait;
use rbac_sdk::{
    Directory, Introspection, IntrospectionError, PolicySnapshot, RateLimitExemption,
    RateLimitSubject, TokenIntrospector,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

use super::directory::{DirectoryIndex, DirectoryProvider};
use super::error::DomainError;

/// Two tenants. In `t1`: `u1` owns `o1`; `u2` reads `o1` and is a member of
/// `p2`; `u3` reads `o1` and owns `p1`; `u4` belongs nowhere. `t2` holds
/// `x1`/`ox`/`px`/`cx`.
pub fn directory() -> Directory {
    serde_json::from_value(json!({
        "users": [
            { "id": "u1", "internalId": "i-u1", "tenantId": "t1" },
            { "id": "u2", "internalId": "i-u2", "tenantId": "t1" },
            { "id": "u3", "tenantId": "t1" },
            { "id": "u4", "tenantId": "t1" },
            { "id": "x1", "tenantId": "t2" },
        ],
        "organizations": [
            { "id": "o1", "title": "Org One", "tenantId": "t1" },
            { "id": "o2", "title": "Org Two", "tenantId": "t1" },
            { "id": "ox", "tenantId": "t2" },
        ],
        "organizationUsers": [
            { "userId": "u1", "organizationId": "o1", "role": "owner" },
            { "userId": "u2", "organizationId": "o1", "role": "reader" },
            { "userId": "u3", "organizationId": "o1", "role": "reader" },
            { "userId": "x1", "organizationId": "ox", "role": "owner" },
        ],
        "projects": [
            { "id": "p1", "title": "Project One", "organizationId": "o1", "tenantId": "t1", "kubernetesNamespace": "p1-ns" },
            { "id": "p2", "title": "Project Two", "organizationId": "o1", "tenantId": "t1", "kubernetesNamespace": "p2-ns" },
            { "id": "p3", "organizationId": "o2", "tenantId": "t1", "kubernetesNamespace": "p3-ns" },
            { "id": "px", "organizationId": "ox", "tenantId": "t2", "kubernetesNamespace": "px-ns" },
        ],
        "projectUsers": [
            { "userId": "u2", "projectId": "p2", "role": "member" },
            { "userId": "u3", "projectId": "p1", "role": "owner" },
        ],
        "clusters": [
            { "id": "c2", "name": "west", "tenantId": "t1", "registrationKey": "reg-c2" },
            { "id": "c1", "name": "east", "tenantId": "t1", "registrationKey": "reg-c1" },
            { "id": "cx", "tenantId": "t2", "registrationKey": "reg-cx" },
        ],
        "apiKeys": [
            {
                "id": "k1", "secret": "key-k1", "userId": "u2", "organizationId": "o1",
                "projectId": "p2", "tenantId": "t1", "role": "projectMember",
            },
            {
                "id": "k2", "secret": "key-k2", "userId": "u2", "organizationId": "o1",
                "projectId": "p2", "tenantId": "t1", "role": "projectMember",
                "expiresAt": "2000-01-01T00:00:00Z",
            },
        ],
    }))
    .unwrap()
}

pub fn index() -> DirectoryIndex {
    DirectoryIndex::new(directory())
}

pub fn policy() -> PolicySnapshot {
    [
        (
            "organizationOwner".to_owned(),
            vec!["api.models.read", "api.models.write", "models/m1.read"],
        ),
        ("projectOwner".to_owned(), vec!["api.models.read", "api.models.write"]),
        (
            "projectMember".to_owned(),
            vec!["api.models.read", "api.chat.completions.write"],
        ),
    ]
    .into_iter()
    .collect()
}

pub fn now() -> OffsetDateTime {
    datetime!(2026-06-01 12:00 UTC)
}

/// Maps opaque tokens `idp-<user>` to that user; `idp-down` simulates an
/// unreachable backend and `idp-t2-<user>` asserts tenant `t2`.
pub struct FakeIntrospector;

#[async_trait]
impl TokenIntrospector for FakeIntrospector {
    async fn introspect(&self, token: &SecretString) -> Result<Introspection, IntrospectionError> {
        let raw = token.expose_secret();
        if raw == "idp-down" {
            return Err(IntrospectionError::Unavailable("connection refused".to_owned()));
        }
        if raw == "idp-expired" {
            return Ok(Introspection {
                subject: "u1".to_owned(),
                tenant_id: None,
                expires_at: Some(datetime!(2020-01-01 0:00 UTC)),
            });
        }
        if let Some(subject) = raw.strip_prefix("idp-t2-") {
            return Ok(Introspection {
                subject: subject.to_owned(),
                tenant_id: Some("t2".to_owned()),
                expires_at: None,
            });
        }
        raw.strip_prefix("idp-")
            .map(|subject| Introspection {
                subject: subject.to_owned(),
                tenant_id: None,
                expires_at: None,
            })
            .ok_or_else(|| IntrospectionError::Rejected("unknown token".to_owned()))
    }
}

/// Exempts user `u1` only.
pub struct ExemptU1;

impl RateLimitExemption for ExemptU1 {
    fn is_excluded(&self, subject: &RateLimitSubject<'_>) -> bool {
        subject.user_id == "u1"
    }
}

/// Provider over a fixed snapshot; `None` behaves like a cache that has
/// never synchronised.
pub struct FixedDirectory(pub Option<Arc<DirectoryIndex>>);

impl FixedDirectory {
    pub fn loaded() -> Self {
        Self(Some(Arc::new(index())))
    }
}

impl DirectoryProvider for FixedDirectory {
    fn current(&self) -> Result<Arc<DirectoryIndex>, DomainError> {
        self.0
            .clone()
            .ok_or_else(|| DomainError::UpstreamUnavailable("directory not loaded".to_owned()))
    }

    fn last_synced_at(&self) -> Option<OffsetDateTime> {
        self.0.as_ref().map(|_| now())
    }
}

pub fn exemptions() -> Arc<dyn RateLimitExemption> {
    Arc::new(ExemptU1)
}
