//! Collaborator traits consumed by the RBAC decision core.
//!
//! Implementations live in the `rbac` module's infra layer or in callers'
//! own crates; the core only depends on these seams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use time::OffsetDateTime;

use crate::directory::Directory;
use crate::error::{IntrospectionError, SourceError};

/// Claims extracted from an identity-provider token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Introspection {
    /// User identifier the token was issued to.
    pub subject: String,
    /// Tenant the token was issued for, when the issuer asserts one.
    pub tenant_id: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

/// Verifies identity-provider tokens (JWT, opaque OIDC tokens).
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// - `Rejected` if the token is malformed, expired or unverifiable
    /// - `Unavailable` if the verification backend cannot be reached
    async fn introspect(&self, token: &SecretString) -> Result<Introspection, IntrospectionError>;
}

/// Produces full snapshots of the identity/membership store.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the store cannot be read or decoded.
    async fn fetch(&self) -> Result<Directory, SourceError>;
}

/// Immutable role → scopes grant table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    role_scopes: HashMap<String, HashSet<String>>,
}

impl PolicySnapshot {
    #[must_use]
    pub fn new(role_scopes: HashMap<String, HashSet<String>>) -> Self {
        Self { role_scopes }
    }

    /// Whether `role` is explicitly granted `scope`.
    #[must_use]
    pub fn grants(&self, role: &str, scope: &str) -> bool {
        self.role_scopes
            .get(role)
            .is_some_and(|scopes| scopes.contains(scope))
    }

    #[must_use]
    pub fn roles(&self) -> usize {
        self.role_scopes.len()
    }
}

impl<I, S> FromIterator<(String, I)> for PolicySnapshot
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (String, I)>>(iter: T) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(role, scopes)| (role, scopes.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

/// Source of capability grants.
///
/// A request evaluates against a single snapshot, so concurrent policy
/// updates never produce a mixed decision.
pub trait PolicyStore: Send + Sync {
    fn snapshot(&self) -> Arc<PolicySnapshot>;
}

/// Inputs to the rate-limit exemption predicate.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSubject<'a> {
    pub user_id: &'a str,
    pub tenant_id: &'a str,
    pub api_key_id: Option<&'a str>,
    /// `<resource>.<capability>`
    pub scope: &'a str,
}

/// Decides whether an authorized request bypasses rate limiting.
///
/// Consulted only after a request has been authorized; the result never
/// feeds back into the decision.
pub trait RateLimitExemption: Send + Sync {
    fn is_excluded(&self, subject: &RateLimitSubject<'_>) -> bool;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn snapshot_grants_only_listed_scopes() {
        let policy: PolicySnapshot = [(
            "projectMember".to_owned(),
            vec!["api.models.read", "api.chat.completions.write"],
        )]
        .into_iter()
        .collect();

        assert!(policy.grants("projectMember", "api.models.read"));
        assert!(!policy.grants("projectMember", "api.models.write"));
        assert!(!policy.grants("organizationOwner", "api.models.read"));
        assert_eq!(policy.roles(), 1);
    }
}
