//! Capability matching for the user path.

use std::sync::Arc;

use rbac_sdk::{PolicySnapshot, RateLimitExemption, RateLimitSubject};

use super::error::DomainError;
use super::resolver::{Grantee, UserIdentity};

/// Decision of the matcher for an authorized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub excluded_from_rate_limiting: bool,
}

pub struct CapabilityMatcher {
    exemption: Arc<dyn RateLimitExemption>,
}

impl CapabilityMatcher {
    #[must_use]
    pub fn new(exemption: Arc<dyn RateLimitExemption>) -> Self {
        Self { exemption }
    }

    /// Check `resource`/`capability` against the grants of `identity`.
    ///
    /// A tenant-scoped grantee only exists for resources the resolver
    /// treats as tenant-scoped, and those are granted to any resolved user.
    /// Everything else needs an exact `<resource>.<capability>` grant for
    /// the grantee's role.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PolicyDenied`] when no grant matches.
    pub fn evaluate(
        &self,
        identity: &UserIdentity,
        resource: Option<&str>,
        capability: Option<&str>,
        policy: &PolicySnapshot,
    ) -> Result<MatchOutcome, DomainError> {
        let (Some(resource), Some(capability)) = (resource, capability) else {
            return Err(DomainError::PolicyDenied(
                "resource and capability are required".to_owned(),
            ));
        };
        let scope = format!("{resource}.{capability}");

        let granted = match &identity.grantee {
            Grantee::Tenant => true,
            grantee => grantee.role().is_some_and(|role| policy.grants(role, &scope)),
        };
        if !granted {
            return Err(DomainError::PolicyDenied(format!(
                "no grant for scope {scope}"
            )));
        }

        let subject = RateLimitSubject {
            user_id: &identity.user.id,
            tenant_id: &identity.tenant_id,
            api_key_id: identity.api_key_id.as_deref(),
            scope: &scope,
        };
        Ok(MatchOutcome {
            excluded_from_rate_limiting: self.exemption.is_excluded(&subject),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::resolver::{IdentityContext, IdentityResolver, ResolveRequest};
    use crate::domain::test_support::{exemptions, index, policy};
    use crate::domain::validator::{TokenKind, ValidatedToken};

    fn identity(subject: &str, resource: &str) -> UserIdentity {
        let token = ValidatedToken {
            subject: subject.to_owned(),
            tenant_id: None,
            kind: TokenKind::User,
            expires_at: None,
            api_key: None,
        };
        let request = ResolveRequest {
            access_resource: Some(resource),
            ..ResolveRequest::default()
        };
        match IdentityResolver::new(vec!["api.organizations".to_owned()])
            .resolve(&index(), &token, request)
            .unwrap()
        {
            IdentityContext::User(identity) => identity,
            IdentityContext::Worker(_) => panic!("expected a user identity"),
        }
    }

    fn evaluate(
        subject: &str,
        resource: &str,
        capability: &str,
    ) -> Result<MatchOutcome, DomainError> {
        CapabilityMatcher::new(exemptions()).evaluate(
            &identity(subject, resource),
            Some(resource),
            Some(capability),
            &policy(),
        )
    }

    #[test]
    fn organization_owner_is_granted_listed_scope() {
        let outcome = evaluate("u1", "api.models", "write").unwrap();
        assert!(outcome.excluded_from_rate_limiting);
    }

    #[test]
    fn project_member_is_limited_to_member_scopes() {
        let outcome = evaluate("u2", "api.models", "read").unwrap();
        assert!(!outcome.excluded_from_rate_limiting);

        let err = evaluate("u2", "api.models", "write").unwrap_err();
        assert!(matches!(err, DomainError::PolicyDenied(_)));
    }

    #[test]
    fn unlisted_scope_is_denied_by_default() {
        assert!(evaluate("u1", "api.files", "read").is_err());
    }

    #[test]
    fn tenant_scoped_resource_is_granted_to_any_user() {
        assert!(evaluate("u4", "api.organizations", "write").is_ok());
    }

    #[test]
    fn missing_capability_is_denied() {
        let matcher = CapabilityMatcher::new(exemptions());
        let err = matcher
            .evaluate(&identity("u1", "api.models"), Some("api.models"), None, &policy())
            .unwrap_err();
        assert!(matches!(err, DomainError::PolicyDenied(_)));
    }

    #[test]
    fn same_inputs_give_same_outcome() {
        let first = evaluate("u2", "api.chat.completions", "write");
        let second = evaluate("u2", "api.chat.completions", "write");
        assert_eq!(first.ok(), second.ok());
    }
}
