//! Configuration-backed policy store and rate-limit exemptions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rbac_sdk::{PolicySnapshot, PolicyStore, RateLimitExemption, RateLimitSubject};

use crate::config::RateLimitExemptionsConfig;

/// Role → scopes table loaded from configuration. Fixed for the life of
/// the process; every request shares the same snapshot.
pub struct StaticPolicyStore {
    snapshot: Arc<PolicySnapshot>,
}

impl StaticPolicyStore {
    #[must_use]
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    #[must_use]
    pub fn from_role_scopes<S: std::hash::BuildHasher>(
        role_scopes: &HashMap<String, Vec<String>, S>,
    ) -> Self {
        Self::new(
            role_scopes
                .iter()
                .map(|(role, scopes)| (role.clone(), scopes.iter().cloned()))
                .collect(),
        )
    }
}

impl PolicyStore for StaticPolicyStore {
    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot)
    }
}

/// Exempts listed users, API keys and scopes from rate limiting.
#[derive(Debug, Default)]
pub struct ConfiguredExemptions {
    user_ids: HashSet<String>,
    api_key_ids: HashSet<String>,
    scopes: HashSet<String>,
}

impl ConfiguredExemptions {
    #[must_use]
    pub fn new(cfg: &RateLimitExemptionsConfig) -> Self {
        Self {
            user_ids: cfg.user_ids.iter().cloned().collect(),
            api_key_ids: cfg.api_key_ids.iter().cloned().collect(),
            scopes: cfg.scopes.iter().cloned().collect(),
        }
    }
}

impl RateLimitExemption for ConfiguredExemptions {
    fn is_excluded(&self, subject: &RateLimitSubject<'_>) -> bool {
        self.user_ids.contains(subject.user_id)
            || subject
                .api_key_id
                .is_some_and(|id| self.api_key_ids.contains(id))
            || self.scopes.contains(subject.scope)
    }
}
