//! Indexed, read-only view of a directory snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use rbac_sdk::{
    ApiKeyRecord, ClusterRecord, Directory, OrganizationRecord, OrganizationRole, ProjectRecord,
    ProjectRole, UserRecord,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::error::DomainError;

/// Hex-encoded SHA-256 of a secret. Secrets are only ever compared through
/// their digest.
#[must_use]
pub fn secret_digest(secret: &SecretString) -> String {
    hex::encode(Sha256::digest(secret.expose_secret().as_bytes()))
}

/// Hands out the current directory snapshot.
///
/// Each request calls [`DirectoryProvider::current`] once and performs every
/// lookup against the returned snapshot.
pub trait DirectoryProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DomainError::UpstreamUnavailable`] until a snapshot has been
    /// loaded.
    fn current(&self) -> Result<Arc<DirectoryIndex>, DomainError>;

    /// Time of the last successful synchronisation.
    fn last_synced_at(&self) -> Option<OffsetDateTime>;
}

/// Lookup tables built once per snapshot.
///
/// Membership lists keep directory order; the first matching record wins
/// wherever a choice has to be made.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    users: HashMap<String, UserRecord>,
    organizations: HashMap<String, OrganizationRecord>,
    projects: HashMap<String, ProjectRecord>,
    clusters: HashMap<String, ClusterRecord>,
    user_organizations: HashMap<String, Vec<(String, OrganizationRole)>>,
    user_projects: HashMap<String, Vec<(String, ProjectRole)>>,
    organization_projects: HashMap<String, Vec<String>>,
    tenant_clusters: HashMap<String, Vec<String>>,
    clusters_by_key: HashMap<String, String>,
    api_keys_by_secret: HashMap<String, ApiKeyRecord>,
}

impl DirectoryIndex {
    #[must_use]
    pub fn new(directory: Directory) -> Self {
        let mut index = Self::default();

        for project in &directory.projects {
            index
                .organization_projects
                .entry(project.organization_id.clone())
                .or_default()
                .push(project.id.clone());
        }
        for m in directory.organization_users {
            index
                .user_organizations
                .entry(m.user_id)
                .or_default()
                .push((m.organization_id, m.role));
        }
        for m in directory.project_users {
            index
                .user_projects
                .entry(m.user_id)
                .or_default()
                .push((m.project_id, m.role));
        }
        for cluster in directory.clusters {
            index
                .clusters_by_key
                .insert(secret_digest(&cluster.registration_key), cluster.id.clone());
            index
                .tenant_clusters
                .entry(cluster.tenant_id.clone())
                .or_default()
                .push(cluster.id.clone());
            index.clusters.entry(cluster.id.clone()).or_insert(cluster);
        }
        for ids in index.tenant_clusters.values_mut() {
            ids.sort();
            ids.dedup();
        }
        for key in directory.api_keys {
            index
                .api_keys_by_secret
                .insert(secret_digest(&key.secret), key);
        }

        index.users = keyed(directory.users, |u| &u.id);
        index.organizations = keyed(directory.organizations, |o| &o.id);
        index.projects = keyed(directory.projects, |p| &p.id);
        index
    }

    #[must_use]
    pub fn user(&self, id: &str) -> Option<&UserRecord> {
        self.users.get(id)
    }

    #[must_use]
    pub fn organization(&self, id: &str) -> Option<&OrganizationRecord> {
        self.organizations.get(id)
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<&ProjectRecord> {
        self.projects.get(id)
    }

    #[must_use]
    pub fn cluster(&self, id: &str) -> Option<&ClusterRecord> {
        self.clusters.get(id)
    }

    /// Cluster whose registration key equals `token`.
    #[must_use]
    pub fn cluster_by_registration_key(&self, token: &SecretString) -> Option<&ClusterRecord> {
        self.clusters_by_key
            .get(&secret_digest(token))
            .and_then(|id| self.clusters.get(id))
    }

    /// API key whose secret equals `token`.
    #[must_use]
    pub fn api_key_by_secret(&self, token: &SecretString) -> Option<&ApiKeyRecord> {
        self.api_keys_by_secret.get(&secret_digest(token))
    }

    /// Organizations the user belongs to, in directory order.
    pub fn organizations_of(&self, user_id: &str) -> &[(String, OrganizationRole)] {
        self.user_organizations
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Projects the user belongs to, in directory order.
    pub fn projects_of(&self, user_id: &str) -> &[(String, ProjectRole)] {
        self.user_projects
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn organization_role(&self, user_id: &str, organization_id: &str) -> Option<OrganizationRole> {
        self.organizations_of(user_id)
            .iter()
            .find(|(id, _)| id == organization_id)
            .map(|(_, role)| *role)
    }

    #[must_use]
    pub fn project_role(&self, user_id: &str, project_id: &str) -> Option<ProjectRole> {
        self.projects_of(user_id)
            .iter()
            .find(|(id, _)| id == project_id)
            .map(|(_, role)| *role)
    }

    /// First project of the organization, in directory order.
    #[must_use]
    pub fn first_project_of(&self, organization_id: &str) -> Option<&ProjectRecord> {
        self.organization_projects
            .get(organization_id)
            .and_then(|ids| ids.first())
            .and_then(|id| self.projects.get(id))
    }

    /// Clusters of the tenant, ordered by cluster id.
    pub fn clusters_of(&self, tenant_id: &str) -> impl Iterator<Item = &ClusterRecord> {
        self.tenant_clusters
            .get(tenant_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.clusters.get(id))
    }

    #[must_use]
    pub fn counts(&self) -> DirectoryCounts {
        DirectoryCounts {
            users: self.users.len(),
            organizations: self.organizations.len(),
            projects: self.projects.len(),
            clusters: self.clusters.len(),
            api_keys: self.api_keys_by_secret.len(),
        }
    }
}

/// Record counts, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryCounts {
    pub users: usize,
    pub organizations: usize,
    pub projects: usize,
    pub clusters: usize,
    pub api_keys: usize,
}

fn keyed<T>(records: Vec<T>, id: impl Fn(&T) -> &String) -> HashMap<String, T> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        map.entry(id(&record).clone()).or_insert(record);
    }
    map
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::test_support::directory;

    #[test]
    fn digest_is_hex_sha256() {
        let digest = secret_digest(&SecretString::from("abc"));
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn secrets_are_found_by_value() {
        let index = DirectoryIndex::new(directory());

        let cluster = index
            .cluster_by_registration_key(&SecretString::from("reg-c1"))
            .unwrap();
        assert_eq!(cluster.id, "c1");

        let key = index.api_key_by_secret(&SecretString::from("key-k1")).unwrap();
        assert_eq!(key.id, "k1");

        assert!(index
            .api_key_by_secret(&SecretString::from("nope"))
            .is_none());
    }

    #[test]
    fn tenant_clusters_are_ordered_by_id() {
        let index = DirectoryIndex::new(directory());

        let ids: Vec<&str> = index.clusters_of("t1").map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(index.clusters_of("unknown").count(), 0);
    }

    #[test]
    fn memberships_keep_directory_order() {
        let index = DirectoryIndex::new(directory());

        assert_eq!(index.first_project_of("o1").unwrap().id, "p1");
        assert_eq!(index.organization_role("u1", "o1"), Some(OrganizationRole::Owner));
        assert_eq!(index.organization_role("u1", "o2"), None);
        assert_eq!(index.project_role("u3", "p1"), Some(ProjectRole::Owner));
        assert!(index.projects_of("u1").is_empty());
    }
}
