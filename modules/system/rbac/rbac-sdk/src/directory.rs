//! Identity directory records.
//!
//! A [`Directory`] is a full snapshot of the identity/membership store:
//! users, organizations, projects, clusters, API keys and the memberships
//! between them. The decision core never mutates it.

use std::collections::HashSet;

use secrecy::SecretString;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::SourceError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// External, stable identifier.
    pub id: String,
    /// Resolver-local key.
    #[serde(default)]
    pub internal_id: Option<String>,
    /// Home tenant.
    pub tenant_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    Owner,
    Reader,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMembership {
    pub user_id: String,
    pub organization_id: String,
    pub role: OrganizationRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub organization_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub kubernetes_namespace: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMembership {
    pub user_id: String,
    pub project_id: String,
    pub role: ProjectRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tenant_id: String,
    /// Key presented by the cluster's workers.
    pub registration_key: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: String,
    pub secret: SecretString,
    pub user_id: String,
    pub organization_id: String,
    pub project_id: String,
    pub tenant_id: String,
    /// Role looked up in the policy store.
    pub role: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// Full snapshot of the identity/membership store.
///
/// Record order is significant: project resolution picks the first
/// matching record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Directory {
    pub users: Vec<UserRecord>,
    pub organizations: Vec<OrganizationRecord>,
    pub organization_users: Vec<OrganizationMembership>,
    pub projects: Vec<ProjectRecord>,
    pub project_users: Vec<ProjectMembership>,
    pub clusters: Vec<ClusterRecord>,
    pub api_keys: Vec<ApiKeyRecord>,
}

impl Directory {
    /// Check referential integrity of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Inconsistent`] when a record refers to an
    /// unknown entity or crosses a tenant boundary.
    pub fn validate(&self) -> Result<(), SourceError> {
        let users: HashSet<&str> = self.users.iter().map(|u| u.id.as_str()).collect();
        let orgs: HashSet<(&str, &str)> = self
            .organizations
            .iter()
            .map(|o| (o.id.as_str(), o.tenant_id.as_str()))
            .collect();
        let org_ids: HashSet<&str> = orgs.iter().map(|(id, _)| *id).collect();
        let projects: HashSet<&str> = self.projects.iter().map(|p| p.id.as_str()).collect();

        for m in &self.organization_users {
            if !org_ids.contains(m.organization_id.as_str()) {
                return Err(inconsistent(format!(
                    "organization {} not found for member {}",
                    m.organization_id, m.user_id
                )));
            }
            if !users.contains(m.user_id.as_str()) {
                return Err(inconsistent(format!(
                    "user {} not found for organization {}",
                    m.user_id, m.organization_id
                )));
            }
        }

        for p in &self.projects {
            if !orgs.contains(&(p.organization_id.as_str(), p.tenant_id.as_str())) {
                return Err(inconsistent(format!(
                    "project {} refers to organization {} outside tenant {}",
                    p.id, p.organization_id, p.tenant_id
                )));
            }
        }

        for m in &self.project_users {
            if !projects.contains(m.project_id.as_str()) {
                return Err(inconsistent(format!(
                    "project {} not found for member {}",
                    m.project_id, m.user_id
                )));
            }
        }

        Ok(())
    }
}

fn inconsistent(msg: String) -> SourceError {
    SourceError::Inconsistent(msg)
}
