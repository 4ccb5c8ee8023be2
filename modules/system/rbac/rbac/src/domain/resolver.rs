//! Identity resolution.
//!
//! Maps a validated token onto directory records. The tenant always comes
//! from the token; organization and project ids supplied by the caller are
//! only accepted when they live in that tenant.

use rbac_sdk::{
    ClusterRecord, OrganizationRecord, OrganizationRole, ProjectRecord, ProjectRole, UserRecord,
};

use super::directory::DirectoryIndex;
use super::error::DomainError;
use super::validator::{ApiKeyBinding, TokenKind, ValidatedToken};

/// Caller-supplied scope of a user-path request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveRequest<'a> {
    pub access_resource: Option<&'a str>,
    pub organization_id: Option<&'a str>,
    pub project_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub enum IdentityContext {
    User(UserIdentity),
    Worker(WorkerIdentity),
}

/// What the capability matcher evaluates grants for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    Member {
        organization: OrganizationRole,
        project: Option<ProjectRole>,
    },
    ApiKey {
        role: String,
    },
    /// Request for a tenant-scoped resource; holds no role.
    Tenant,
}

impl Grantee {
    /// Policy role this grantee is evaluated as.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Member {
                organization: OrganizationRole::Owner,
                ..
            } => Some("organizationOwner"),
            Self::Member {
                organization: OrganizationRole::Reader,
                project: Some(ProjectRole::Owner),
            } => Some("projectOwner"),
            Self::Member {
                organization: OrganizationRole::Reader,
                project: Some(ProjectRole::Member),
            } => Some("projectMember"),
            Self::Member { project: None, .. } | Self::Tenant => None,
            Self::ApiKey { role } => Some(role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentBinding {
    pub cluster_id: String,
    pub cluster_name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedProject {
    pub record: ProjectRecord,
    pub environments: Vec<EnvironmentBinding>,
}

#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user: UserRecord,
    pub tenant_id: String,
    pub organization: Option<OrganizationRecord>,
    pub project: Option<ResolvedProject>,
    pub grantee: Grantee,
    pub api_key_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub cluster: ClusterRecord,
    pub tenant_id: String,
}

/// Resolves validated tokens against a directory snapshot.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    tenant_scoped_prefixes: Vec<String>,
}

impl IdentityResolver {
    /// Resources starting with one of `tenant_scoped_prefixes` skip
    /// organization/project resolution.
    #[must_use]
    pub fn new(tenant_scoped_prefixes: Vec<String>) -> Self {
        Self {
            tenant_scoped_prefixes,
        }
    }

    #[must_use]
    pub fn is_tenant_scoped(&self, access_resource: &str) -> bool {
        self.tenant_scoped_prefixes
            .iter()
            .any(|prefix| access_resource.starts_with(prefix.as_str()))
    }

    /// # Errors
    ///
    /// Returns [`DomainError::UnknownIdentity`] when a referenced record does
    /// not exist or belongs to another tenant.
    pub fn resolve(
        &self,
        directory: &DirectoryIndex,
        token: &ValidatedToken,
        request: ResolveRequest<'_>,
    ) -> Result<IdentityContext, DomainError> {
        match token.kind {
            TokenKind::Worker => resolve_worker(directory, token).map(IdentityContext::Worker),
            TokenKind::User => self
                .resolve_user(directory, token, request)
                .map(IdentityContext::User),
        }
    }

    fn resolve_user(
        &self,
        directory: &DirectoryIndex,
        token: &ValidatedToken,
        request: ResolveRequest<'_>,
    ) -> Result<UserIdentity, DomainError> {
        let user = directory
            .user(&token.subject)
            .ok_or_else(|| unknown(format!("user {} not found", token.subject)))?;
        let tenant_id = match token.tenant_id.as_deref() {
            Some(tenant) if tenant != user.tenant_id => {
                return Err(unknown(format!("user {} not in token tenant", user.id)));
            }
            Some(tenant) => tenant,
            None => user.tenant_id.as_str(),
        };

        if let Some(key) = &token.api_key {
            return resolve_api_key(directory, user, tenant_id, key, request);
        }

        if request
            .access_resource
            .is_some_and(|resource| self.is_tenant_scoped(resource))
        {
            check_named_scope(directory, user, tenant_id, request)?;
            return Ok(UserIdentity {
                user: user.clone(),
                tenant_id: tenant_id.to_owned(),
                organization: None,
                project: None,
                grantee: Grantee::Tenant,
                api_key_id: None,
            });
        }

        let project = associated_project(directory, user, tenant_id, request)?;
        let organization_role = organization_role(directory, user, &project.organization_id)?;
        let organization = owned_organization(directory, &project.organization_id, tenant_id)?;

        Ok(UserIdentity {
            user: user.clone(),
            tenant_id: tenant_id.to_owned(),
            organization: Some(organization.clone()),
            project: Some(resolved_project(directory, project, tenant_id)),
            grantee: Grantee::Member {
                organization: organization_role,
                project: directory.project_role(&user.id, &project.id),
            },
            api_key_id: None,
        })
    }
}

fn resolve_worker(
    directory: &DirectoryIndex,
    token: &ValidatedToken,
) -> Result<WorkerIdentity, DomainError> {
    let cluster = directory
        .cluster(&token.subject)
        .ok_or_else(|| unknown(format!("cluster {} not found", token.subject)))?;
    let tenant_id = token
        .tenant_id
        .as_deref()
        .ok_or_else(|| unknown("worker token without tenant".to_owned()))?;
    if cluster.tenant_id != tenant_id {
        return Err(unknown(format!(
            "cluster {} is not owned by the token tenant",
            cluster.id
        )));
    }

    Ok(WorkerIdentity {
        cluster: cluster.clone(),
        tenant_id: tenant_id.to_owned(),
    })
}

fn resolve_api_key(
    directory: &DirectoryIndex,
    user: &UserRecord,
    tenant_id: &str,
    key: &ApiKeyBinding,
    request: ResolveRequest<'_>,
) -> Result<UserIdentity, DomainError> {
    if request
        .organization_id
        .is_some_and(|id| id != key.organization_id)
    {
        return Err(unknown(format!("api key {} is bound to another organization", key.id)));
    }
    if request.project_id.is_some_and(|id| id != key.project_id) {
        return Err(unknown(format!("api key {} is bound to another project", key.id)));
    }

    let project = owned_project(directory, &key.project_id, tenant_id)?;
    if project.organization_id != key.organization_id {
        return Err(unknown(format!(
            "api key {} project is outside its organization",
            key.id
        )));
    }
    let organization = owned_organization(directory, &key.organization_id, tenant_id)?;

    Ok(UserIdentity {
        user: user.clone(),
        tenant_id: tenant_id.to_owned(),
        organization: Some(organization.clone()),
        project: Some(resolved_project(directory, project, tenant_id)),
        grantee: Grantee::ApiKey {
            role: key.role.clone(),
        },
        api_key_id: Some(key.id.clone()),
    })
}

/// Pick the project a request applies to.
///
/// An explicit project wins; an explicit organization narrows to the user's
/// first project there, else the organization's first project; with
/// neither, the user's first project, else the first project of the first
/// of the user's organizations that has any.
fn associated_project<'d>(
    directory: &'d DirectoryIndex,
    user: &UserRecord,
    tenant_id: &str,
    request: ResolveRequest<'_>,
) -> Result<&'d ProjectRecord, DomainError> {
    if let Some(project_id) = request.project_id {
        let project = owned_project(directory, project_id, tenant_id)?;
        if request
            .organization_id
            .is_some_and(|org| org != project.organization_id)
        {
            return Err(unknown(format!(
                "project {project_id} does not belong to the requested organization"
            )));
        }
        return Ok(project);
    }

    if let Some(organization_id) = request.organization_id {
        owned_organization(directory, organization_id, tenant_id)?;
        return directory
            .projects_of(&user.id)
            .iter()
            .filter_map(|(id, _)| directory.project(id))
            .find(|p| p.organization_id == organization_id && p.tenant_id == tenant_id)
            .or_else(|| directory.first_project_of(organization_id))
            .ok_or_else(|| unknown(format!("organization {organization_id} has no projects")));
    }

    directory
        .projects_of(&user.id)
        .iter()
        .filter_map(|(id, _)| directory.project(id))
        .find(|p| p.tenant_id == tenant_id)
        .or_else(|| {
            directory
                .organizations_of(&user.id)
                .iter()
                .filter_map(|(id, _)| directory.first_project_of(id))
                .find(|p| p.tenant_id == tenant_id)
        })
        .ok_or_else(|| unknown(format!("no project found for user {}", user.id)))
}

/// Tenant-scoped requests resolve no organization or project, but one the
/// caller names must still exist in the tenant and include the user.
fn check_named_scope(
    directory: &DirectoryIndex,
    user: &UserRecord,
    tenant_id: &str,
    request: ResolveRequest<'_>,
) -> Result<(), DomainError> {
    if let Some(project_id) = request.project_id {
        let project = owned_project(directory, project_id, tenant_id)?;
        if request
            .organization_id
            .is_some_and(|org| org != project.organization_id)
        {
            return Err(unknown(format!(
                "project {project_id} does not belong to the requested organization"
            )));
        }
        organization_role(directory, user, &project.organization_id)?;
    }
    if let Some(organization_id) = request.organization_id {
        owned_organization(directory, organization_id, tenant_id)?;
        organization_role(directory, user, organization_id)?;
    }
    Ok(())
}

fn organization_role(
    directory: &DirectoryIndex,
    user: &UserRecord,
    organization_id: &str,
) -> Result<OrganizationRole, DomainError> {
    directory
        .organization_role(&user.id, organization_id)
        .ok_or_else(|| {
            unknown(format!(
                "user {} has no role in organization {organization_id}",
                user.id
            ))
        })
}

fn owned_project<'d>(
    directory: &'d DirectoryIndex,
    project_id: &str,
    tenant_id: &str,
) -> Result<&'d ProjectRecord, DomainError> {
    directory
        .project(project_id)
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or_else(|| unknown(format!("project {project_id} not found")))
}

fn owned_organization<'d>(
    directory: &'d DirectoryIndex,
    organization_id: &str,
    tenant_id: &str,
) -> Result<&'d OrganizationRecord, DomainError> {
    directory
        .organization(organization_id)
        .filter(|o| o.tenant_id == tenant_id)
        .ok_or_else(|| unknown(format!("organization {organization_id} not found")))
}

fn resolved_project(
    directory: &DirectoryIndex,
    project: &ProjectRecord,
    tenant_id: &str,
) -> ResolvedProject {
    let environments = directory
        .clusters_of(tenant_id)
        .map(|c| EnvironmentBinding {
            cluster_id: c.id.clone(),
            cluster_name: c.name.clone(),
            namespace: project.kubernetes_namespace.clone(),
        })
        .collect();
    ResolvedProject {
        record: project.clone(),
        environments,
    }
}

fn unknown(msg: String) -> DomainError {
    DomainError::UnknownIdentity(msg)
}
