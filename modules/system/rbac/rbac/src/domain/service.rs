//! Decision assembler.
//!
//! Runs validate → resolve → match for the user path and validate →
//! resolve for the worker path against a single directory snapshot and a
//! single policy snapshot. The first failing stage short-circuits into the
//! empty denial; only an upstream fault escapes as an error.

use std::sync::Arc;

use rbac_sdk::{
    AssignedKubernetesEnv, AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest,
    AuthorizeWorkerResponse, Cluster, Organization, PolicyStore, Project, User,
};
use secrecy::SecretString;
use time::OffsetDateTime;
use tracing::debug;

use super::directory::DirectoryProvider;
use super::error::DomainError;
use super::matcher::CapabilityMatcher;
use super::resolver::{IdentityContext, IdentityResolver, ResolveRequest, UserIdentity, WorkerIdentity};
use super::validator::{TokenKind, TokenValidator};

/// RBAC decision service.
pub struct Service {
    directory: Arc<dyn DirectoryProvider>,
    policy: Arc<dyn PolicyStore>,
    validator: TokenValidator,
    resolver: IdentityResolver,
    matcher: CapabilityMatcher,
}

impl Service {
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryProvider>,
        policy: Arc<dyn PolicyStore>,
        validator: TokenValidator,
        resolver: IdentityResolver,
        matcher: CapabilityMatcher,
    ) -> Self {
        Self {
            directory,
            policy,
            validator,
            resolver,
            matcher,
        }
    }

    /// Directory provider backing this service, for readiness reporting.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn DirectoryProvider> {
        &self.directory
    }

    /// Decide a user-path request.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UpstreamUnavailable`] when the directory or the
    /// token introspection backend cannot be used. Every other failure is
    /// returned as [`AuthorizeResponse::denied`].
    #[tracing::instrument(skip_all, fields(resource = request.access_resource.as_deref()))]
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<AuthorizeResponse, DomainError> {
        settle(self.decide_user(request).await, AuthorizeResponse::denied)
    }

    /// Decide a worker-path request.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UpstreamUnavailable`] when the directory cannot
    /// be used. Every other failure is returned as
    /// [`AuthorizeWorkerResponse::denied`].
    #[tracing::instrument(skip_all)]
    pub async fn authorize_worker(
        &self,
        request: &AuthorizeWorkerRequest,
    ) -> Result<AuthorizeWorkerResponse, DomainError> {
        settle(
            self.decide_worker(request).await,
            AuthorizeWorkerResponse::denied,
        )
    }

    async fn decide_user(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<AuthorizeResponse, DomainError> {
        let token = required_token(request.token.as_deref())?;
        let directory = self.directory.current()?;
        let policy = self.policy.snapshot();

        let validated = self
            .validator
            .validate(&directory, &token, OffsetDateTime::now_utc())
            .await?;
        if validated.kind != TokenKind::User {
            return Err(DomainError::InvalidToken(
                "worker token presented on the user path".to_owned(),
            ));
        }

        let scope = ResolveRequest {
            access_resource: request.access_resource.as_deref(),
            organization_id: request.organization_id.as_deref(),
            project_id: request.project_id.as_deref(),
        };
        let IdentityContext::User(identity) =
            self.resolver.resolve(&directory, &validated, scope)?
        else {
            return Err(DomainError::InvalidToken(
                "worker identity on the user path".to_owned(),
            ));
        };
        require_tenant(&identity.tenant_id)?;

        let outcome = self.matcher.evaluate(
            &identity,
            request.access_resource.as_deref(),
            request.capability.as_deref(),
            &policy,
        )?;

        debug!(user_id = %identity.user.id, tenant_id = %identity.tenant_id, "authorized");
        Ok(user_decision(identity, outcome.excluded_from_rate_limiting))
    }

    async fn decide_worker(
        &self,
        request: &AuthorizeWorkerRequest,
    ) -> Result<AuthorizeWorkerResponse, DomainError> {
        let token = required_token(request.token.as_deref())?;
        let directory = self.directory.current()?;

        let validated = self
            .validator
            .validate(&directory, &token, OffsetDateTime::now_utc())
            .await?;
        if validated.kind != TokenKind::Worker {
            return Err(DomainError::InvalidToken(
                "user token presented on the worker path".to_owned(),
            ));
        }

        let IdentityContext::Worker(identity) =
            self.resolver
                .resolve(&directory, &validated, ResolveRequest::default())?
        else {
            return Err(DomainError::InvalidToken(
                "user identity on the worker path".to_owned(),
            ));
        };
        require_tenant(&identity.tenant_id)?;

        debug!(cluster_id = %identity.cluster.id, tenant_id = %identity.tenant_id, "worker authorized");
        Ok(worker_decision(identity))
    }
}

/// Collapse denial-class errors into the empty response.
fn settle<T>(result: Result<T, DomainError>, denied: fn() -> T) -> Result<T, DomainError> {
    match result {
        Ok(decision) => Ok(decision),
        Err(e) if e.is_denial() => {
            debug!(stage = e.stage(), reason = %e, "request denied");
            Ok(denied())
        }
        Err(e) => {
            tracing::warn!(error = %e, "decision aborted");
            Err(e)
        }
    }
}

fn required_token(token: Option<&str>) -> Result<SecretString, DomainError> {
    token
        .map(|t| SecretString::from(t.to_owned()))
        .ok_or_else(|| DomainError::InvalidToken("token is required".to_owned()))
}

fn require_tenant(tenant_id: &str) -> Result<(), DomainError> {
    if tenant_id.is_empty() {
        return Err(DomainError::UnknownIdentity(
            "identity has no tenant".to_owned(),
        ));
    }
    Ok(())
}

fn user_decision(identity: UserIdentity, excluded_from_rate_limiting: bool) -> AuthorizeResponse {
    AuthorizeResponse {
        authorized: true,
        user: Some(User {
            id: Some(identity.user.id),
            internal_id: identity.user.internal_id,
        }),
        organization: identity.organization.map(|o| Organization {
            id: Some(o.id),
            title: o.title,
        }),
        project: identity.project.map(|p| Project {
            id: Some(p.record.id),
            title: p.record.title,
            assigned_kubernetes_envs: p
                .environments
                .into_iter()
                .map(|env| AssignedKubernetesEnv {
                    cluster_id: Some(env.cluster_id),
                    cluster_name: env.cluster_name,
                    namespace: env.namespace,
                })
                .collect(),
        }),
        tenant_id: Some(identity.tenant_id),
        api_key_id: identity.api_key_id,
        excluded_from_rate_limiting,
    }
}

fn worker_decision(identity: WorkerIdentity) -> AuthorizeWorkerResponse {
    AuthorizeWorkerResponse {
        authorized: true,
        cluster: Some(Cluster {
            id: Some(identity.cluster.id),
            name: identity.cluster.name,
        }),
        tenant_id: Some(identity.tenant_id),
    }
}
