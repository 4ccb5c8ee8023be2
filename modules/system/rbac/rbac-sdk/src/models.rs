//! Wire models for the RBAC internal service.
//!
//! Field names are part of the wire contract and serialize in camelCase.
//! Every field is optional on the wire: an absent field deserializes to
//! `None`, which is distinct from an empty string.

use serde::{Deserialize, Serialize};

/// Request paths of the RBAC internal service.
pub mod paths {
    /// User-path authorization.
    pub const AUTHORIZE: &str = "/llmariner.rbac.server.v1.RbacInternalService/Authorize";
    /// Worker-path authorization.
    pub const AUTHORIZE_WORKER: &str =
        "/llmariner.rbac.server.v1.RbacInternalService/AuthorizeWorker";
}

/// User-path authorization request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    /// Bearer token presented by the caller (JWT, API key secret).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Target resource, e.g. `api.models`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_resource: Option<String>,
    /// Requested capability, e.g. `read`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// Organization the request is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Project the request is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl AuthorizeRequest {
    /// Build a request with no organization or project scope.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        access_resource: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        Self {
            token: Some(token.into()),
            access_resource: Some(access_resource.into()),
            capability: Some(capability.into()),
            organization_id: None,
            project_id: None,
        }
    }

    #[must_use]
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// User-path authorization decision.
///
/// A denial carries no identity fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    #[serde(default)]
    pub excluded_from_rate_limiting: bool,
}

impl AuthorizeResponse {
    /// The "unauthorized, no identity" shape.
    #[must_use]
    pub fn denied() -> Self {
        Self::default()
    }

    /// True when no identity field is populated.
    #[must_use]
    pub fn is_identity_empty(&self) -> bool {
        self.user.is_none()
            && self.organization.is_none()
            && self.project.is_none()
            && self.tenant_id.is_none()
            && self.api_key_id.is_none()
            && !self.excluded_from_rate_limiting
    }
}

/// Worker-path authorization request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeWorkerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthorizeWorkerRequest {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Worker-path authorization decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeWorkerResponse {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl AuthorizeWorkerResponse {
    #[must_use]
    pub fn denied() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_identity_empty(&self) -> bool {
        self.cluster.is_none() && self.tenant_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Kubernetes environment a project's workloads run in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignedKubernetesEnv {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_kubernetes_envs: Vec<AssignedKubernetesEnv>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn denied_response_serializes_without_identity() {
        let value = serde_json::to_value(AuthorizeResponse::denied()).unwrap();
        assert_eq!(
            value,
            json!({ "authorized": false, "excludedFromRateLimiting": false })
        );
    }

    #[test]
    fn absent_field_differs_from_empty_string() {
        let absent: AuthorizeRequest =
            serde_json::from_value(json!({ "token": "t", "accessResource": "api.models" }))
                .unwrap();
        let empty: AuthorizeRequest = serde_json::from_value(
            json!({ "token": "t", "accessResource": "api.models", "organizationId": "" }),
        )
        .unwrap();

        assert_eq!(absent.organization_id, None);
        assert_eq!(empty.organization_id.as_deref(), Some(""));
    }

    #[test]
    fn request_uses_camel_case_field_names() {
        let req = AuthorizeRequest::new("t", "api.models", "read")
            .with_organization("o1")
            .with_project("p1");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "token": "t",
                "accessResource": "api.models",
                "capability": "read",
                "organizationId": "o1",
                "projectId": "p1",
            })
        );
    }

    #[test]
    fn project_envs_use_wire_names() {
        let project = Project {
            id: Some("p1".to_owned()),
            title: None,
            assigned_kubernetes_envs: vec![AssignedKubernetesEnv {
                cluster_id: Some("c1".to_owned()),
                cluster_name: Some("east".to_owned()),
                namespace: Some("ns".to_owned()),
            }],
        };
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "p1",
                "assignedKubernetesEnvs": [
                    { "clusterId": "c1", "clusterName": "east", "namespace": "ns" }
                ],
            })
        );
    }
}
