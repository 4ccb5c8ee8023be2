//! Decision tests for the RBAC service over the shared in-memory fixture.

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use rbac_sdk::{
        AssignedKubernetesEnv, AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest,
        AuthorizeWorkerResponse, Cluster, Organization, Project, User,
    };

    use crate::domain::error::DomainError;
    use crate::domain::matcher::CapabilityMatcher;
    use crate::domain::resolver::IdentityResolver;
    use crate::domain::service::Service;
    use crate::domain::test_support::{FakeIntrospector, FixedDirectory, exemptions, policy};
    use crate::domain::validator::TokenValidator;
    use crate::infra::StaticPolicyStore;
    use tracing_test::traced_test;

    fn service_over(directory: FixedDirectory) -> Service {
        Service::new(
            Arc::new(directory),
            Arc::new(StaticPolicyStore::new(policy())),
            TokenValidator::new(Some(Arc::new(FakeIntrospector))),
            IdentityResolver::new(vec!["api.organizations".to_owned()]),
            CapabilityMatcher::new(exemptions()),
        )
    }

    fn service() -> Service {
        service_over(FixedDirectory::loaded())
    }

    async fn assert_denied(svc: &Service, request: AuthorizeRequest) {
        let resp = svc.authorize(&request).await.unwrap();
        assert!(!resp.authorized);
        assert!(resp.is_identity_empty());
        assert_eq!(resp, AuthorizeResponse::denied());
    }

    #[tokio::test]
    async fn owner_reads_model_with_full_identity() {
        let resp = service()
            .authorize(&AuthorizeRequest::new("idp-u1", "models/m1", "read").with_organization("o1"))
            .await
            .unwrap();

        assert_eq!(
            resp,
            AuthorizeResponse {
                authorized: true,
                user: Some(User {
                    id: Some("u1".to_owned()),
                    internal_id: Some("i-u1".to_owned()),
                }),
                organization: Some(Organization {
                    id: Some("o1".to_owned()),
                    title: Some("Org One".to_owned()),
                }),
                project: Some(Project {
                    id: Some("p1".to_owned()),
                    title: Some("Project One".to_owned()),
                    assigned_kubernetes_envs: vec![
                        AssignedKubernetesEnv {
                            cluster_id: Some("c1".to_owned()),
                            cluster_name: Some("east".to_owned()),
                            namespace: Some("p1-ns".to_owned()),
                        },
                        AssignedKubernetesEnv {
                            cluster_id: Some("c2".to_owned()),
                            cluster_name: Some("west".to_owned()),
                            namespace: Some("p1-ns".to_owned()),
                        },
                    ],
                }),
                tenant_id: Some("t1".to_owned()),
                api_key_id: None,
                excluded_from_rate_limiting: true,
            }
        );
    }

    #[tokio::test]
    async fn project_member_is_limited_to_granted_scopes() {
        let svc = service();

        let read = svc
            .authorize(&AuthorizeRequest::new("idp-u2", "api.models", "read"))
            .await
            .unwrap();
        assert!(read.authorized);
        assert_eq!(read.project.and_then(|p| p.id).as_deref(), Some("p2"));
        assert!(!read.excluded_from_rate_limiting);

        assert_denied(&svc, AuthorizeRequest::new("idp-u2", "api.models", "write")).await;
    }

    #[tokio::test]
    async fn api_key_carries_its_binding() {
        let resp = service()
            .authorize(&AuthorizeRequest::new("key-k1", "api.chat.completions", "write"))
            .await
            .unwrap();

        assert!(resp.authorized);
        assert_eq!(resp.api_key_id.as_deref(), Some("k1"));
        assert_eq!(resp.user.and_then(|u| u.id).as_deref(), Some("u2"));
        assert_eq!(resp.organization.and_then(|o| o.id).as_deref(), Some("o1"));
        assert_eq!(resp.tenant_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn tenant_scoped_resource_needs_no_membership() {
        let resp = service()
            .authorize(&AuthorizeRequest::new("idp-u4", "api.organizations", "list"))
            .await
            .unwrap();

        assert!(resp.authorized);
        assert_eq!(resp.tenant_id.as_deref(), Some("t1"));
        assert!(resp.organization.is_none());
        assert!(resp.project.is_none());
    }

    #[tokio::test]
    async fn tenant_scoped_resource_denies_foreign_organizations() {
        let svc = service();

        for organization_id in ["o2", "ox", "does-not-exist"] {
            assert_denied(
                &svc,
                AuthorizeRequest::new("idp-u1", "api.organizations", "list")
                    .with_organization(organization_id),
            )
            .await;
        }
        assert_denied(
            &svc,
            AuthorizeRequest::new("idp-u1", "api.organizations", "list").with_project("px"),
        )
        .await;

        let own = svc
            .authorize(
                &AuthorizeRequest::new("idp-u1", "api.organizations", "list")
                    .with_organization("o1"),
            )
            .await
            .unwrap();
        assert!(own.authorized);
        assert!(own.organization.is_none());
    }

    #[tokio::test]
    async fn denials_carry_no_identity() {
        let svc = service();

        // user without any membership
        assert_denied(&svc, AuthorizeRequest::new("idp-u4", "api.models", "read")).await;
        // organization the user does not belong to
        assert_denied(
            &svc,
            AuthorizeRequest::new("idp-u1", "api.models", "read").with_organization("o2"),
        )
        .await;
        // unknown subject, unknown token, tenant mismatch
        assert_denied(&svc, AuthorizeRequest::new("idp-nobody", "api.models", "read")).await;
        assert_denied(&svc, AuthorizeRequest::new("garbage", "api.models", "read")).await;
        assert_denied(&svc, AuthorizeRequest::new("idp-t2-u1", "api.models", "read")).await;
        // api key used outside its project
        assert_denied(
            &svc,
            AuthorizeRequest::new("key-k1", "api.models", "read").with_project("p1"),
        )
        .await;
    }

    #[tokio::test]
    async fn missing_fields_are_denied() {
        let svc = service();

        assert_denied(&svc, AuthorizeRequest::default()).await;
        assert_denied(
            &svc,
            AuthorizeRequest {
                token: Some("idp-u1".to_owned()),
                access_resource: Some("models/m1".to_owned()),
                ..AuthorizeRequest::default()
            },
        )
        .await;
        assert_denied(&svc, AuthorizeRequest::new("", "api.models", "read")).await;
    }

    #[tokio::test]
    async fn expired_tokens_are_denied() {
        let svc = service();

        assert_denied(&svc, AuthorizeRequest::new("idp-expired", "models/m1", "read")).await;
        assert_denied(&svc, AuthorizeRequest::new("key-k2", "api.models", "read")).await;
    }

    #[tokio::test]
    async fn worker_resolves_cluster_and_tenant() {
        let resp = service()
            .authorize_worker(&AuthorizeWorkerRequest::new("reg-c1"))
            .await
            .unwrap();

        assert_eq!(
            resp,
            AuthorizeWorkerResponse {
                authorized: true,
                cluster: Some(Cluster {
                    id: Some("c1".to_owned()),
                    name: Some("east".to_owned()),
                }),
                tenant_id: Some("t1".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn tokens_are_not_accepted_across_paths() {
        let svc = service();

        assert_denied(&svc, AuthorizeRequest::new("reg-c1", "api.models", "read")).await;

        for token in ["idp-u1", "key-k1", "unknown", ""] {
            let resp = svc
                .authorize_worker(&AuthorizeWorkerRequest::new(token))
                .await
                .unwrap();
            assert!(!resp.authorized);
            assert!(resp.is_identity_empty());
        }
        let missing = svc
            .authorize_worker(&AuthorizeWorkerRequest::default())
            .await
            .unwrap();
        assert_eq!(missing, AuthorizeWorkerResponse::denied());
    }

    #[tokio::test]
    async fn repeated_requests_decide_identically() {
        let svc = service();
        let request = AuthorizeRequest::new("idp-u2", "api.models", "read").with_organization("o1");

        let first = svc.authorize(&request).await.unwrap();
        let second = svc.authorize(&request).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unreachable_idp_is_an_error_not_a_denial() {
        let err = service()
            .authorize(&AuthorizeRequest::new("idp-down", "api.models", "read"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn unsynchronised_directory_is_an_error_on_both_paths() {
        let svc = service_over(FixedDirectory(None));

        assert!(matches!(
            svc.authorize(&AuthorizeRequest::new("key-k1", "api.models", "read"))
                .await
                .unwrap_err(),
            DomainError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            svc.authorize_worker(&AuthorizeWorkerRequest::new("reg-c1"))
                .await
                .unwrap_err(),
            DomainError::UpstreamUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn missing_token_is_denied_even_without_directory() {
        let resp = service_over(FixedDirectory(None))
            .authorize(&AuthorizeRequest::default())
            .await
            .unwrap();

        assert_eq!(resp, AuthorizeResponse::denied());
    }

    #[tokio::test]
    #[traced_test]
    async fn denials_are_logged_without_the_token() {
        let resp = service()
            .authorize(&AuthorizeRequest::new("key-k1", "api.models", "write"))
            .await
            .unwrap();

        assert!(!resp.authorized);
        assert!(logs_contain("request denied"));
        assert!(!logs_contain("key-k1"));
    }
}
