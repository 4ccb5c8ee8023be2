//! Local (in-process) client for the RBAC module.

use std::sync::Arc;

use async_trait::async_trait;
use rbac_sdk::{
    AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest, AuthorizeWorkerResponse,
    RbacClient, RbacError,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct RbacLocalClient {
    svc: Arc<Service>,
}

impl RbacLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> RbacError {
    tracing::error!(operation = op, error = %e, "rbac call failed");
    e.into()
}

#[async_trait]
impl RbacClient for RbacLocalClient {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, RbacError> {
        self.svc
            .authorize(&request)
            .await
            .map_err(|e| log_and_convert("authorize", e))
    }

    async fn authorize_worker(
        &self,
        request: AuthorizeWorkerRequest,
    ) -> Result<AuthorizeWorkerResponse, RbacError> {
        self.svc
            .authorize_worker(&request)
            .await
            .map_err(|e| log_and_convert("authorize_worker", e))
    }
}
