//! Public API trait for the RBAC service.

use async_trait::async_trait;

use crate::error::RbacError;
use crate::models::{
    AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest, AuthorizeWorkerResponse,
};

/// Public API trait for the RBAC decision service.
///
/// Implemented in-process by the `rbac` module and over HTTP by
/// [`crate::HttpRbacClient`]:
///
/// ```ignore
/// let decision = rbac.authorize(request).await?;
/// ```
#[async_trait]
pub trait RbacClient: Send + Sync {
    /// Decide whether a user token may use `capability` on `access_resource`.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` if the identity or policy store is unreachable
    /// - `Internal` for unexpected errors
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, RbacError>;

    /// Decide whether a worker token belongs to a known cluster.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` if the identity store is unreachable
    /// - `Internal` for unexpected errors
    async fn authorize_worker(
        &self,
        request: AuthorizeWorkerRequest,
    ) -> Result<AuthorizeWorkerResponse, RbacError>;
}
