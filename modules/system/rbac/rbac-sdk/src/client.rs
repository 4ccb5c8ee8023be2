//! HTTP client for the RBAC wire surface.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::RbacClient;
use crate::error::RbacError;
use crate::models::{
    AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest, AuthorizeWorkerResponse, paths,
};

/// [`RbacClient`] that talks to a remote `rbac-server`.
#[derive(Debug, Clone)]
pub struct HttpRbacClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRbacClient {
    /// Create a client for the server at `base_url` (e.g. `http://rbac:8082`).
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RbacError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RbacError::Internal(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RbacError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let resp = self.http.post(&url).json(body).send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "rbac request failed");
            RbacError::ServiceUnavailable(e.to_string())
        })?;

        match resp.status() {
            StatusCode::OK => resp
                .json::<Resp>()
                .await
                .map_err(|e| RbacError::Internal(format!("invalid rbac response: {e}"))),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => Err(
                RbacError::ServiceUnavailable(format!("rbac server returned {}", resp.status())),
            ),
            status => Err(RbacError::Internal(format!(
                "rbac server returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl RbacClient for HttpRbacClient {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, RbacError> {
        self.post(paths::AUTHORIZE, &request).await
    }

    async fn authorize_worker(
        &self,
        request: AuthorizeWorkerRequest,
    ) -> Result<AuthorizeWorkerResponse, RbacError> {
        self.post(paths::AUTHORIZE_WORKER, &request).await
    }
}
