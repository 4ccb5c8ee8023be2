use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use rbac_sdk::{AuthorizeRequest, AuthorizeResponse, AuthorizeWorkerRequest, AuthorizeWorkerResponse};
use serde::Serialize;
use time::OffsetDateTime;

use super::error::Problem;
use crate::domain::service::Service;
use crate::infra::SyncMetrics;

/// `Authorize` RPC.
#[tracing::instrument(skip_all)]
pub async fn authorize(
    Extension(svc): Extension<Arc<Service>>,
    payload: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<Json<AuthorizeResponse>, Problem> {
    let Json(request) = payload?;
    Ok(Json(svc.authorize(&request).await?))
}

/// `AuthorizeWorker` RPC.
#[tracing::instrument(skip_all)]
pub async fn authorize_worker(
    Extension(svc): Extension<Arc<Service>>,
    payload: Result<Json<AuthorizeWorkerRequest>, JsonRejection>,
) -> Result<Json<AuthorizeWorkerResponse>, Problem> {
    let Json(request) = payload?;
    Ok(Json(svc.authorize_worker(&request).await?))
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Readiness {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_age_seconds: Option<i64>,
}

/// Ready once the directory has been synchronised at least once.
pub async fn readyz(Extension(svc): Extension<Arc<Service>>) -> Response {
    match svc.directory().last_synced_at() {
        Some(at) => {
            let age = (OffsetDateTime::now_utc() - at).whole_seconds().max(0);
            Json(Readiness {
                ready: true,
                last_sync_age_seconds: Some(age),
            })
            .into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Readiness {
                ready: false,
                last_sync_age_seconds: None,
            }),
        )
            .into_response(),
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics(Extension(metrics): Extension<Arc<SyncMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "failed to encode metrics",
            )
            .into_response()
        }
    }
}
