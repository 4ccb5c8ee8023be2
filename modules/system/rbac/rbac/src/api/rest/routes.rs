use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Extension, Router};
use http::StatusCode;
use rbac_sdk::paths;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::domain::service::Service;
use crate::infra::SyncMetrics;

/// Build the RBAC router.
///
/// Requests running longer than `request_timeout` are dropped, which
/// cancels any lookup still in flight, and answered with 504.
#[must_use]
pub fn router(
    service: Arc<Service>,
    metrics: Arc<SyncMetrics>,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .route(paths::AUTHORIZE, post(handlers::authorize))
        .route(paths::AUTHORIZE_WORKER, post(handlers::authorize_worker))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .layer(Extension(service))
        .layer(Extension(metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
