use crate::infra::AppState;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use legal_intake::workflows::requests::{
    request_router, IntakeService, ReferenceOption, RequestRepository, SubmissionTransport,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocationQuery {
    /// Country or region whose children are requested; absent lists the countries.
    #[serde(default)]
    pub(crate) parent: Option<String>,
}

pub(crate) fn with_intake_routes<R, T>(service: Arc<IntakeService<R, T>>) -> axum::Router
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    request_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/locations", axum::routing::get(locations_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn locations_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<LocationQuery>,
) -> Json<Vec<ReferenceOption>> {
    let parent = query.parent.unwrap_or_default();
    Json(state.reference.lookup(parent.trim()))
}
