use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{Debt, DocumentId, RequestId, RequestKind, SectionKey};
use super::finance::{ProjectionInputs, RateDirection, RatePair};
use super::gate::{GateError, SectionSaveError};
use super::lists::ListError;
use super::repository::{RepositoryError, RequestRepository, SubmissionTransport};
use super::service::{IntakeService, IntakeServiceError};
use super::session::{SectionMutation, SessionError};

/// Router builder exposing the request session and finance endpoints.
pub fn request_router<R, T>(service: Arc<IntakeService<R, T>>) -> Router
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    Router::new()
        .route("/api/v1/requests", post(create_handler::<R, T>))
        .route("/api/v1/requests/hydrate", post(hydrate_handler::<R, T>))
        .route(
            "/api/v1/requests/:request_id",
            get(session_handler::<R, T>)
                .patch(mutate_handler::<R, T>)
                .delete(discard_handler::<R, T>),
        )
        .route(
            "/api/v1/requests/:request_id/sections/:section/select",
            post(select_handler::<R, T>),
        )
        .route(
            "/api/v1/requests/:request_id/sections/:section/save",
            post(save_handler::<R, T>),
        )
        .route(
            "/api/v1/requests/:request_id/attachments/:name",
            put(attachment_handler::<R, T>),
        )
        .route(
            "/api/v1/requests/:request_id/signature/:file_name",
            put(signature_handler::<R, T>),
        )
        .route(
            "/api/v1/requests/:request_id/submit",
            post(submit_handler::<R, T>),
        )
        .route("/api/v1/finance/projection", post(projection_handler::<R, T>))
        .route("/api/v1/finance/rates", post(rates_handler::<R, T>))
        .route("/api/v1/finance/eligibility", post(eligibility_handler::<R, T>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequest {
    pub kind: RequestKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HydrateRequest {
    pub document_id: String,
    pub kind: RequestKind,
    pub document: serde_json::Value,
}

pub(crate) async fn create_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Json(body): Json<CreateRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.create(body.kind) {
        Ok(session) => (StatusCode::CREATED, Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn hydrate_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Json(body): Json<HydrateRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.hydrate(DocumentId(body.document_id), body.kind, body.document) {
        Ok(session) => (StatusCode::CREATED, Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn session_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.get(&RequestId(request_id)) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mutate_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path(request_id): Path<String>,
    Json(mutation): Json<SectionMutation>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.apply(&RequestId(request_id), mutation) {
        Ok((session, outcome)) => (
            StatusCode::OK,
            Json(json!({
                "outcome": outcome,
                "session": session.view(),
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn discard_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.discard(&RequestId(request_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn select_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path((request_id, section)): Path<(String, String)>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    let section = match SectionKey::from_str(&section) {
        Ok(section) => section,
        Err(message) => return json_error(StatusCode::NOT_FOUND, message),
    };

    match service.select_section(&RequestId(request_id), section) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn save_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path((request_id, section)): Path<(String, String)>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    let section = match SectionKey::from_str(&section) {
        Ok(section) => section,
        Err(message) => return json_error(StatusCode::NOT_FOUND, message),
    };

    match service.save_section(&RequestId(request_id), section).await {
        Ok((session, outcome)) => (
            StatusCode::OK,
            Json(json!({
                "outcome": outcome,
                "session": session.view(),
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub(crate) async fn attachment_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path((request_id, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.attach_file(
        &RequestId(request_id),
        &name,
        content_type(&headers),
        body.to_vec(),
    ) {
        Ok((session, index)) => (
            StatusCode::OK,
            Json(json!({
                "index": index,
                "session": session.view(),
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn signature_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path((request_id, file_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.upload_signature(
        &RequestId(request_id),
        &file_name,
        content_type(&headers),
        body.to_vec(),
    ) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.submit(&RequestId(request_id)) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectionRequest {
    pub capital: f64,
    pub term_months: u32,
    #[serde(default)]
    pub monthly_rate: Option<f64>,
    #[serde(default)]
    pub effective_annual_rate: Option<f64>,
    pub start_date: NaiveDate,
    pub pay_day: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

pub(crate) async fn projection_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Query(query): Query<ExportQuery>,
    Json(body): Json<ProjectionRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    let rates = RatePair {
        effective_annual: body.effective_annual_rate,
        monthly: body.monthly_rate,
    };
    let inputs = ProjectionInputs {
        capital: Some(body.capital),
        term_months: Some(body.term_months),
        monthly_rate_pct: rates.monthly_rate(),
        start_date: Some(body.start_date),
        pay_day: Some(body.pay_day),
    };
    let projection = service.calculator().projection(&inputs);

    let wants_csv = query
        .format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case("csv"));
    if wants_csv {
        return match projection.to_csv() {
            Ok(csv) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                csv,
            )
                .into_response(),
            Err(error) => json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };
    }

    let payload = json!({
        "installment": projection.installment(),
        "total_principal": projection.total_principal(),
        "total_interest": projection.total_interest(),
        "rows": projection.rows,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateRequest {
    pub value: f64,
    pub direction: RateDirection,
}

pub(crate) async fn rates_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Json(body): Json<RateRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    match service.calculator().convert_rate(body.value, body.direction) {
        Ok(converted) => (
            StatusCode::OK,
            Json(json!({
                "value": body.value,
                "direction": body.direction,
                "converted": converted,
            })),
        )
            .into_response(),
        Err(error) => json_error(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EligibilityRequest {
    pub debts: Vec<Debt>,
}

pub(crate) async fn eligibility_handler<R, T>(
    State(service): State<Arc<IntakeService<R, T>>>,
    Json(body): Json<EligibilityRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    let assessment = service.calculator().assess(&body.debts);
    (StatusCode::OK, Json(assessment)).into_response()
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, Json(payload)).into_response()
}

fn gate_status(error: &GateError) -> StatusCode {
    match error {
        GateError::Locked(_) => StatusCode::CONFLICT,
        GateError::UnknownSection(_) | GateError::OutOfRange(_) => StatusCode::NOT_FOUND,
    }
}

pub(crate) fn error_response(error: IntakeServiceError) -> Response {
    let status = match &error {
        IntakeServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        IntakeServiceError::Repository(RepositoryError::Conflict)
        | IntakeServiceError::SaveInFlight
        | IntakeServiceError::NotReady => StatusCode::CONFLICT,
        IntakeServiceError::Cancelled => StatusCode::GONE,
        IntakeServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
        IntakeServiceError::Session(SessionError::Gate(gate))
        | IntakeServiceError::Save(SectionSaveError::Gate(gate)) => gate_status(gate),
        IntakeServiceError::Session(SessionError::List(ListError::DuplicateName(_))) => {
            StatusCode::CONFLICT
        }
        IntakeServiceError::Session(SessionError::List(ListError::IndexOutOfRange { .. })) => {
            StatusCode::NOT_FOUND
        }
        IntakeServiceError::Session(_) | IntakeServiceError::Save(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        IntakeServiceError::Repository(RepositoryError::Unavailable(_))
        | IntakeServiceError::Assembly(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match &error {
        IntakeServiceError::Save(
            SectionSaveError::Invalid { banner, report }
            | SectionSaveError::Unattributed { banner, report },
        ) => json!({
            "error": banner,
            "report": report,
        }),
        other => json!({
            "error": other.to_string(),
        }),
    };
    (status, Json(payload)).into_response()
}
