use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Method, Request, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::requests::domain::RequestKind;
use crate::workflows::requests::request_router;
use crate::workflows::requests::router::{self, CreateRequest};

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn create_handler_returns_the_new_session() {
    let (service, _, _) = build_service();

    let response = router::create_handler::<MemoryRepository, MemoryTransport>(
        State(Arc::new(service)),
        Json(CreateRequest {
            kind: RequestKind::Insolvency,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "insolvency");
    assert_eq!(body["mode"]["mode"], "new");
    assert_eq!(body["gate"]["active"], "debtor");
    assert_eq!(body["gate"]["sections"][0]["status"], "unsaved");
    assert_eq!(body["gate"]["sections"][1]["status_label"], "Locked");
    assert!(body["finance"].is_object());
}

#[tokio::test]
async fn conciliation_sessions_carry_no_finance_block() {
    let app = router_with_service(build_service().0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/requests",
            json!({ "kind": "conciliation" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["gate"]["active"], "parties");
    assert!(body.get("finance").is_none());
}

#[tokio::test]
async fn unknown_section_names_are_not_found() {
    let (service, _, _) = build_service();
    let session = service.create(RequestKind::Insolvency).expect("created");
    let app = router_with_service(service);

    let response = app
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/requests/{}/sections/bogus/save", session.id()),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "unknown section 'bogus'");
}

#[tokio::test]
async fn patching_a_locked_section_conflicts() {
    let (service, _, _) = build_service();
    let session = service.create(RequestKind::Insolvency).expect("created");
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/requests/{}", session.id()),
            json!({ "op": "append_item", "collection": "debts" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("locked")));
}

#[tokio::test]
async fn invalid_saves_return_the_banner_and_the_report() {
    let (service, _, _) = build_service();
    let session = service.create(RequestKind::Insolvency).expect("created");

    let response = router::save_handler::<MemoryRepository, MemoryTransport>(
        State(Arc::new(service)),
        Path((session.id().to_string(), "debtor".to_string())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|banner| banner.starts_with("Debtor: ")));
    assert_eq!(body["report"]["section"], "debtor");
    let errors = body["report"]["errors"].as_array().expect("errors array");
    assert!(errors
        .iter()
        .any(|error| error["path"] == "debtor.contact.email"));
}

#[tokio::test]
async fn completed_requests_submit_through_the_router() {
    let (service, _, transport) = build_service();
    let id = complete_insolvency(&service).await;
    let app = router_with_service(service);

    let response = app
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/requests/{id}/submit"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["action"], "created");
    assert_eq!(body["document_id"], "doc-1");
    assert_eq!(transport.created().len(), 1);
}

#[tokio::test]
async fn attachments_are_uploaded_as_raw_bodies() {
    let (service, _, _) = build_service();
    let id = complete_insolvency(&service).await;
    let app = router_with_service(service);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::PUT)
                .uri(format!("/api/v1/requests/{id}/attachments/payslip.pdf"))
                .header(header::CONTENT_TYPE, "application/pdf")
                .body(Body::from(b"%PDF-1.7".to_vec()))
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["index"], 0);
    assert_eq!(
        body["session"]["document"]["annexes"]["attachments"][0]["file"],
        "payslip.pdf"
    );
}

#[tokio::test]
async fn projection_exports_csv_on_request() {
    let app = router_with_service(build_service().0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/finance/projection?format=csv",
            json!({
                "capital": 1200000.0,
                "term_months": 12,
                "monthly_rate": 2.0,
                "start_date": "2025-07-01",
                "pay_day": 15
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );
    let csv = read_text_body(response).await;
    assert!(csv.starts_with("period,date,balance,principal,interest,payment,new_balance"));
    assert_eq!(csv.lines().count(), 13);
}

#[tokio::test]
async fn projection_accepts_an_annual_rate_only() {
    let app = router_with_service(build_service().0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/finance/projection",
            json!({
                "capital": 1200000.0,
                "term_months": 12,
                "effective_annual_rate": 12.0,
                "start_date": "2025-07-01",
                "pay_day": 15
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["rows"].as_array().map(Vec::len), Some(12));
    assert!(body["installment"].as_f64().is_some_and(|value| value > 100_000.0));
}

#[tokio::test]
async fn rate_conversion_rejects_impossible_rates() {
    let app = router_with_service(build_service().0);

    let converted = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/finance/rates",
            json!({ "value": 12.0, "direction": "annual_to_monthly" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(converted.status(), StatusCode::OK);
    let body = read_json_body(converted).await;
    assert!(body["converted"]
        .as_f64()
        .is_some_and(|value| (value - 0.948_879).abs() < 1e-6));

    let rejected = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/finance/rates",
            json!({ "value": -100.0, "direction": "annual_to_monthly" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn eligibility_endpoint_assesses_a_debt_list() {
    let app = router_with_service(build_service().0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/finance/eligibility",
            json!({
                "debts": [
                    to_value(&current_debt("Banco Andino", 1_000_000.0)),
                    to_value(&overdue_debt("Cooperativa Sur", 500_000.0, 120)),
                ]
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["eligibility"]["eligible"], true);
    assert_eq!(body["totals"]["debt_count"], 2);
}

#[tokio::test]
async fn discarded_sessions_are_gone() {
    let (service, _, _) = build_service();
    let session = service.create(RequestKind::Conciliation).expect("created");
    let app = router_with_service(service);
    let uri = format!("/api/v1/requests/{}", session.id());

    let deleted = app
        .clone()
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let fetched = app
        .oneshot(empty_request(Method::GET, &uri))
        .await
        .expect("router responds");
    assert_eq!(fetched.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repository_outages_are_server_errors() {
    let service = service_with(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryTransport::default()),
    );
    let app = request_router(Arc::new(service));

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/requests",
            json!({ "kind": "insolvency" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "repository unavailable: database offline");
}
