//! HTTP surface checks that never reach the store.

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::{TestRequest, TestServer};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use swasthya_connections::router::build_router;
use swasthya_connections::state::AppState;
use swasthya_core::middleware::REQUEST_ID_HEADER;
use swasthya_testing::auth::MockAuth;

fn server() -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        store_timeout: Duration::from_millis(200),
    };
    TestServer::new(build_router(state)).unwrap()
}

fn as_caller(mut request: TestRequest, auth: &MockAuth) -> TestRequest {
    for (name, value) in auth.headers().iter() {
        request = request.add_header(name.clone(), value.clone());
    }
    request
}

#[tokio::test]
async fn should_answer_liveness_probe() {
    let response = server().get("/healthz").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn should_report_not_ready_without_database() {
    let response = server().get("/readyz").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn should_tag_every_response_with_request_id() {
    let response = server().get("/healthz").await;
    let request_id = response.header(REQUEST_ID_HEADER);
    assert!(
        uuid::Uuid::parse_str(request_id.to_str().unwrap()).is_ok(),
        "generated request id should be a uuid"
    );
}

#[tokio::test]
async fn should_keep_caller_supplied_request_id() {
    let response = server()
        .get("/healthz")
        .add_header(REQUEST_ID_HEADER, "trace-me-123")
        .await;
    assert_eq!(response.header(REQUEST_ID_HEADER), "trace-me-123");
}

#[tokio::test]
async fn should_return_401_without_identity_headers() {
    let response = server()
        .post("/connections/requests")
        .json(&json!({ "patient_id": uuid::Uuid::now_v7(), "connection_method": "otp" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_return_401_for_malformed_account_id() {
    let response = server()
        .get("/notifications")
        .add_header("x-swasthya-account-id", "not-a-uuid")
        .add_header("x-swasthya-account-role", "patient")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_refuse_connection_request_from_patient() {
    let server = server();
    let request = server
        .post("/connections/requests")
        .json(&json!({ "patient_id": uuid::Uuid::now_v7(), "connection_method": "otp" }));
    let response = as_caller(request, &MockAuth::patient()).await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "UNAUTHORIZED");
}

#[tokio::test]
async fn should_reject_unknown_notification_sort() {
    let server = server();
    let request = server.get("/notifications?sort-by=priority");
    let response = as_caller(request, &MockAuth::patient()).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn should_reject_malformed_request_id_in_path() {
    let server = server();
    let request = server.post("/connections/requests/not-a-uuid/accept");
    let response = as_caller(request, &MockAuth::patient()).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
