//! Integration test for the health check endpoint.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, fixture, get};

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let tmp = fixture();
    let app = build_test_app(&tmp);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "request id must be propagated to the response"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let tmp = fixture();
    let response = get(build_test_app(&tmp), "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
