//! Status codes at the edge of the API: authentication, permissions,
//! unknown routes and unsupported methods.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rstest::rstest;
use serde_json::json;

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;

    let status = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(status.status(), StatusCode::OK);
    let body = response_json(status).await;
    assert_eq!(body["data"]["status"], "ok");

    let health = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[rstest]
#[case(Method::GET, "/api/v1/orders")]
#[case(Method::POST, "/api/v1/orders")]
#[case(Method::GET, "/api/v1/machines")]
#[case(Method::GET, "/api/v1/schedule/week?start_date=2024-03-04")]
#[case(Method::POST, "/api/v1/production/start")]
#[case(Method::GET, "/api/v1/reports/kpi")]
#[tokio::test]
async fn protected_routes_require_a_token(#[case] method: Method, #[case] uri: &str) {
    let app = TestApp::new().await;
    let response = app.request(method, uri, None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn permissions_gate_each_area() {
    let app = TestApp::new().await;
    let planner = app.token(&[], &["planning:view"]);
    let operator = app.token(&[], &["production:view"]);
    let manager = app.token(&[], &["reports:view"]);

    let ok = app
        .request(Method::GET, "/api/v1/orders", None, Some(&planner))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let forbidden = app
        .request(Method::GET, "/api/v1/reports/kpi", None, Some(&planner))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let forbidden = app
        .request(Method::GET, "/api/v1/orders", None, Some(&operator))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let ok = app
        .request(Method::GET, "/api/v1/downtime-types", None, Some(&operator))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let ok = app
        .request(Method::GET, "/api/v1/reports/kpi", None, Some(&manager))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn creating_orders_needs_its_own_permission() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-PERM", 30).await;
    let body = json!({
        "part_number_id": part.id,
        "quantity": 10,
        "delivery_date": "2030-05-01"
    });

    let planner = app.token(&[], &["planning:view"]);
    let denied = app
        .request(Method::POST, "/api/v1/orders", Some(body.clone()), Some(&planner))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let clerk = app.token(&[], &["orders:*"]);
    let created = app
        .request(Method::POST, "/api/v1/orders", Some(body), Some(&clerk))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/warehouses", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");

    let order = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(order.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::PUT, "/api/v1/production/finish", Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/reports/kpi", None)
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/report",
            Some(json!({ "quantity": "many" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
