//! Planning board and machine schedule through the HTTP API.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use shopfloor_api::entities::{part_number, production_order, schedule_entry};

#[tokio::test]
async fn create_order_starts_available_with_run_length() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-20L", 36).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "part_number_id": part.id,
                "quantity": 500,
                "delivery_date": "2030-02-15"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "Available");
    assert_eq!(body["data"]["quantity_produced"], 0);

    let board = response_json(
        app.request_authenticated(Method::GET, "/api/v1/orders?status=Available", None)
            .await,
    )
    .await;
    let rows = board["data"].as_array().expect("planning rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["part_code"], "CUBO-20L");
    assert_eq!(rows[0]["duration_hours"], 5.0);
}

#[tokio::test]
async fn create_order_rejects_zero_quantity() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-10L", 30).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "part_number_id": part.id,
                "quantity": 0,
                "delivery_date": "2030-02-15"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_rejects_oversized_quantity() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-12L", 30).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "part_number_id": part.id,
                "quantity": 2_000_000,
                "delivery_date": "2030-02-15"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scheduling_a_run_past_the_calendar_is_a_bad_request() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("TAPA-LEGACY", 36).await;
    let machine = app.seed_machine("INY-LEGACY").await;
    let order = app.seed_order(part.id, 10).await;

    // Rows written before the catalog and order bounds existed
    part_number::Entity::update_many()
        .col_expr(part_number::Column::CycleTimeSeconds, Expr::value(i32::MAX))
        .filter(part_number::Column::Id.eq(part.id))
        .exec(&*app.state.db)
        .await
        .expect("widen cycle time");
    production_order::Entity::update_many()
        .col_expr(production_order::Column::Quantity, Expr::value(i32::MAX))
        .filter(production_order::Column::Id.eq(order.id))
        .exec(&*app.state.db)
        .await
        .expect("widen quantity");

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": order.id,
                "machine_id": machine.id,
                "start_date": "2024-03-04",
                "start_hour": 6
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let details = response_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order.id), None)
            .await,
    )
    .await;
    assert_eq!(details["data"]["status"], "Available");
    assert!(details["data"]["schedule"].is_null());
}

#[tokio::test]
async fn scheduling_sets_window_and_plans_order() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("TAPA-90", 36).await;
    let machine = app.seed_machine("INY-01").await;
    let order = app.seed_order(part.id, 500).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": order.id,
                "machine_id": machine.id,
                "start_date": "2024-03-04",
                "start_hour": 8,
                "side": "L"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["start_at"], "2024-03-04T08:00:00Z");
    assert_eq!(body["data"]["end_at"], "2024-03-04T13:00:00Z");
    assert_eq!(body["data"]["side"], "L");

    let details = response_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order.id), None)
            .await,
    )
    .await;
    assert_eq!(details["data"]["status"], "Planned");
    assert_eq!(details["data"]["schedule"]["machine_id"], json!(machine.id));
}

#[tokio::test]
async fn rescheduling_moves_the_existing_entry() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("TAPA-91", 60).await;
    let first = app.seed_machine("INY-02").await;
    let second = app.seed_machine("INY-03").await;
    let order = app.seed_order(part.id, 120).await;

    for (machine_id, hour) in [(first.id, 6), (second.id, 14)] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/schedule",
                Some(json!({
                    "order_id": order.id,
                    "machine_id": machine_id,
                    "start_date": "2024-03-05",
                    "start_hour": hour
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let entries = schedule_entry::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("list entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].machine_id, second.id);
    assert_eq!(entries[0].start_at.to_rfc3339(), "2024-03-05T14:00:00+00:00");
}

#[tokio::test]
async fn schedule_rejects_unknown_order_and_bad_hour() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("TAPA-92", 60).await;
    let machine = app.seed_machine("INY-04").await;
    let order = app.seed_order(part.id, 10).await;

    let missing = app
        .request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": uuid::Uuid::new_v4(),
                "machine_id": machine.id,
                "start_date": "2024-03-05",
                "start_hour": 6
            })),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_hour = app
        .request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": order.id,
                "machine_id": machine.id,
                "start_date": "2024-03-05",
                "start_hour": 24
            })),
        )
        .await;
    assert_eq!(bad_hour.status(), StatusCode::BAD_REQUEST);

    let bad_date = app
        .request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": order.id,
                "machine_id": machine.id,
                "start_date": "05/03/2024",
                "start_hour": 6
            })),
        )
        .await;
    assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);
    let body = response_json(bad_date).await;
    assert!(body["message"]
        .as_str()
        .is_some_and(|message| message.contains("start_date")));
}

#[tokio::test]
async fn unschedule_returns_order_to_available() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("BALDE-5", 20).await;
    let machine = app.seed_machine("INY-05").await;
    let order = app.seed_order(part.id, 90).await;

    app.request_authenticated(
        Method::POST,
        "/api/v1/schedule",
        Some(json!({
            "order_id": order.id,
            "machine_id": machine.id,
            "start_date": "2024-03-06",
            "start_hour": 10
        })),
    )
    .await;

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/schedule/orders/{}", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let details = response_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order.id), None)
            .await,
    )
    .await;
    assert_eq!(details["data"]["status"], "Available");
    assert!(details["data"]["schedule"].is_null());

    let again = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/schedule/orders/{}", order.id),
            None,
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_on_the_floor_cannot_be_moved_or_unscheduled() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("BALDE-6", 20).await;
    let machine = app.seed_machine("INY-06").await;
    let order = app.seed_order(part.id, 90).await;

    let schedule = json!({
        "order_id": order.id,
        "machine_id": machine.id,
        "start_date": "2024-03-06",
        "start_hour": 10
    });
    app.request_authenticated(Method::POST, "/api/v1/schedule", Some(schedule.clone()))
        .await;
    let started = app
        .request_authenticated(
            Method::POST,
            "/api/v1/production/start",
            Some(json!({ "machine_id": machine.id })),
        )
        .await;
    assert_eq!(started.status(), StatusCode::OK);

    let moved = app
        .request_authenticated(Method::POST, "/api/v1/schedule", Some(schedule))
        .await;
    assert_eq!(moved.status(), StatusCode::BAD_REQUEST);

    let removed = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/schedule/orders/{}", order.id),
            None,
        )
        .await;
    assert_eq!(removed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn week_view_reports_local_day_and_hour() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CAJA-1", 72).await;
    let machine = app.seed_machine("INY-07").await;
    let inside = app.seed_order(part.id, 100).await;
    let outside = app.seed_order(part.id, 100).await;

    for (order_id, date) in [(inside.id, "2024-03-06"), (outside.id, "2024-03-11")] {
        app.request_authenticated(
            Method::POST,
            "/api/v1/schedule",
            Some(json!({
                "order_id": order_id,
                "machine_id": machine.id,
                "start_date": date,
                "start_hour": 7
            })),
        )
        .await;
    }

    let response = app
        .request_authenticated(Method::GET, "/api/v1/schedule/week?start_date=2024-03-04", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let items = body["data"].as_array().expect("week items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["order_id"], json!(inside.id));
    assert_eq!(items[0]["day"], 2);
    assert_eq!(items[0]["hour"], 7);
    assert_eq!(items[0]["duration"], 2.0);
}

#[tokio::test]
async fn week_view_requires_start_date() {
    let app = TestApp::new().await;

    let missing = app
        .request_authenticated(Method::GET, "/api/v1/schedule/week", None)
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .request_authenticated(Method::GET, "/api/v1/schedule/week?start_date=next-monday", None)
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn part_number_picker_lists_codes_and_capacity() {
    use rust_decimal_macros::dec;
    use shopfloor_api::{errors::ServiceError, services::catalog::NewPartNumber};

    let app = TestApp::new().await;
    let mut bucket = NewPartNumber::new("CUBO-20.5L", "Bucket 20.5 L", 42);
    bucket.capacity_liters = Some(dec!(20.5));
    app.state
        .services
        .catalog
        .create_part_number(bucket.clone())
        .await
        .expect("register part number");

    let duplicate = app.state.services.catalog.create_part_number(bucket).await;
    assert!(duplicate.is_err());

    let glacial = app
        .state
        .services
        .catalog
        .create_part_number(NewPartNumber::new("CUBO-SLOW", "Bucket slow", 100_000))
        .await;
    assert!(matches!(glacial, Err(ServiceError::ValidationError(_))));

    let response = app
        .request_authenticated(Method::GET, "/api/v1/part-numbers", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let parts = body["data"].as_array().expect("part numbers");
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0]["code"], "CUBO-20.5L");
    assert_eq!(parts[0]["capacity_liters"], "20.5");
}
