//! OEE dashboard computed from the shop-floor event log.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{response_json, TestApp};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use shopfloor_api::{
    entities::schedule_entry,
    services::production::{DowntimeInput, ScrapInput},
};

#[tokio::test]
async fn idle_machines_report_zeros() {
    let app = TestApp::new().await;
    app.seed_machine("INY-IDLE").await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/reports/kpi", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let machines = body["data"].as_array().expect("machines");
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0]["machine_number"], "INY-IDLE");
    assert_eq!(machines[0]["active_orders"], 0);
    assert_eq!(machines[0]["oee"], 0.0);
    assert_eq!(machines[0]["quality"], 0.0);
}

#[tokio::test]
async fn running_machine_combines_efficiency_and_quality() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-OEE", 36).await;
    let machine = app.seed_machine("INY-OEE").await;
    let order = app.seed_order(part.id, 1000).await;
    let (downtime_type, scrap_type) = app.seed_lookups().await;

    app.request_authenticated(
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
    app.request_authenticated(
        Method::POST,
        "/api/v1/production/start",
        Some(json!({ "machine_id": machine.id })),
    )
    .await;

    let entry = schedule_entry::Entity::find()
        .filter(schedule_entry::Column::OrderId.eq(order.id))
        .one(&*app.state.db)
        .await
        .expect("query entry")
        .expect("entry exists");
    let real_start = entry.real_start.expect("entry started");

    let production = &app.state.services.production;
    production
        .report_production(entry.id, 90, Some("line-operator".into()))
        .await
        .expect("report");
    production
        .record_scrap(
            ScrapInput {
                schedule_entry_id: entry.id,
                scrap_type_id: scrap_type.id,
                quantity: 10,
            },
            None,
        )
        .await
        .expect("scrap");
    // A closed 30 minute stop leaves 90 minutes of run time out of two hours
    production
        .record_downtime(
            DowntimeInput {
                schedule_entry_id: entry.id,
                downtime_type_id: downtime_type.id,
                started_at: real_start + Duration::minutes(10),
                ended_at: Some(real_start + Duration::minutes(40)),
            },
            None,
        )
        .await
        .expect("downtime");

    // 90 minutes at 36 s per piece allows 150 pieces; 100 were moulded
    let dashboard = app
        .state
        .services
        .reports
        .kpi_dashboard_at(real_start + Duration::hours(2))
        .await
        .expect("dashboard");
    assert_eq!(dashboard.len(), 1);

    let kpi = &dashboard[0];
    assert_eq!(kpi.active_orders, 1);
    assert_eq!(kpi.good_quantity, 90);
    assert_eq!(kpi.scrap_quantity, 10);
    assert_eq!(kpi.availability, 100.0);
    assert_eq!(kpi.quality, 90.0);
    assert_eq!(kpi.efficiency, 66.67);
    assert_eq!(kpi.oee, 60.0);
}

#[tokio::test]
async fn completed_orders_leave_the_dashboard() {
    let app = TestApp::new().await;
    let part = app.seed_part_number("CUBO-DONE", 36).await;
    let machine = app.seed_machine("INY-DONE").await;
    let order = app.seed_order(part.id, 10).await;
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    app.request_authenticated(
        Method::POST,
        "/api/v1/schedule",
        Some(json!({
            "order_id": order.id,
            "machine_id": machine.id,
            "start_date": today,
            "start_hour": 0
        })),
    )
    .await;
    app.request_authenticated(
        Method::POST,
        "/api/v1/production/start",
        Some(json!({ "machine_id": machine.id })),
    )
    .await;

    let running = app.state.services.reports.kpi_dashboard().await.unwrap();
    assert_eq!(running[0].active_orders, 1);

    app.request_authenticated(
        Method::POST,
        "/api/v1/production/finish",
        Some(json!({ "order_id": order.id })),
    )
    .await;

    let after = app.state.services.reports.kpi_dashboard().await.unwrap();
    assert_eq!(after[0].active_orders, 0);
    assert_eq!(after[0].oee, 0.0);
}
