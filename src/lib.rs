//! Shop Floor API Library
//!
//! Production planning and shop-floor tracking for a moulding plant:
//! orders, machine scheduling, production/downtime/scrap reporting and a
//! per-machine OEE dashboard.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service against `db`, publishing domain events on `event_sender`
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(
            db.clone(),
            Some(event_sender.clone()),
            config.plant_offset(),
            services::reports::KpiSettings {
                availability_percent: config.kpi_availability_percent,
                efficiency_ceiling_percent: config.kpi_efficiency_ceiling_percent,
            },
        );

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn validation_errors_carry_messages() {
        let response = ApiResponse::<()>::validation_errors(vec!["quantity".into()]);
        assert!(!response.success);
        assert_eq!(response.errors, Some(vec!["quantity".to_string()]));
        assert!(response.meta.and_then(|m| m.request_id).is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route, gated per permission group
pub fn api_v1_routes() -> Router<AppState> {
    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let planning = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/part-numbers", get(handlers::catalog::list_part_numbers))
        .route("/machines", get(handlers::catalog::list_machines))
        .route("/schedule", post(handlers::scheduling::save_schedule_entry))
        .route(
            "/schedule/orders/:order_id",
            delete(handlers::scheduling::remove_schedule_entry),
        )
        .route("/schedule/week", get(handlers::scheduling::week_schedule))
        .with_permission(perm::PLANNING_VIEW);

    let production = Router::new()
        .route(
            "/production/machines/:id",
            get(handlers::production::machine_panel),
        )
        .route("/production/start", post(handlers::production::start_production))
        .route("/production/report", post(handlers::production::report_production))
        .route(
            "/production/downtimes",
            post(handlers::production::record_downtime),
        )
        .route(
            "/production/downtimes/:id/close",
            post(handlers::production::close_downtime),
        )
        .route("/production/scrap", post(handlers::production::record_scrap))
        .route("/production/finish", post(handlers::production::finish_order))
        .route("/downtime-types", get(handlers::catalog::list_downtime_types))
        .route("/scrap-types", get(handlers::catalog::list_scrap_types))
        .with_permission(perm::PRODUCTION_VIEW);

    let reports = Router::new()
        .route("/reports/kpi", get(handlers::reports::kpi_dashboard))
        .with_permission(perm::REPORTS_VIEW);

    Router::new()
        // Status and health endpoints
        .route("/status", get(handlers::health::api_status))
        .route("/health", get(handlers::health::health_check))
        .merge(orders_create)
        .merge(planning)
        .merge(production)
        .merge(reports)
}

pub mod prelude {
    pub use crate::auth::{AuthService, AuthUser};
    pub use crate::config::AppConfig;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::metrics::*;
    pub use crate::openapi::*;
    pub use crate::services::*;
    pub use crate::tracing::*;
    pub use crate::{api_v1_routes, ApiResponse, ApiResult, AppState};
}
