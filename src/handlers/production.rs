use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{validate_input, AppJson};
use crate::{
    auth::AuthUser,
    entities::{downtime, production_order::OrderStatus, scrap_report},
    services::{
        plant_time,
        production::{DowntimeInput, MachinePanel, ScrapInput},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartProductionRequest {
    pub machine_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartedEntry {
    pub schedule_entry_id: Uuid,
    pub order_id: Uuid,
    pub real_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReportProductionRequest {
    pub schedule_entry_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be greater than zero"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportProductionResponse {
    pub schedule_entry_id: Uuid,
    pub quantity_produced: i32,
}

/// Times accept RFC 3339 or plant-local `YYYY-MM-DDTHH:MM`
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordDowntimeRequest {
    pub schedule_entry_id: Uuid,
    pub downtime_type_id: Uuid,
    pub start: String,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CloseDowntimeRequest {
    pub end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DowntimeResponse {
    pub id: Uuid,
    pub schedule_entry_id: Uuid,
    pub downtime_type_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub operator: Option<String>,
}

impl From<downtime::Model> for DowntimeResponse {
    fn from(model: downtime::Model) -> Self {
        Self {
            id: model.id,
            schedule_entry_id: model.schedule_entry_id,
            downtime_type_id: model.downtime_type_id,
            started_at: model.started_at,
            ended_at: model.ended_at,
            operator: model.operator,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordScrapRequest {
    pub schedule_entry_id: Uuid,
    pub scrap_type_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be greater than zero"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScrapResponse {
    pub id: Uuid,
    pub schedule_entry_id: Uuid,
    pub scrap_type_id: Uuid,
    pub quantity: i32,
    pub reported_at: DateTime<Utc>,
    pub operator: Option<String>,
}

impl From<scrap_report::Model> for ScrapResponse {
    fn from(model: scrap_report::Model) -> Self {
        Self {
            id: model.id,
            schedule_entry_id: model.schedule_entry_id,
            scrap_type_id: model.scrap_type_id,
            quantity: model.quantity,
            reported_at: model.reported_at,
            operator: model.operator,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FinishOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinishOrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub quantity: i32,
    pub quantity_produced: i32,
    pub closed_downtimes: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/production/machines/{id}",
    params(("id" = Uuid, Path, description = "Machine ID")),
    responses(
        (status = 200, description = "Running and next order for today", body = MachinePanel),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Machine not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn machine_panel(
    State(state): State<AppState>,
    Path(machine_id): Path<Uuid>,
) -> ApiResult<MachinePanel> {
    let panel = state.services.production.machine_panel(machine_id).await?;
    Ok(Json(ApiResponse::success(panel)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/start",
    request_body = StartProductionRequest,
    responses(
        (status = 200, description = "Planned entries on the machine started", body = [StartedEntry]),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Machine not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn start_production(
    State(state): State<AppState>,
    AppJson(payload): AppJson<StartProductionRequest>,
) -> ApiResult<Vec<StartedEntry>> {
    let started = state
        .services
        .production
        .start_machine(payload.machine_id)
        .await?
        .into_iter()
        .map(|entry| StartedEntry {
            schedule_entry_id: entry.id,
            order_id: entry.order_id,
            real_start: entry.real_start,
        })
        .collect();

    Ok(Json(ApiResponse::success(started)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/report",
    request_body = ReportProductionRequest,
    responses(
        (status = 200, description = "Report recorded", body = ReportProductionResponse),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Schedule entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn report_production(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ReportProductionRequest>,
) -> ApiResult<ReportProductionResponse> {
    validate_input(&payload)?;

    let quantity_produced = state
        .services
        .production
        .report_production(payload.schedule_entry_id, payload.quantity, Some(user.operator()))
        .await?;

    Ok(Json(ApiResponse::success(ReportProductionResponse {
        schedule_entry_id: payload.schedule_entry_id,
        quantity_produced,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/downtimes",
    request_body = RecordDowntimeRequest,
    responses(
        (status = 200, description = "Downtime recorded", body = DowntimeResponse),
        (status = 400, description = "End not after start", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry or downtime type not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn record_downtime(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<RecordDowntimeRequest>,
) -> ApiResult<DowntimeResponse> {
    let production = &state.services.production;
    let offset = production.plant_offset();

    let input = DowntimeInput {
        schedule_entry_id: payload.schedule_entry_id,
        downtime_type_id: payload.downtime_type_id,
        started_at: plant_time::parse_timestamp(&payload.start, offset)?,
        ended_at: payload
            .end
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| plant_time::parse_timestamp(raw, offset))
            .transpose()?,
    };

    let downtime = production
        .record_downtime(input, Some(user.operator()))
        .await?;
    Ok(Json(ApiResponse::success(DowntimeResponse::from(downtime))))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/downtimes/{id}/close",
    params(("id" = Uuid, Path, description = "Downtime ID")),
    request_body = CloseDowntimeRequest,
    responses(
        (status = 200, description = "Downtime closed", body = DowntimeResponse),
        (status = 400, description = "Already closed or end not after start", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Downtime not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn close_downtime(
    State(state): State<AppState>,
    Path(downtime_id): Path<Uuid>,
    payload: Option<AppJson<CloseDowntimeRequest>>,
) -> ApiResult<DowntimeResponse> {
    // An empty body closes the downtime now
    let payload = payload.map(|AppJson(body)| body).unwrap_or_default();
    let production = &state.services.production;
    let ended_at = payload
        .end
        .as_deref()
        .map(|raw| plant_time::parse_timestamp(raw, production.plant_offset()))
        .transpose()?;

    let downtime = production.close_downtime(downtime_id, ended_at).await?;
    Ok(Json(ApiResponse::success(DowntimeResponse::from(downtime))))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/scrap",
    request_body = RecordScrapRequest,
    responses(
        (status = 200, description = "Scrap recorded", body = ScrapResponse),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry or scrap type not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn record_scrap(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<RecordScrapRequest>,
) -> ApiResult<ScrapResponse> {
    validate_input(&payload)?;

    let scrap = state
        .services
        .production
        .record_scrap(
            ScrapInput {
                schedule_entry_id: payload.schedule_entry_id,
                scrap_type_id: payload.scrap_type_id,
                quantity: payload.quantity,
            },
            Some(user.operator()),
        )
        .await?;

    Ok(Json(ApiResponse::success(ScrapResponse::from(scrap))))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/finish",
    request_body = FinishOrderRequest,
    responses(
        (status = 200, description = "Order completed", body = FinishOrderResponse),
        (status = 400, description = "Order not in production", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn finish_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<FinishOrderRequest>,
) -> ApiResult<FinishOrderResponse> {
    let outcome = state
        .services
        .production
        .finish_order(payload.order_id)
        .await?;

    Ok(Json(ApiResponse::success(FinishOrderResponse {
        order_id: outcome.order.id,
        status: outcome.order.status,
        quantity: outcome.order.quantity,
        quantity_produced: outcome.order.quantity_produced,
        closed_downtimes: outcome.closed_downtimes,
    })))
}
