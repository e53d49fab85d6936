use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{validate_input, AppJson};
use crate::{
    entities::schedule_entry::{self, Side},
    errors::ServiceError,
    services::{
        plant_time,
        scheduling::{ScheduleRequest, WeekScheduleItem},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SaveScheduleEntryRequest {
    pub order_id: Uuid,
    pub machine_id: Uuid,
    /// Plant-local start date, `YYYY-MM-DD`
    pub start_date: NaiveDate,
    /// Plant-local start hour
    #[validate(range(max = 23, message = "start_hour must be between 0 and 23"))]
    pub start_hour: u32,
    pub side: Option<Side>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleEntryResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub machine_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub side: Option<Side>,
    pub duration_hours: f64,
}

impl From<schedule_entry::Model> for ScheduleEntryResponse {
    fn from(entry: schedule_entry::Model) -> Self {
        Self {
            duration_hours: entry.duration_hours(),
            id: entry.id,
            order_id: entry.order_id,
            machine_id: entry.machine_id,
            start_at: entry.start_at,
            end_at: entry.end_at,
            side: entry.side,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct WeekQuery {
    /// First day of the week, `YYYY-MM-DD`
    pub start_date: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/schedule",
    request_body = SaveScheduleEntryRequest,
    responses(
        (status = 200, description = "Schedule entry created or moved", body = ScheduleEntryResponse),
        (status = 400, description = "Invalid request or order already on the floor", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or machine not found", body = crate::errors::ErrorResponse)
    ),
    tag = "scheduling"
)]
pub async fn save_schedule_entry(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SaveScheduleEntryRequest>,
) -> ApiResult<ScheduleEntryResponse> {
    validate_input(&payload)?;

    let entry = state
        .services
        .scheduling
        .save_entry(ScheduleRequest {
            order_id: payload.order_id,
            machine_id: payload.machine_id,
            start_date: payload.start_date,
            start_hour: payload.start_hour,
            side: payload.side,
        })
        .await?;

    Ok(Json(ApiResponse::success(ScheduleEntryResponse::from(entry))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/schedule/orders/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order whose entry is removed")),
    responses(
        (status = 200, description = "Entry removed, order back to Available"),
        (status = 400, description = "Order already on the floor", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "No entry for this order", body = crate::errors::ErrorResponse)
    ),
    tag = "scheduling"
)]
pub async fn remove_schedule_entry(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.scheduling.remove_entry(order_id).await?;
    Ok(Json(ApiResponse::success(order_id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/schedule/week",
    params(WeekQuery),
    responses(
        (status = 200, description = "Entries starting in the week", body = [WeekScheduleItem]),
        (status = 400, description = "Missing or invalid start_date", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "scheduling"
)]
pub async fn week_schedule(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<ApiResponse<Vec<WeekScheduleItem>>>, ServiceError> {
    let raw = query
        .start_date
        .ok_or_else(|| ServiceError::ValidationError("start_date is required".to_string()))?;
    let start_date = plant_time::parse_date(&raw, "start_date")?;

    let items = state.services.scheduling.week(start_date).await?;
    Ok(Json(ApiResponse::success(items)))
}
