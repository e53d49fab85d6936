use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, validate_input, AppJson};
use crate::{
    entities::production_order::{self, OrderStatus},
    errors::ServiceError,
    services::orders::{parse_status_filter, CreateOrderInput, OrderDetails, PlanningBoardRow},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub part_number_id: Uuid,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be between 1 and 1000000"))]
    pub quantity: i32,
    /// Delivery date, `YYYY-MM-DD`
    pub delivery_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub part_number_id: Uuid,
    pub quantity: i32,
    pub quantity_produced: i32,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
}

impl From<production_order::Model> for OrderResponse {
    fn from(order: production_order::Model) -> Self {
        Self {
            id: order.id,
            part_number_id: order.part_number_id,
            quantity: order.quantity,
            quantity_produced: order.quantity_produced,
            delivery_date: order.delivery_date,
            status: order.status,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderFilters {
    /// Comma separated statuses, e.g. `Available,Planned`
    pub status: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Part number not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .create_order(CreateOrderInput {
            part_number_id: payload.part_number_id,
            quantity: payload.quantity,
            delivery_date: payload.delivery_date,
        })
        .await?;

    Ok(created_response(OrderResponse::from(order)))
}

/// Planning board: orders filtered by status, soonest delivery first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderFilters),
    responses(
        (status = 200, description = "Planning board rows", body = [PlanningBoardRow]),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filters): Query<OrderFilters>,
) -> ApiResult<Vec<PlanningBoardRow>> {
    let statuses = parse_status_filter(filters.status.as_deref())?;
    let rows = state.services.orders.planning_board(&statuses).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = OrderDetails),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    let details = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(details)))
}
