use axum::{extract::State, Json};

use crate::{
    errors::ServiceError,
    services::catalog::{LookupType, MachineSummary, PartNumberSummary},
    ApiResponse, ApiResult, AppState,
};

/// List part numbers for the planning board picker
#[utoipa::path(
    get,
    path = "/api/v1/part-numbers",
    responses(
        (status = 200, description = "Part numbers ordered by code", body = [PartNumberSummary]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_part_numbers(State(state): State<AppState>) -> ApiResult<Vec<PartNumberSummary>> {
    let parts = state.services.catalog.list_part_numbers().await?;
    Ok(Json(ApiResponse::success(parts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/machines",
    responses(
        (status = 200, description = "Machines ordered by number", body = [MachineSummary]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_machines(State(state): State<AppState>) -> ApiResult<Vec<MachineSummary>> {
    let machines = state.services.catalog.list_machines().await?;
    Ok(Json(ApiResponse::success(machines)))
}

#[utoipa::path(
    get,
    path = "/api/v1/downtime-types",
    responses(
        (status = 200, description = "Downtime reasons", body = [LookupType]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_downtime_types(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LookupType>>>, ServiceError> {
    let types = state.services.catalog.list_downtime_types().await?;
    Ok(Json(ApiResponse::success(types)))
}

#[utoipa::path(
    get,
    path = "/api/v1/scrap-types",
    responses(
        (status = 200, description = "Scrap reasons", body = [LookupType]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn list_scrap_types(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LookupType>>>, ServiceError> {
    let types = state.services.catalog.list_scrap_types().await?;
    Ok(Json(ApiResponse::success(types)))
}
