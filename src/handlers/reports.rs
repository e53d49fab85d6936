use axum::{extract::State, Json};

use crate::{services::reports::MachineKpi, ApiResponse, ApiResult, AppState};

/// Per-machine availability, efficiency, quality and OEE
#[utoipa::path(
    get,
    path = "/api/v1/reports/kpi",
    responses(
        (status = 200, description = "KPI for every machine", body = [MachineKpi]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn kpi_dashboard(State(state): State<AppState>) -> ApiResult<Vec<MachineKpi>> {
    let dashboard = state.services.reports.kpi_dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}
