use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shop Floor API",
        version = "0.1.0",
        description = r#"
# Shop Floor Operations API

Production planning and shop-floor tracking for a moulding plant.

## Features

- **Planning board**: production orders, part numbers and machines
- **Scheduling**: place orders on machine time windows, weekly grid
- **Shop floor**: start, output reports, downtimes, scrap, finish
- **Reports**: per-machine quality, efficiency, availability and OEE

## Authentication

Every `/api/v1` endpoint except `/status` and `/health` requires a bearer
token issued by the plant identity provider:

```
Authorization: Bearer <your-jwt-token>
```

Routes are gated on `orders:create`, `planning:view`, `production:view` and
`reports:view`. Users with the `admin` role pass every check.

## Plant time

`start_date`/`start_hour` and bare downtime timestamps are plant-local
wall-clock values; responses carry UTC instants.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Production orders and planning board"),
        (name = "catalog", description = "Part numbers, machines and reason codes"),
        (name = "scheduling", description = "Machine schedule"),
        (name = "production", description = "Shop-floor tracking"),
        (name = "reports", description = "KPI dashboard"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Catalog
        crate::handlers::catalog::list_part_numbers,
        crate::handlers::catalog::list_machines,
        crate::handlers::catalog::list_downtime_types,
        crate::handlers::catalog::list_scrap_types,

        // Scheduling
        crate::handlers::scheduling::save_schedule_entry,
        crate::handlers::scheduling::remove_schedule_entry,
        crate::handlers::scheduling::week_schedule,

        // Production
        crate::handlers::production::machine_panel,
        crate::handlers::production::start_production,
        crate::handlers::production::report_production,
        crate::handlers::production::record_downtime,
        crate::handlers::production::close_downtime,
        crate::handlers::production::record_scrap,
        crate::handlers::production::finish_order,

        // Reports
        crate::handlers::reports::kpi_dashboard,

        // Health
        crate::handlers::health::api_status,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            // Order types
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::OrderResponse,
            crate::entities::production_order::OrderStatus,
            crate::services::orders::PlanningBoardRow,
            crate::services::orders::OrderDetails,
            crate::services::orders::ScheduleSlot,

            // Catalog types
            crate::services::catalog::PartNumberSummary,
            crate::services::catalog::MachineSummary,
            crate::services::catalog::LookupType,

            // Scheduling types
            crate::entities::schedule_entry::Side,
            crate::handlers::scheduling::SaveScheduleEntryRequest,
            crate::handlers::scheduling::ScheduleEntryResponse,
            crate::services::scheduling::WeekScheduleItem,

            // Production types
            crate::services::production::MachinePanel,
            crate::services::production::PanelEntry,
            crate::handlers::production::StartProductionRequest,
            crate::handlers::production::StartedEntry,
            crate::handlers::production::ReportProductionRequest,
            crate::handlers::production::ReportProductionResponse,
            crate::handlers::production::RecordDowntimeRequest,
            crate::handlers::production::CloseDowntimeRequest,
            crate::handlers::production::DowntimeResponse,
            crate::handlers::production::RecordScrapRequest,
            crate::handlers::production::ScrapResponse,
            crate::handlers::production::FinishOrderRequest,
            crate::handlers::production::FinishOrderResponse,

            // Report types
            crate::services::reports::MachineKpi,

            // Health types
            crate::handlers::health::StatusResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    security(("bearer_auth" = []))
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_shop_floor_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Shop Floor API"));
        assert!(json.contains("/api/v1/schedule/week"));
        assert!(json.contains("/api/v1/production/downtimes/{id}/close"));
        assert!(json.contains("bearer_auth"));
    }
}
