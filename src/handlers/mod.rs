pub mod catalog;
pub mod common;
pub mod health;
pub mod orders;
pub mod production;
pub mod reports;
pub mod scheduling;

use chrono::FixedOffset;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;
use crate::services::{
    catalog::CatalogService, orders::OrderService, production::ProductionService,
    reports::{KpiSettings, ReportService}, scheduling::SchedulingService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub scheduling: Arc<SchedulingService>,
    pub production: Arc<ProductionService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        plant_offset: FixedOffset,
        kpi: KpiSettings,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            scheduling: Arc::new(SchedulingService::new(
                db.clone(),
                event_sender.clone(),
                plant_offset,
            )),
            production: Arc::new(ProductionService::new(
                db.clone(),
                event_sender,
                plant_offset,
            )),
            reports: Arc::new(ReportService::new(db, kpi)),
        }
    }
}
