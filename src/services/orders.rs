use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        part_number,
        production_order::{self, OrderStatus},
        schedule_entry::{self, Side},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::SHOPFLOOR_METRICS,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub part_number_id: Uuid,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be between 1 and 1000000"))]
    pub quantity: i32,
    pub delivery_date: NaiveDate,
}

/// Planning-board row: an order with what the planner needs to place it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanningBoardRow {
    pub id: Uuid,
    pub part_number_id: Uuid,
    pub part_code: String,
    pub description: String,
    pub quantity: i32,
    pub quantity_produced: i32,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleSlot {
    pub schedule_entry_id: Uuid,
    pub machine_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub side: Option<Side>,
    pub real_start: Option<DateTime<Utc>>,
}

impl From<schedule_entry::Model> for ScheduleSlot {
    fn from(entry: schedule_entry::Model) -> Self {
        Self {
            schedule_entry_id: entry.id,
            machine_id: entry.machine_id,
            start_at: entry.start_at,
            end_at: entry.end_at,
            side: entry.side,
            real_start: entry.real_start,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetails {
    pub id: Uuid,
    pub status: OrderStatus,
    pub quantity: i32,
    pub quantity_produced: i32,
    pub remaining_quantity: i32,
    pub delivery_date: NaiveDate,
    pub duration_hours: f64,
    pub part_number_id: Uuid,
    pub part_code: String,
    pub description: String,
    pub client: Option<String>,
    pub capacity_liters: Option<Decimal>,
    pub cycle_time_seconds: i32,
    pub schedule: Option<ScheduleSlot>,
    pub created_at: DateTime<Utc>,
}

/// Service for creating and listing production orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an Available order for an existing part number
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
    ) -> Result<production_order::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db;
        part_number::Entity::find_by_id(input.part_number_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Part number {} not found", input.part_number_id))
            })?;

        let order = production_order::ActiveModel {
            part_number_id: Set(input.part_number_id),
            quantity: Set(input.quantity),
            delivery_date: Set(input.delivery_date),
            quantity_produced: Set(0),
            status: Set(OrderStatus::Available),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.orders_created.inc();
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderCreated {
                order_id: order.id,
                part_number_id: order.part_number_id,
                quantity: order.quantity,
            });
        }

        info!(order_id = %order.id, quantity = order.quantity, "production order created");
        Ok(order)
    }

    /// Orders in any of `statuses` (all orders when empty), soonest delivery first
    #[instrument(skip(self))]
    pub async fn planning_board(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<PlanningBoardRow>, ServiceError> {
        let mut query = production_order::Entity::find()
            .find_also_related(part_number::Entity)
            .order_by_asc(production_order::Column::DeliveryDate)
            .order_by_asc(production_order::Column::CreatedAt);

        if !statuses.is_empty() {
            query = query.filter(production_order::Column::Status.is_in(statuses.iter().copied()));
        }

        let rows = query.all(&*self.db).await.map_err(ServiceError::db_error)?;

        rows.into_iter()
            .map(|(order, part)| {
                let part = part.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Order {} references missing part number {}",
                        order.id, order.part_number_id
                    ))
                })?;
                Ok(PlanningBoardRow {
                    id: order.id,
                    part_number_id: part.id,
                    duration_hours: part.duration_hours(order.quantity),
                    part_code: part.code,
                    description: part.description,
                    quantity: order.quantity,
                    quantity_produced: order.quantity_produced,
                    delivery_date: order.delivery_date,
                    status: order.status,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db;
        let (order, part) = production_order::Entity::find_by_id(order_id)
            .find_also_related(part_number::Entity)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let part = part.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Order {} references missing part number {}",
                order.id, order.part_number_id
            ))
        })?;

        let schedule = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::OrderId.eq(order.id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .map(ScheduleSlot::from);

        Ok(OrderDetails {
            id: order.id,
            status: order.status,
            quantity: order.quantity,
            quantity_produced: order.quantity_produced,
            remaining_quantity: order.remaining_quantity(),
            delivery_date: order.delivery_date,
            duration_hours: part.duration_hours(order.quantity),
            part_number_id: part.id,
            part_code: part.code,
            description: part.description,
            client: part.client,
            capacity_liters: part.capacity_liters,
            cycle_time_seconds: part.cycle_time_seconds,
            schedule,
            created_at: order.created_at,
        })
    }
}

/// Parses a comma separated status filter such as `Available,Planned`
pub fn parse_status_filter(raw: Option<&str>) -> Result<Vec<OrderStatus>, ServiceError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<OrderStatus>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown order status '{}'", part))
            })
        })
        .collect()
}
