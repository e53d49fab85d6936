use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        machine, part_number,
        production_order::{self, OrderStatus},
        schedule_entry::{self, Side},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::SHOPFLOOR_METRICS,
    services::plant_time,
};

/// Placement request from the planning board
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScheduleRequest {
    pub order_id: Uuid,
    pub machine_id: Uuid,
    pub start_date: NaiveDate,
    pub start_hour: u32,
    pub side: Option<Side>,
}

/// One block of the weekly planning grid
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeekScheduleItem {
    pub order_id: Uuid,
    pub machine_id: Uuid,
    /// Plant-local weekday, 0 = Monday
    pub day: u32,
    /// Plant-local hour the block starts at
    pub hour: u32,
    /// Block length in hours
    pub duration: f64,
}

/// Converts a run length in hours to a chrono duration, millisecond precision.
/// `None` when the length does not fit a `Duration`.
pub fn hours_to_duration(hours: f64) -> Option<Duration> {
    Duration::try_milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Places orders on machine time windows and maintains the weekly grid.
///
/// Entries are keyed by order: scheduling an order again moves its existing
/// entry. Overlapping entries on a machine are allowed.
#[derive(Clone)]
pub struct SchedulingService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    plant_offset: FixedOffset,
}

impl SchedulingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        plant_offset: FixedOffset,
    ) -> Self {
        Self {
            db,
            event_sender,
            plant_offset,
        }
    }

    /// Upserts the schedule entry for an order and marks the order Planned
    #[instrument(skip(self))]
    pub async fn save_entry(
        &self,
        request: ScheduleRequest,
    ) -> Result<schedule_entry::Model, ServiceError> {
        let start_at =
            plant_time::local_hour_to_utc(request.start_date, request.start_hour, self.plant_offset)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = production_order::Entity::find_by_id(request.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", request.order_id)))?;

        machine::Entity::find_by_id(request.machine_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Machine {} not found", request.machine_id))
            })?;

        if !order.status.is_schedulable() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {} and can no longer be scheduled",
                order.id, order.status
            )));
        }

        let part = order
            .find_related(part_number::Entity)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Part number {} not found", order.part_number_id))
            })?;

        let end_at = scheduled_end(start_at, order.quantity, part.cycle_time_seconds)?;

        let existing = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::OrderId.eq(order.id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let entry = match existing {
            Some(entry) => {
                let mut active: schedule_entry::ActiveModel = entry.into();
                active.machine_id = Set(request.machine_id);
                active.start_at = Set(start_at);
                active.end_at = Set(end_at);
                active.side = Set(request.side);
                active.update(&txn).await.map_err(ServiceError::db_error)?
            }
            None => schedule_entry::ActiveModel {
                order_id: Set(order.id),
                machine_id: Set(request.machine_id),
                start_at: Set(start_at),
                end_at: Set(end_at),
                side: Set(request.side),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?,
        };

        if order.status != OrderStatus::Planned {
            let mut order: production_order::ActiveModel = order.into();
            order.status = Set(OrderStatus::Planned);
            order.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.orders_scheduled.inc();
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderScheduled {
                order_id: entry.order_id,
                machine_id: entry.machine_id,
                start_at: entry.start_at,
                end_at: entry.end_at,
            });
        }

        info!(
            order_id = %entry.order_id,
            machine_id = %entry.machine_id,
            start_at = %entry.start_at,
            "order scheduled"
        );
        Ok(entry)
    }

    /// Deletes an order's schedule entry and returns the order to Available
    #[instrument(skip(self))]
    pub async fn remove_entry(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let entry = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No schedule entry for order {}", order_id))
            })?;

        let order = production_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.status.is_schedulable() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {} and cannot be unscheduled",
                order.id, order.status
            )));
        }

        let mut order: production_order::ActiveModel = order.into();
        order.status = Set(OrderStatus::Available);
        order.update(&txn).await.map_err(ServiceError::db_error)?;

        entry.delete(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.orders_unscheduled.inc();
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderUnscheduled { order_id });
        }

        info!(%order_id, "order unscheduled");
        Ok(())
    }

    /// Entries whose plant-local start falls within the seven days from `start_date`
    #[instrument(skip(self))]
    pub async fn week(&self, start_date: NaiveDate) -> Result<Vec<WeekScheduleItem>, ServiceError> {
        let (from, to) = plant_time::local_days_bounds(start_date, 7, self.plant_offset)?;

        let entries = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::StartAt.gte(from))
            .filter(schedule_entry::Column::StartAt.lt(to))
            .order_by_asc(schedule_entry::Column::StartAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(entries
            .into_iter()
            .map(|entry| week_item(&entry, self.plant_offset))
            .collect())
    }
}

fn week_item(entry: &schedule_entry::Model, offset: FixedOffset) -> WeekScheduleItem {
    let (day, hour) = plant_time::weekday_and_hour(entry.start_at, offset);
    WeekScheduleItem {
        order_id: entry.order_id,
        machine_id: entry.machine_id,
        day,
        hour,
        duration: entry.duration_hours(),
    }
}

/// End of a run of `quantity` pieces starting at `start`
pub fn scheduled_end(
    start: DateTime<Utc>,
    quantity: i32,
    cycle_time_seconds: i32,
) -> Result<DateTime<Utc>, ServiceError> {
    hours_to_duration(part_number::duration_hours(quantity, cycle_time_seconds))
        .and_then(|run| start.checked_add_signed(run))
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "A run of {} pieces at {} s per cycle does not fit the calendar",
                quantity, cycle_time_seconds
            ))
        })
}
