use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        downtime, downtime_type, machine, part_number,
        production_order::{self, OrderStatus},
        production_report, schedule_entry, scrap_report, scrap_type,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::SHOPFLOOR_METRICS,
    services::plant_time,
};

/// What the operator panel shows for one schedule entry
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PanelEntry {
    pub schedule_entry_id: Uuid,
    pub order_id: Uuid,
    pub part_code: String,
    pub description: String,
    pub capacity_liters: Option<Decimal>,
    pub cycle_time_seconds: i32,
    pub min_weight_kg: Option<Decimal>,
    pub max_weight_kg: Option<Decimal>,
    pub sold_weight_kg: Option<Decimal>,
    pub quantity: i32,
    pub quantity_produced: i32,
    pub status: OrderStatus,
}

impl PanelEntry {
    fn new(
        entry: &schedule_entry::Model,
        order: &production_order::Model,
        part: part_number::Model,
    ) -> Self {
        Self {
            schedule_entry_id: entry.id,
            order_id: order.id,
            part_code: part.code,
            description: part.description,
            capacity_liters: part.capacity_liters,
            cycle_time_seconds: part.cycle_time_seconds,
            min_weight_kg: part.min_weight_kg,
            max_weight_kg: part.max_weight_kg,
            sold_weight_kg: part.sold_weight_kg,
            quantity: order.quantity,
            quantity_produced: order.quantity_produced,
            status: order.status,
        }
    }
}

/// Today's running order and the next planned one on a machine
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MachinePanel {
    pub in_production: Option<PanelEntry>,
    pub next: Option<PanelEntry>,
}

#[derive(Debug, Clone)]
pub struct DowntimeInput {
    pub schedule_entry_id: Uuid,
    pub downtime_type_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ScrapInput {
    pub schedule_entry_id: Uuid,
    pub scrap_type_id: Uuid,
    pub quantity: i32,
}

/// Result of closing out an order
#[derive(Debug, Clone)]
pub struct FinishOutcome {
    pub order: production_order::Model,
    pub closed_downtimes: u64,
}

/// Shop-floor tracking: start, output and scrap reports, downtimes, finish
#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    plant_offset: FixedOffset,
}

impl ProductionService {
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

    pub fn plant_offset(&self) -> FixedOffset {
        self.plant_offset
    }

    /// First InProduction and first Planned entry among today's entries on a machine
    #[instrument(skip(self))]
    pub async fn machine_panel(&self, machine_id: Uuid) -> Result<MachinePanel, ServiceError> {
        let db = &*self.db;
        self.require_machine(machine_id).await?;

        let today = plant_time::local_today(Utc::now(), self.plant_offset);
        let (from, to) = plant_time::local_day_bounds(today, self.plant_offset)?;

        let entries = schedule_entry::Entity::find()
            .find_also_related(production_order::Entity)
            .filter(schedule_entry::Column::MachineId.eq(machine_id))
            .filter(schedule_entry::Column::StartAt.gte(from))
            .filter(schedule_entry::Column::StartAt.lt(to))
            .order_by_asc(schedule_entry::Column::StartAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let first_with = |status: OrderStatus| {
            entries.iter().find_map(|(entry, order)| match order {
                Some(order) if order.status == status => Some((entry, order)),
                _ => None,
            })
        };

        let mut panel = MachinePanel {
            in_production: None,
            next: None,
        };
        if let Some((entry, order)) = first_with(OrderStatus::InProduction) {
            panel.in_production = Some(self.panel_entry(entry, order).await?);
        }
        if let Some((entry, order)) = first_with(OrderStatus::Planned) {
            panel.next = Some(self.panel_entry(entry, order).await?);
        }

        Ok(panel)
    }

    async fn panel_entry(
        &self,
        entry: &schedule_entry::Model,
        order: &production_order::Model,
    ) -> Result<PanelEntry, ServiceError> {
        let part = part_number::Entity::find_by_id(order.part_number_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Part number {} not found", order.part_number_id))
            })?;
        Ok(PanelEntry::new(entry, order, part))
    }

    /// Starts every Planned entry on the machine.
    ///
    /// `real_start` is stamped only on the first start; the orders move to
    /// InProduction. Returns the started entries, possibly none.
    #[instrument(skip(self))]
    pub async fn start_machine(
        &self,
        machine_id: Uuid,
    ) -> Result<Vec<schedule_entry::Model>, ServiceError> {
        self.require_machine(machine_id).await?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let now = Utc::now();

        let planned = schedule_entry::Entity::find()
            .find_also_related(production_order::Entity)
            .filter(schedule_entry::Column::MachineId.eq(machine_id))
            .filter(production_order::Column::Status.eq(OrderStatus::Planned))
            .order_by_asc(schedule_entry::Column::StartAt)
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut started = Vec::with_capacity(planned.len());
        for (entry, order) in planned {
            let entry = if entry.real_start.is_none() {
                let mut active: schedule_entry::ActiveModel = entry.into();
                active.real_start = Set(Some(now));
                active.update(&txn).await.map_err(ServiceError::db_error)?
            } else {
                entry
            };

            if let Some(order) = order {
                let mut order: production_order::ActiveModel = order.into();
                order.status = Set(OrderStatus::InProduction);
                order.update(&txn).await.map_err(ServiceError::db_error)?;
            }

            started.push(entry);
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.orders_started.inc_by(started.len() as u64);
        if !started.is_empty() {
            if let Some(sender) = &self.event_sender {
                sender.send_or_log(Event::ProductionStarted {
                    machine_id,
                    order_ids: started.iter().map(|e| e.order_id).collect(),
                });
            }
        }

        info!(%machine_id, started = started.len(), "production started");
        Ok(started)
    }

    /// Appends a production report and returns the order's new produced total
    #[instrument(skip(self))]
    pub async fn report_production(
        &self,
        schedule_entry_id: Uuid,
        quantity: i32,
        operator: Option<String>,
    ) -> Result<i32, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Reported quantity must be greater than zero, got: {}",
                quantity
            )));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let entry = find_entry(&txn, schedule_entry_id).await?;

        production_report::ActiveModel {
            schedule_entry_id: Set(entry.id),
            quantity: Set(quantity),
            operator: Set(operator),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        // Increment in SQL so concurrent reports never overwrite each other
        production_order::Entity::update_many()
            .col_expr(
                production_order::Column::QuantityProduced,
                Expr::col(production_order::Column::QuantityProduced).add(quantity),
            )
            .col_expr(production_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(production_order::Column::Id.eq(entry.order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let order = production_order::Entity::find_by_id(entry.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", entry.order_id)))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.units_reported.inc_by(quantity as u64);
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::ProductionReported {
                schedule_entry_id,
                order_id: order.id,
                quantity,
                quantity_produced: order.quantity_produced,
            });
        }

        info!(
            %schedule_entry_id,
            quantity,
            quantity_produced = order.quantity_produced,
            "production reported"
        );
        Ok(order.quantity_produced)
    }

    /// Records a downtime; without `ended_at` it stays open until closed or finished
    #[instrument(skip(self))]
    pub async fn record_downtime(
        &self,
        input: DowntimeInput,
        operator: Option<String>,
    ) -> Result<downtime::Model, ServiceError> {
        if let Some(end) = input.ended_at {
            validate_interval(input.started_at, end)?;
        }

        let db = &*self.db;
        let entry = find_entry(db, input.schedule_entry_id).await?;

        downtime_type::Entity::find_by_id(input.downtime_type_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Downtime type {} not found",
                    input.downtime_type_id
                ))
            })?;

        let downtime = downtime::ActiveModel {
            schedule_entry_id: Set(entry.id),
            downtime_type_id: Set(Some(input.downtime_type_id)),
            started_at: Set(input.started_at),
            ended_at: Set(input.ended_at),
            operator: Set(operator),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.downtimes_recorded.inc();
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::DowntimeRecorded {
                downtime_id: downtime.id,
                schedule_entry_id: entry.id,
                ongoing: downtime.is_open(),
            });
        }

        info!(downtime_id = %downtime.id, ongoing = downtime.is_open(), "downtime recorded");
        Ok(downtime)
    }

    /// Ends an ongoing downtime at `ended_at`, or now
    #[instrument(skip(self))]
    pub async fn close_downtime(
        &self,
        downtime_id: Uuid,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<downtime::Model, ServiceError> {
        let db = &*self.db;
        let downtime = downtime::Entity::find_by_id(downtime_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Downtime {} not found", downtime_id)))?;

        if !downtime.is_open() {
            return Err(ServiceError::InvalidOperation(format!(
                "Downtime {} is already closed",
                downtime_id
            )));
        }

        let end = ended_at.unwrap_or_else(Utc::now);
        validate_interval(downtime.started_at, end)?;

        let mut active: downtime::ActiveModel = downtime.into();
        active.ended_at = Set(Some(end));
        let closed = active.update(db).await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.downtimes_closed.inc();
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::DowntimeClosed {
                downtime_id,
                ended_at: end,
            });
        }

        info!(%downtime_id, ended_at = %end, "downtime closed");
        Ok(closed)
    }

    #[instrument(skip(self))]
    pub async fn record_scrap(
        &self,
        input: ScrapInput,
        operator: Option<String>,
    ) -> Result<scrap_report::Model, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Scrap quantity must be greater than zero, got: {}",
                input.quantity
            )));
        }

        let db = &*self.db;
        let entry = find_entry(db, input.schedule_entry_id).await?;

        scrap_type::Entity::find_by_id(input.scrap_type_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Scrap type {} not found", input.scrap_type_id))
            })?;

        let scrap = scrap_report::ActiveModel {
            schedule_entry_id: Set(entry.id),
            scrap_type_id: Set(input.scrap_type_id),
            quantity: Set(input.quantity),
            operator: Set(operator),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.units_scrapped.inc_by(scrap.quantity as u64);
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::ScrapRecorded {
                scrap_id: scrap.id,
                schedule_entry_id: entry.id,
                quantity: scrap.quantity,
            });
        }

        info!(scrap_id = %scrap.id, quantity = scrap.quantity, "scrap recorded");
        Ok(scrap)
    }

    /// Completes an InProduction order and closes its open downtimes at now
    #[instrument(skip(self))]
    pub async fn finish_order(&self, order_id: Uuid) -> Result<FinishOutcome, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let now = Utc::now();

        let order = production_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status != OrderStatus::InProduction {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {}; only orders in production can be finished",
                order_id, order.status
            )));
        }

        let mut active: production_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Completed);
        let order = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let entry = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let closed_downtimes = match entry {
            Some(entry) => {
                downtime::Entity::update_many()
                    .col_expr(downtime::Column::EndedAt, Expr::value(Some(now)))
                    .filter(downtime::Column::ScheduleEntryId.eq(entry.id))
                    .filter(downtime::Column::EndedAt.is_null())
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .rows_affected
            }
            None => {
                warn!(%order_id, "finishing an order without a schedule entry");
                0
            }
        };

        txn.commit().await.map_err(ServiceError::db_error)?;

        SHOPFLOOR_METRICS.orders_completed.inc();
        SHOPFLOOR_METRICS.downtimes_closed.inc_by(closed_downtimes);
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderCompleted {
                order_id,
                quantity: order.quantity,
                quantity_produced: order.quantity_produced,
                closed_downtimes,
            });
        }

        info!(%order_id, closed_downtimes, "order completed");
        Ok(FinishOutcome {
            order,
            closed_downtimes,
        })
    }

    async fn require_machine(&self, machine_id: Uuid) -> Result<machine::Model, ServiceError> {
        machine::Entity::find_by_id(machine_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Machine {} not found", machine_id)))
    }
}

async fn find_entry<C>(conn: &C, schedule_entry_id: Uuid) -> Result<schedule_entry::Model, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    schedule_entry::Entity::find_by_id(schedule_entry_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Schedule entry {} not found", schedule_entry_id))
        })
}

/// A downtime must end strictly after it starts
pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::InvalidInput(format!(
            "Downtime end ({}) must be after its start ({})",
            end, start
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn interval_must_move_forward() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        assert!(validate_interval(start, start + Duration::minutes(1)).is_ok());
        assert!(matches!(
            validate_interval(start, start),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(validate_interval(start, start - Duration::minutes(5)).is_err());
    }
}
