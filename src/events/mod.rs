use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted after a shop-floor change is committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        part_number_id: Uuid,
        quantity: i32,
    },
    OrderScheduled {
        order_id: Uuid,
        machine_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },
    OrderUnscheduled {
        order_id: Uuid,
    },
    ProductionStarted {
        machine_id: Uuid,
        order_ids: Vec<Uuid>,
    },
    ProductionReported {
        schedule_entry_id: Uuid,
        order_id: Uuid,
        quantity: i32,
        quantity_produced: i32,
    },
    DowntimeRecorded {
        downtime_id: Uuid,
        schedule_entry_id: Uuid,
        ongoing: bool,
    },
    DowntimeClosed {
        downtime_id: Uuid,
        ended_at: DateTime<Utc>,
    },
    ScrapRecorded {
        scrap_id: Uuid,
        schedule_entry_id: Uuid,
        quantity: i32,
    },
    OrderCompleted {
        order_id: Uuid,
        quantity: i32,
        quantity_produced: i32,
        closed_downtimes: u64,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderScheduled { .. } => "order_scheduled",
            Event::OrderUnscheduled { .. } => "order_unscheduled",
            Event::ProductionStarted { .. } => "production_started",
            Event::ProductionReported { .. } => "production_reported",
            Event::DowntimeRecorded { .. } => "downtime_recorded",
            Event::DowntimeClosed { .. } => "downtime_closed",
            Event::ScrapRecorded { .. } => "scrap_recorded",
            Event::OrderCompleted { .. } => "order_completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Queues an event without waiting. A full or closed channel is logged
    /// and the event dropped; the originating request still succeeds.
    pub fn send_or_log(&self, event: Event) {
        let name = event.name();
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event = name, "event channel full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(event = name, "event channel closed; dropping event");
            }
        }
    }
}

/// Drains the event channel until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        handle_event(&event);
    }

    info!("Event channel closed; event processing loop stopped");
}

fn handle_event(event: &Event) {
    match event {
        Event::OrderCreated {
            order_id,
            part_number_id,
            quantity,
        } => info!(%order_id, %part_number_id, quantity, "order created"),
        Event::OrderScheduled {
            order_id,
            machine_id,
            start_at,
            end_at,
        } => info!(%order_id, %machine_id, %start_at, %end_at, "order scheduled"),
        Event::OrderUnscheduled { order_id } => info!(%order_id, "order unscheduled"),
        Event::ProductionStarted {
            machine_id,
            order_ids,
        } => info!(%machine_id, orders = order_ids.len(), "production started"),
        Event::ProductionReported {
            schedule_entry_id,
            order_id,
            quantity,
            quantity_produced,
        } => info!(
            %schedule_entry_id,
            %order_id,
            quantity,
            quantity_produced,
            "production reported"
        ),
        Event::DowntimeRecorded {
            downtime_id,
            schedule_entry_id,
            ongoing,
        } => info!(%downtime_id, %schedule_entry_id, ongoing, "downtime recorded"),
        Event::DowntimeClosed {
            downtime_id,
            ended_at,
        } => info!(%downtime_id, %ended_at, "downtime closed"),
        Event::ScrapRecorded {
            scrap_id,
            schedule_entry_id,
            quantity,
        } => info!(%scrap_id, %schedule_entry_id, quantity, "scrap recorded"),
        Event::OrderCompleted {
            order_id,
            quantity,
            quantity_produced,
            closed_downtimes,
        } => {
            if quantity_produced < quantity {
                warn!(
                    %order_id,
                    quantity,
                    quantity_produced,
                    "order completed short of requested quantity"
                );
            }
            info!(%order_id, closed_downtimes, "order completed");
        }
    }
}
