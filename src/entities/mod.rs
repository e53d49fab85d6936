//! Database entities for the shop floor.

pub mod downtime;
pub mod downtime_type;
pub mod machine;
pub mod part_number;
pub mod production_order;
pub mod production_report;
pub mod schedule_entry;
pub mod scrap_report;
pub mod scrap_type;
