// Reference data
pub mod catalog;

// Planning
pub mod orders;
pub mod scheduling;

// Shop floor
pub mod production;

// KPI dashboard
pub mod reports;

pub mod plant_time;
