use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        downtime, machine, part_number,
        production_order::{self, OrderStatus},
        production_report, schedule_entry, scrap_report,
    },
    errors::ServiceError,
    metrics::{labeled_name, set_gauge, METRICS},
};

const MACHINE_OEE_GAUGE: &str = "shopfloor_machine_oee_percent";

/// Activity recorded against one running schedule entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryActivity {
    pub real_start: Option<DateTime<Utc>>,
    pub cycle_time_seconds: i32,
    pub good_quantity: i64,
    pub scrap_quantity: i64,
    pub closed_downtime: Duration,
}

/// KPI percentages for one machine, before rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiFigures {
    pub availability: f64,
    pub efficiency: f64,
    pub quality: f64,
    pub oee: f64,
}

impl KpiFigures {
    pub const ZERO: KpiFigures = KpiFigures {
        availability: 0.0,
        efficiency: 0.0,
        quality: 0.0,
        oee: 0.0,
    };

    fn rounded(self) -> Self {
        Self {
            availability: round2(self.availability),
            efficiency: round2(self.efficiency),
            quality: round2(self.quality),
            oee: round2(self.oee),
        }
    }
}

/// Constants the OEE roll-up needs but the event log does not provide
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiSettings {
    /// Availability reported for every running machine
    pub availability_percent: f64,
    /// Efficiency reported when pieces exist but no run time has accrued
    pub efficiency_ceiling_percent: f64,
}

impl Default for KpiSettings {
    fn default() -> Self {
        Self {
            availability_percent: 100.0,
            efficiency_ceiling_percent: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MachineKpi {
    pub machine_id: Uuid,
    pub machine_number: String,
    pub active_orders: usize,
    pub good_quantity: i64,
    pub scrap_quantity: i64,
    pub availability: f64,
    pub efficiency: f64,
    pub quality: f64,
    pub oee: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pieces the machine could have moulded on one entry by `now`
pub fn theoretical_output(activity: &EntryActivity, now: DateTime<Utc>) -> f64 {
    let Some(real_start) = activity.real_start else {
        return 0.0;
    };
    if activity.cycle_time_seconds <= 0 {
        return 0.0;
    }

    let run = (now - real_start) - activity.closed_downtime;
    let run_seconds = run.num_milliseconds().max(0) as f64 / 1000.0;
    run_seconds / f64::from(activity.cycle_time_seconds)
}

/// Rolls the activity of a machine's running entries into KPI percentages
pub fn compute_kpi(activities: &[EntryActivity], now: DateTime<Utc>, settings: KpiSettings) -> KpiFigures {
    if activities.is_empty() {
        return KpiFigures::ZERO;
    }

    let good: i64 = activities.iter().map(|a| a.good_quantity).sum();
    let scrap: i64 = activities.iter().map(|a| a.scrap_quantity).sum();
    let gross = good + scrap;
    let theoretical: f64 = activities.iter().map(|a| theoretical_output(a, now)).sum();

    let quality = if gross == 0 {
        100.0
    } else {
        good as f64 / gross as f64 * 100.0
    };

    let efficiency = if theoretical > 0.0 {
        gross as f64 / theoretical * 100.0
    } else if gross == 0 {
        100.0
    } else {
        settings.efficiency_ceiling_percent
    };

    let availability = settings.availability_percent;

    KpiFigures {
        availability,
        efficiency,
        quality,
        oee: availability * efficiency * quality / 10_000.0,
    }
}

/// Per-machine KPI dashboard computed from the shop-floor event log
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    settings: KpiSettings,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, settings: KpiSettings) -> Self {
        Self { db, settings }
    }

    #[instrument(skip(self))]
    pub async fn kpi_dashboard(&self) -> Result<Vec<MachineKpi>, ServiceError> {
        self.kpi_dashboard_at(Utc::now()).await
    }

    /// Dashboard as of `now`; every machine appears, idle ones with zeros
    pub async fn kpi_dashboard_at(&self, now: DateTime<Utc>) -> Result<Vec<MachineKpi>, ServiceError> {
        let db = &*self.db;

        let machines = machine::Entity::find()
            .order_by_asc(machine::Column::Number)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let running = schedule_entry::Entity::find()
            .find_also_related(production_order::Entity)
            .filter(production_order::Column::Status.eq(OrderStatus::InProduction))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let part_ids: Vec<Uuid> = running
            .iter()
            .filter_map(|(_, order)| order.as_ref().map(|o| o.part_number_id))
            .collect();
        let entry_ids: Vec<Uuid> = running.iter().map(|(entry, _)| entry.id).collect();

        let cycle_times: HashMap<Uuid, i32> = if part_ids.is_empty() {
            HashMap::new()
        } else {
            part_number::Entity::find()
                .filter(part_number::Column::Id.is_in(part_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|part| (part.id, part.cycle_time_seconds))
                .collect()
        };

        let mut good: HashMap<Uuid, i64> = HashMap::new();
        let mut scrap: HashMap<Uuid, i64> = HashMap::new();
        let mut stopped: HashMap<Uuid, Duration> = HashMap::new();

        if !entry_ids.is_empty() {
            for report in production_report::Entity::find()
                .filter(production_report::Column::ScheduleEntryId.is_in(entry_ids.clone()))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
            {
                *good.entry(report.schedule_entry_id).or_default() += i64::from(report.quantity);
            }

            for report in scrap_report::Entity::find()
                .filter(scrap_report::Column::ScheduleEntryId.is_in(entry_ids.clone()))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
            {
                *scrap.entry(report.schedule_entry_id).or_default() += i64::from(report.quantity);
            }

            for stop in downtime::Entity::find()
                .filter(downtime::Column::ScheduleEntryId.is_in(entry_ids))
                .filter(downtime::Column::EndedAt.is_not_null())
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
            {
                let total = stopped.entry(stop.schedule_entry_id).or_insert_with(Duration::zero);
                *total = *total + stop.closed_duration();
            }
        }

        let mut by_machine: HashMap<Uuid, Vec<EntryActivity>> = HashMap::new();
        for (entry, order) in &running {
            let cycle_time_seconds = order
                .as_ref()
                .and_then(|o| cycle_times.get(&o.part_number_id).copied())
                .unwrap_or(0);
            by_machine.entry(entry.machine_id).or_default().push(EntryActivity {
                real_start: entry.real_start,
                cycle_time_seconds,
                good_quantity: good.get(&entry.id).copied().unwrap_or(0),
                scrap_quantity: scrap.get(&entry.id).copied().unwrap_or(0),
                closed_downtime: stopped.get(&entry.id).copied().unwrap_or_else(Duration::zero),
            });
        }

        let mut live_series = HashSet::with_capacity(machines.len());
        let dashboard: Vec<MachineKpi> = machines
            .into_iter()
            .map(|machine| {
                let activities = by_machine.remove(&machine.id).unwrap_or_default();
                let figures = compute_kpi(&activities, now, self.settings).rounded();

                let series = labeled_name(MACHINE_OEE_GAUGE, "machine", &machine.number);
                set_gauge(&series, figures.oee);
                live_series.insert(series);

                MachineKpi {
                    machine_id: machine.id,
                    machine_number: machine.number,
                    active_orders: activities.len(),
                    good_quantity: activities.iter().map(|a| a.good_quantity).sum(),
                    scrap_quantity: activities.iter().map(|a| a.scrap_quantity).sum(),
                    availability: figures.availability,
                    efficiency: figures.efficiency,
                    quality: figures.quality,
                    oee: figures.oee,
                }
            })
            .collect();

        METRICS.retain_gauge_family(MACHINE_OEE_GAUGE, &live_series);

        debug!(machines = dashboard.len(), "kpi dashboard computed");
        Ok(dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn activity(run_minutes: i64, cycle: i32, good: i64, scrap: i64) -> EntryActivity {
        EntryActivity {
            real_start: Some(now() - Duration::minutes(run_minutes)),
            cycle_time_seconds: cycle,
            good_quantity: good,
            scrap_quantity: scrap,
            closed_downtime: Duration::zero(),
        }
    }

    #[test]
    fn idle_machine_reports_zeros() {
        assert_eq!(compute_kpi(&[], now(), KpiSettings::default()), KpiFigures::ZERO);
    }

    #[test]
    fn nothing_reported_yet_is_full_quality_and_efficiency() {
        let kpi = compute_kpi(&[activity(0, 30, 0, 0)], now(), KpiSettings::default());
        assert_eq!(kpi.quality, 100.0);
        assert_eq!(kpi.efficiency, 100.0);
        assert_eq!(kpi.oee, 100.0);
    }

    #[test]
    fn one_hour_at_thirty_six_seconds() {
        // 100 pieces possible, 80 good and 10 scrap made
        let kpi = compute_kpi(&[activity(60, 36, 80, 10)], now(), KpiSettings::default());
        assert!((kpi.efficiency - 90.0).abs() < 1e-9);
        assert!((kpi.quality - 80.0 / 90.0 * 100.0).abs() < 1e-9);
        assert!((kpi.oee - 100.0 * 90.0 * (80.0 / 90.0 * 100.0) / 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn closed_downtime_reduces_theoretical_output() {
        let mut stopped = activity(60, 36, 0, 0);
        stopped.closed_downtime = Duration::minutes(30);
        assert!((theoretical_output(&stopped, now()) - 50.0).abs() < 1e-9);

        stopped.closed_downtime = Duration::minutes(90);
        assert_eq!(theoretical_output(&stopped, now()), 0.0);
    }

    #[test]
    fn pieces_without_run_time_use_the_ceiling() {
        let mut unstarted = activity(0, 36, 5, 0);
        unstarted.real_start = None;
        let settings = KpiSettings {
            availability_percent: 90.0,
            efficiency_ceiling_percent: 120.0,
        };
        let kpi = compute_kpi(&[unstarted], now(), settings);
        assert_eq!(kpi.efficiency, 120.0);
        assert_eq!(kpi.availability, 90.0);
    }

    #[test]
    fn unusable_cycle_time_contributes_no_theoretical_output() {
        assert_eq!(theoretical_output(&activity(60, 0, 0, 0), now()), 0.0);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(88.888_9), 88.89);
        assert_eq!(round2(100.0), 100.0);
    }

    proptest! {
        #[test]
        fn quality_stays_within_bounds(good in 0i64..10_000, scrap in 0i64..10_000) {
            let kpi = compute_kpi(&[activity(120, 30, good, scrap)], now(), KpiSettings::default());
            prop_assert!(kpi.quality >= 0.0 && kpi.quality <= 100.0);
        }

        #[test]
        fn oee_is_product_of_factors(good in 0i64..5_000, scrap in 0i64..500, minutes in 1i64..600) {
            let kpi = compute_kpi(&[activity(minutes, 20, good, scrap)], now(), KpiSettings::default());
            let expected = kpi.availability * kpi.efficiency * kpi.quality / 10_000.0;
            prop_assert!((kpi.oee - expected).abs() < 1e-6);
        }
    }
}
