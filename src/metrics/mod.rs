/*!
 * # Metrics Module
 *
 * In-process counters, gauges and histograms for the shop-floor API.
 *
 * Metrics are exposed as:
 * - Prometheus text format at `/metrics`
 * - JSON at `/metrics/json`
 */

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge storing an `f64` as raw bits
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Count and sum of observations, sum kept in microunits
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, value: f64) {
        let micros = (value.max(0.0) * 1_000_000.0) as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    /// Renders every metric in Prometheus text exposition format
    pub fn export_metrics(&self) -> String {
        let mut output = String::new();

        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        // Labelled series of one family share a single TYPE line
        let mut gauges: Vec<(String, f64)> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        gauges.sort_by(|a, b| a.0.cmp(&b.0));
        let mut family_seen: Option<String> = None;
        for (name, value) in gauges {
            let family = metric_family(&name);
            if family_seen.as_deref() != Some(family) {
                output.push_str(&format!("# TYPE {} gauge\n", family));
                family_seen = Some(family.to_string());
            }
            output.push_str(&format!("{} {}\n", name, value));
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }

        output
    }

    /// Drops the labelled gauges of `family` whose full name is not in `keep`
    pub fn retain_gauge_family(&self, family: &str, keep: &HashSet<String>) {
        self.gauges
            .retain(|name, _| metric_family(name) != family || keep.contains(name));
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), json!(entry.value().get())))
            .collect();

        let gauges: serde_json::Map<String, serde_json::Value> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), json!(entry.value().get())))
            .collect();

        let histograms: serde_json::Map<String, serde_json::Value> = self
            .histograms
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    json!({
                        "count": entry.value().get_count(),
                        "sum": entry.value().get_sum(),
                    }),
                )
            })
            .collect();

        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
    pub static ref SHOPFLOOR_METRICS: ShopFloorMetrics = ShopFloorMetrics::new();
    pub static ref HTTP_METRICS: HttpMetrics = HttpMetrics::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

/// Series name `family{label="value"}` with the label value escaped for the
/// text exposition format
pub fn labeled_name(family: &str, label: &str, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    format!("{}{{{}=\"{}\"}}", family, label, escaped)
}

fn metric_family(name: &str) -> &str {
    name.split('{').next().unwrap_or(name)
}

/// Domain counters updated by the services after each committed change
pub struct ShopFloorMetrics {
    pub orders_created: Counter,
    pub orders_scheduled: Counter,
    pub orders_unscheduled: Counter,
    pub orders_started: Counter,
    pub orders_completed: Counter,
    pub units_reported: Counter,
    pub units_scrapped: Counter,
    pub downtimes_recorded: Counter,
    pub downtimes_closed: Counter,
}

impl ShopFloorMetrics {
    pub fn new() -> Self {
        Self {
            orders_created: METRICS.get_or_create_counter("shopfloor_orders_created_total"),
            orders_scheduled: METRICS.get_or_create_counter("shopfloor_orders_scheduled_total"),
            orders_unscheduled: METRICS
                .get_or_create_counter("shopfloor_orders_unscheduled_total"),
            orders_started: METRICS.get_or_create_counter("shopfloor_orders_started_total"),
            orders_completed: METRICS.get_or_create_counter("shopfloor_orders_completed_total"),
            units_reported: METRICS.get_or_create_counter("shopfloor_units_reported_total"),
            units_scrapped: METRICS.get_or_create_counter("shopfloor_units_scrapped_total"),
            downtimes_recorded: METRICS
                .get_or_create_counter("shopfloor_downtimes_recorded_total"),
            downtimes_closed: METRICS.get_or_create_counter("shopfloor_downtimes_closed_total"),
        }
    }
}

impl Default for ShopFloorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HttpMetrics {
    pub requests_total: Counter,
    pub request_duration: Histogram,
    pub status_2xx: Counter,
    pub status_4xx: Counter,
    pub status_5xx: Counter,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: METRICS.get_or_create_counter("http_requests_total"),
            request_duration: METRICS.get_or_create_histogram("http_request_duration_seconds"),
            status_2xx: METRICS.get_or_create_counter("http_status_2xx_total"),
            status_4xx: METRICS.get_or_create_counter("http_status_4xx_total"),
            status_5xx: METRICS.get_or_create_counter("http_status_5xx_total"),
        }
    }

    pub fn record_request(&self, duration: Duration, status: StatusCode) {
        self.requests_total.inc();
        self.request_duration.observe(duration.as_secs_f64());

        match status.as_u16() {
            200..=299 => self.status_2xx.inc(),
            400..=499 => self.status_4xx.inc(),
            500..=599 => self.status_5xx.inc(),
            _ => {}
        }
    }
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Records request count, latency and status class for every response
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    HTTP_METRICS.record_request(started.elapsed(), response.status());
    response
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_metrics(),
    )
}

pub async fn metrics_json_handler() -> Json<serde_json::Value> {
    Json(METRICS.export_metrics_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_keeps_fractional_values() {
        let gauge = Gauge::new();
        gauge.set(87.25);
        assert_eq!(gauge.get(), 87.25);
    }

    #[test]
    fn histogram_tracks_count_and_sum() {
        let histogram = Histogram::new();
        histogram.observe(0.25);
        histogram.observe(0.5);
        assert_eq!(histogram.get_count(), 2);
        assert!((histogram.get_sum() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn registry_exports_text_and_json() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("units_total").inc_by(3);
        registry.get_or_create_gauge("oee_percent").set(61.5);

        let text = registry.export_metrics();
        assert!(text.contains("# TYPE units_total counter"));
        assert!(text.contains("units_total 3"));
        assert!(text.contains("oee_percent 61.5"));

        let json = registry.export_metrics_json();
        assert_eq!(json["counters"]["units_total"], 3);
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(
            labeled_name("oee_percent", "machine", r#"INY "7" \ B"#),
            r#"oee_percent{machine="INY \"7\" \\ B"}"#
        );
        assert_eq!(
            labeled_name("oee_percent", "machine", "A\nB"),
            r#"oee_percent{machine="A\nB"}"#
        );
    }

    #[test]
    fn labelled_gauges_share_one_type_line_and_can_be_pruned() {
        let registry = MetricsRegistry::new();
        let kept = labeled_name("oee_percent", "machine", "INY-01");
        let stale = labeled_name("oee_percent", "machine", "INY-02");
        registry.get_or_create_gauge(&kept).set(50.0);
        registry.get_or_create_gauge(&stale).set(70.0);
        registry.get_or_create_gauge("uptime_seconds").set(1.0);

        let text = registry.export_metrics();
        assert_eq!(text.matches("# TYPE oee_percent gauge").count(), 1);

        registry.retain_gauge_family("oee_percent", &HashSet::from([kept.clone()]));
        let text = registry.export_metrics();
        assert!(text.contains(&format!("{} 50", kept)));
        assert!(!text.contains("INY-02"));
        assert!(text.contains("uptime_seconds 1"));
    }

    #[test]
    fn http_metrics_bucket_by_status_class() {
        let before = HTTP_METRICS.status_4xx.get();
        HTTP_METRICS.record_request(Duration::from_millis(5), StatusCode::NOT_FOUND);
        assert!(HTTP_METRICS.status_4xx.get() > before);
    }
}
