//! Prometheus metrics for the service's own request and collection activity.
//!
//! This module provides:
//! - Per-listener request counters
//! - Metrics collection latency and failure tracking
//! - An optional Prometheus recorder whose output the metrics listener renders

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, warn};

// === Metric Name Constants ===

/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// Snapshot collection latency metric name.
pub const METRIC_COLLECTION_LATENCY: &str = "metrics_collection_latency_ms";
/// Snapshot collection failures counter metric name.
pub const METRIC_COLLECTION_FAILURES: &str = "metrics_collection_failures_total";

/// Initialize all metric descriptions.
/// Call this once at startup, after a recorder is installed.
pub fn init_metrics() {
    describe_counter!(
        METRIC_HTTP_REQUESTS,
        "Total number of HTTP requests received, by listener"
    );
    describe_histogram!(
        METRIC_COLLECTION_LATENCY,
        "Time to collect a metrics snapshot in milliseconds"
    );
    describe_counter!(
        METRIC_COLLECTION_FAILURES,
        "Total number of failed metrics snapshot collections"
    );

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder.
///
/// Returns `None` when a recorder is already installed.
pub fn install_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder not installed: {}", e);
            None
        }
    }
}

/// Increment the request counter for a listener.
pub fn inc_http_requests(listener: &'static str) {
    counter!(METRIC_HTTP_REQUESTS, "listener" => listener).increment(1);
}

/// Record snapshot collection latency.
pub fn record_collection_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_COLLECTION_LATENCY).record(latency_ms);
}

/// Increment the collection failure counter.
pub fn inc_collection_failures() {
    counter!(METRIC_COLLECTION_FAILURES).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        init_metrics();
        inc_http_requests("gateway");
        inc_collection_failures();
        record_collection_latency(Instant::now());
    }
}
