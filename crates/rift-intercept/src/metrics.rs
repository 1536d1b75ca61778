//! Prometheus metrics for rift-intercept.
//!
//! Tracks interception decisions, stub activity, and simulated deliveries.
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Requests seen by the interception point
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "rift_intercept_requests_total",
        "Total number of requests seen by the interception point",
        &["decision"]  // decision: simulate|pass_through
    )
    .expect("requests counter registers once");

    /// Successful stub activations
    pub static ref STUB_MATCHES_TOTAL: CounterVec = register_counter_vec!(
        "rift_intercept_stub_matches_total",
        "Total number of requests answered by each stub",
        &["stub"]
    )
    .expect("stub match counter registers once");

    /// Predicate or factory failures during resolution
    pub static ref EVALUATION_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "rift_intercept_evaluation_errors_total",
        "Total number of stub predicate or factory failures",
        &["kind"]  // kind: predicate_panicked|factory_failed|factory_panicked
    )
    .expect("evaluation error counter registers once");

    /// Finished deliveries by final state
    pub static ref DELIVERIES_TOTAL: CounterVec = register_counter_vec!(
        "rift_intercept_deliveries_total",
        "Total number of simulated deliveries by outcome",
        &["outcome"]  // outcome: completed|failed|cancelled
    )
    .expect("delivery counter registers once");

    /// Body bytes handed to observers
    pub static ref BYTES_DELIVERED_TOTAL: Counter = register_counter!(
        "rift_intercept_bytes_delivered_total",
        "Total number of simulated body bytes delivered"
    )
    .expect("bytes counter registers once");

    /// Wall time from deliver() to the terminal state
    pub static ref DELIVERY_DURATION_MS: HistogramVec = register_histogram_vec!(
        "rift_intercept_delivery_duration_ms",
        "Histogram of simulated delivery duration in milliseconds",
        &["outcome"],
        vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .expect("delivery histogram registers once");
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_decision(decision: &str) {
    REQUESTS_TOTAL.with_label_values(&[decision]).inc();
}

pub fn record_stub_match(stub: &str) {
    STUB_MATCHES_TOTAL.with_label_values(&[stub]).inc();
}

pub fn record_evaluation_error(kind: &str) {
    EVALUATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_bytes_delivered(bytes: usize) {
    BYTES_DELIVERED_TOTAL.inc_by(bytes as f64);
}

/// Helper to record a delivery reaching its terminal state
pub fn record_delivery(outcome: &str, duration_ms: f64) {
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
    DELIVERY_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}
