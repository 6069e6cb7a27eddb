//! Prometheus metrics for registration-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

/// Registration attempts by outcome (enrolled, ineligible, duplicate, ...).
pub static REGISTRATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "registration_attempts_total",
        "Total number of registration attempts by outcome",
        &["tier", "outcome"]
    )
    .expect("Failed to register registration_attempts_total")
});

/// Topic subscription calls by status. Failures here never fail a registration.
pub static SUBSCRIPTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "registration_topic_subscriptions_total",
        "Total number of push topic subscription attempts",
        &["status"]
    )
    .expect("Failed to register registration_topic_subscriptions_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "registration_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register registration_db_query_duration_seconds")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&REGISTRATIONS_TOTAL);
    Lazy::force(&SUBSCRIPTIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&service_core::middleware::metrics::HTTP_REQUESTS_TOTAL);
    Lazy::force(&service_core::middleware::metrics::HTTP_REQUEST_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    service_core::middleware::render_metrics()
}
