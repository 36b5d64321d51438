//! Prometheus metrics collection

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub struct Metrics {
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec,
    pub purged_objects: IntCounter,
}

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| {
            Metrics {
                requests_total: register_counter_vec!(
                    "isteam_storage_requests_total",
                    "Total number of image storage operations",
                    &["operation", "outcome"]
                )
                .unwrap(),
                request_duration: register_histogram_vec!(
                    "isteam_storage_request_duration_seconds",
                    "Image storage operation duration in seconds",
                    &["operation"],
                    vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0]
                )
                .unwrap(),
                purged_objects: register_int_counter!(
                    "isteam_storage_purged_objects_total",
                    "Objects deleted by cache purges"
                )
                .unwrap(),
            }
        })
    }

    pub fn record_request(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.request_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_purged(&self, count: usize) {
        self.purged_objects.inc_by(count as u64);
    }
}

pub fn get_metrics() -> &'static Metrics {
    Metrics::init()
}
