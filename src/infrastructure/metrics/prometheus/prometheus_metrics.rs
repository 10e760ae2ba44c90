//! Prometheus metrics implementation.
//!
//! Delegates to the sibling `counters` and `recorder` modules, which talk to
//! the global `metrics` crate registry. Series are registered on first use and
//! a single global handle renders them in Prometheus text format.

use crate::domain::{Metrics, TryOnOutcome};
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Holds no state of its own; everything lives in the global registry that
/// `recorder.rs` installs.
#[derive(Default)]
pub struct PrometheusMetrics {}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_try_on(&self, outcome: TryOnOutcome, start: Instant) {
        tracing::debug!(outcome = outcome.as_str(), "Recording try-on outcome");
        super::track_try_on(outcome, start);
    }

    fn record_directory_sync_failure(&self) {
        super::increment_directory_sync_failure();
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }
}
