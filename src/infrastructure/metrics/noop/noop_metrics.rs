use crate::domain::{Metrics, TryOnOutcome};
use std::time::Instant;

/// Metrics backend that records nothing.
#[derive(Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_try_on(&self, _: TryOnOutcome, _: Instant) {}
    fn record_directory_sync_failure(&self) {}
    fn record_http_request(&self, _: Instant, _: &str, _: &str, _: u16) {}
}
