use crate::domain::TryOnOutcome;
use metrics::{counter, histogram};
use std::time::Instant;

/// Count one finished try-on call and track its latency.
pub fn track_try_on(outcome: TryOnOutcome, start: Instant) {
    let elapsed = start.elapsed();
    counter!("tryon_requests_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("tryon_request_duration_seconds", "outcome" => outcome.as_str()).record(elapsed);
}

/// Count a user directory upsert that failed while authenticating.
pub fn increment_directory_sync_failure() {
    counter!("directory_sync_failures_total").increment(1);
}

/// Track HTTP request latency using a histogram.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    histogram!(
        "http_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}
