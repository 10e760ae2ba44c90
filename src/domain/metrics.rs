use std::sync::Arc;
use std::time::Instant;

/// Label attached to every recorded try-on call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnOutcome {
    // ---
    Success,
    Rejected,
    UpstreamError,
}

impl TryOnOutcome {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            TryOnOutcome::Success => "success",
            TryOnOutcome::Rejected => "rejected",
            TryOnOutcome::UpstreamError => "upstream_error",
        }
    }
}

/// Abstraction for application metrics (counters, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record one finished try-on call.
    fn record_try_on(&self, outcome: TryOnOutcome, start: Instant);

    /// Record a directory sync that failed during authentication.
    fn record_directory_sync_failure(&self);

    /// Record HTTP request duration and labels.
    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
