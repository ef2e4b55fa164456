//! AI provider metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Provider calls by operation and outcome.
    pub const REQUESTS_TOTAL: &str = "promptova_ai_requests_total";

    /// Provider call latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "promptova_ai_latency_seconds";
}

/// Record one provider call. `outcome` is `ok` or an error kind.
pub fn record_call(operation: &'static str, outcome: &'static str, latency_secs: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}
