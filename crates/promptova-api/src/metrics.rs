//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "promptova_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "promptova_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "promptova_http_requests_in_flight";

    // Generation metrics
    pub const GENERATIONS_TOTAL: &str = "promptova_generations_total";
    pub const CREDITS_CHARGED_TOTAL: &str = "promptova_credits_charged_total";
    pub const CREDITS_GRANTED_TOTAL: &str = "promptova_credits_granted_total";
    pub const LEDGER_WRITE_FAILURES_TOTAL: &str = "promptova_ledger_write_failures_total";

    // Payment metrics
    pub const WEBHOOK_EVENTS_TOTAL: &str = "promptova_webhook_events_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "promptova_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the outcome of one generation request.
///
/// `outcome` is one of `success`, `insufficient_credits`, `daily_limit`,
/// `provider_error`, `error`.
pub fn record_generation(generation_type: &'static str, outcome: &'static str) {
    counter!(
        names::GENERATIONS_TOTAL,
        "type" => generation_type,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record credits deducted for a generation.
pub fn record_credits_charged(generation_type: &'static str, credits: u32) {
    counter!(names::CREDITS_CHARGED_TOTAL, "type" => generation_type).increment(u64::from(credits));
}

/// Record credits added by a plan activation or adjustment.
pub fn record_credits_granted(reason: &'static str, credits: u64) {
    counter!(names::CREDITS_GRANTED_TOTAL, "reason" => reason).increment(credits);
}

/// Record a ledger entry that could not be written.
pub fn record_ledger_write_failure() {
    counter!(names::LEDGER_WRITE_FAILURES_TOTAL).increment(1);
}

/// Record a payment webhook by event type and result.
pub fn record_webhook_event(event_type: &str, result: &'static str) {
    let labels = [
        ("event_type", event_type.to_string()),
        ("result", result.to_string()),
    ];
    counter!(names::WEBHOOK_EVENTS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(limiter: &'static str, endpoint: &str) {
    let labels = [
        ("limiter", limiter.to_string()),
        ("endpoint", sanitize_path(endpoint)),
    ];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("valid UUID regex")
});

static PROFILE_UID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/profile/[^/]+").expect("valid profile regex")
});

static ADMIN_UID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/admin/users/[^/]+").expect("valid admin regex")
});

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, ":id");
    let path = PROFILE_UID.replace_all(&path, "/profile/:uid");
    let path = ADMIN_UID.replace_all(&path, "/admin/users/:uid");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/auth/profile/Xb3kQ9firebaseUid"),
            "/api/auth/profile/:uid"
        );
        assert_eq!(
            sanitize_path("/api/admin/users/abc/credits"),
            "/api/admin/users/:uid/credits"
        );
        assert_eq!(
            sanitize_path("/api/generations/550e8400-e29b-41d4-a716-446655440000"),
            "/api/generations/:id"
        );
        assert_eq!(sanitize_path("/api/generate/image"), "/api/generate/image");
    }
}
