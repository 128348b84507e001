// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the storefront, scraped from GET /metrics.
//
// Besides the usual HTTP request counter and latency histogram, the service
// counts submission outcomes (so degraded orders are visible on a
// dashboard), payment intent results and webhook events, and times calls to
// the order sheet.
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// HTTP request counter
/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram
/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Submission outcomes
/// Labels: outcome (confirmed/degraded/demo/rejected/failed)
pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";

/// Payment intent creation attempts
/// Labels: status (created/failed)
pub const PAYMENT_INTENTS_TOTAL: &str = "payment_intents_total";

/// Verified webhook events
/// Labels: kind (payment_succeeded/payment_failed/ignored/rejected)
pub const WEBHOOK_EVENTS_TOTAL: &str = "webhook_events_total";

/// Order sheet round trips
/// Labels: operation (append/list)
pub const SHEETS_OPERATION_DURATION_SECONDS: &str = "sheets_operation_duration_seconds";

// =============================================================================
// SETUP
// =============================================================================

/// Builder with the latency buckets used by every histogram here.
fn builder() -> Result<PrometheusBuilder> {
    // 5ms .. 10s; sheet calls routinely take a few hundred ms
    let latency_buckets = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(SHEETS_OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?)
}

fn describe() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(ORDERS_SUBMITTED_TOTAL, "Order submissions by outcome");
    describe_counter!(PAYMENT_INTENTS_TOTAL, "Payment intent creation attempts");
    describe_counter!(WEBHOOK_EVENTS_TOTAL, "Payment webhook events by kind");
    describe_histogram!(
        SHEETS_OPERATION_DURATION_SECONDS,
        "Order sheet API latency in seconds"
    );
}

/// Install the global recorder and return the handle GET /metrics renders.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;
    describe();
    Ok(handle)
}

/// A handle that is not installed globally, for in-process tests.
pub fn detached_handle() -> Result<PrometheusHandle> {
    Ok(builder()?.build_recorder().handle())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_order_submitted(outcome: &'static str) {
    counter!(ORDERS_SUBMITTED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_payment_intent(success: bool) {
    let status = if success { "created" } else { "failed" };
    counter!(PAYMENT_INTENTS_TOTAL, "status" => status).increment(1);
}

pub fn record_webhook_event(kind: &'static str) {
    counter!(WEBHOOK_EVENTS_TOTAL, "kind" => kind).increment(1);
}

/// # Arguments
/// * `operation` - `append` or `list`
/// * `duration_secs` - Round trip including token exchange
pub fn record_sheets_operation(operation: &'static str, duration_secs: f64) {
    histogram!(SHEETS_OPERATION_DURATION_SECONDS, "operation" => operation).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_helpers_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_order_submitted("degraded");
            record_webhook_event("ignored");
            record_http_request("POST", "/api/submit-order", 200, 0.02);
        });

        let text = handle.render();
        assert!(text.contains(r#"orders_submitted_total{outcome="degraded"} 1"#));
        assert!(text.contains(r#"webhook_events_total{kind="ignored"} 1"#));
        assert!(text.contains("http_requests_total{"));
    }

    #[test]
    fn test_detached_handle_builds() {
        assert!(detached_handle().is_ok());
    }
}
