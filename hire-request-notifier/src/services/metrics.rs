//! Metrics collection for hire-request-notifier.
//!
//! Counts handled events by outcome and push-gateway calls by provider.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use service_core::error::AppError;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static HIRE_REQUEST_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PUSH_PROVIDER_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn metric_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalError(anyhow::anyhow!("metrics initialization failed: {}", e))
}

/// Initialize metrics collection. Must run once, at startup.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(metric_error)?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| metric_error("already initialized"))?;

    let registry = Registry::new();

    let events_counter = IntCounterVec::new(
        Opts::new(
            "hire_request_events_total",
            "Hire-request creation events handled, by outcome",
        ),
        &["outcome"],
    )
    .map_err(metric_error)?;

    let provider_calls_counter = IntCounterVec::new(
        Opts::new(
            "push_provider_calls_total",
            "Push gateway calls by provider and status",
        ),
        &["provider", "status"],
    )
    .map_err(metric_error)?;

    registry
        .register(Box::new(events_counter.clone()))
        .map_err(metric_error)?;
    registry
        .register(Box::new(provider_calls_counter.clone()))
        .map_err(metric_error)?;

    PROMETHEUS_REGISTRY
        .set(registry)
        .map_err(|_| metric_error("registry already set"))?;
    HIRE_REQUEST_EVENTS_TOTAL
        .set(events_counter)
        .map_err(|_| metric_error("hire_request_events_total already set"))?;
    PUSH_PROVIDER_CALLS_TOTAL
        .set(provider_calls_counter)
        .map_err(|_| metric_error("push_provider_calls_total already set"))?;

    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record the outcome of one handled event.
pub fn record_event(outcome: &str) {
    if let Some(counter) = HIRE_REQUEST_EVENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a push provider API call.
pub fn record_provider_call(provider: &str, status: &str) {
    if let Some(counter) = PUSH_PROVIDER_CALLS_TOTAL.get() {
        counter.with_label_values(&[provider, status]).inc();
    }
}
