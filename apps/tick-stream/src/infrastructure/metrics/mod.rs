//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: Bars fetched, ticks accepted/rejected, source errors
//! - **Polling**: Poll cycle counts and fetch latency
//! - **Fan-out**: Subscriber and backlog gauges
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tick_stream_bars_fetched_total",
        "Total bars returned by the quote source"
    );
    describe_counter!(
        "tick_stream_ticks_accepted_total",
        "Total ticks admitted past the high-water mark"
    );
    describe_counter!(
        "tick_stream_ticks_rejected_total",
        "Total candidate ticks rejected as duplicate or stale"
    );
    describe_counter!(
        "tick_stream_source_errors_total",
        "Total failed quote source queries by stage"
    );
    describe_counter!(
        "tick_stream_poll_cycles_total",
        "Total live poll cycles started"
    );

    describe_gauge!(
        "tick_stream_subscribers",
        "Number of currently attached subscribers"
    );
    describe_gauge!(
        "tick_stream_backlog_ticks",
        "Number of ticks in the session ledger"
    );

    describe_histogram!(
        "tick_stream_fetch_duration_seconds",
        "Quote source query latency by stage"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for ingestion stages.
#[derive(Debug, Clone, Copy)]
pub enum Stage {
    /// One-shot session backlog reconstruction.
    Backfill,
    /// Repeating trailing-window poll.
    Poll,
}

impl Stage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Backfill => "backfill",
            Self::Poll => "poll",
        }
    }
}

/// Record bars returned by a quote source query.
pub fn record_bars_fetched(stage: Stage, count: u64) {
    counter!(
        "tick_stream_bars_fetched_total",
        "stage" => stage.as_str()
    )
    .increment(count);
}

/// Record ticks admitted to the ledger.
pub fn record_ticks_accepted(count: u64) {
    counter!("tick_stream_ticks_accepted_total").increment(count);
}

/// Record candidate ticks rejected by the high-water mark.
pub fn record_ticks_rejected(count: u64) {
    counter!("tick_stream_ticks_rejected_total").increment(count);
}

/// Record a failed quote source query.
pub fn record_source_error(stage: Stage) {
    counter!(
        "tick_stream_source_errors_total",
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Record the start of a live poll cycle.
pub fn record_poll_cycle() {
    counter!("tick_stream_poll_cycles_total").increment(1);
}

/// Update the attached subscriber count.
pub fn set_subscribers(count: f64) {
    gauge!("tick_stream_subscribers").set(count);
}

/// Update the session ledger size.
pub fn set_backlog_len(count: f64) {
    gauge!("tick_stream_backlog_ticks").set(count);
}

/// Record quote source query latency.
pub fn record_fetch_duration(stage: Stage, duration: Duration) {
    histogram!(
        "tick_stream_fetch_duration_seconds",
        "stage" => stage.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_as_str() {
        assert_eq!(Stage::Backfill.as_str(), "backfill");
        assert_eq!(Stage::Poll.as_str(), "poll");
    }
}
