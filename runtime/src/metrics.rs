//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for:
//! - Dispatch throughput and reducer latency
//! - Query fetches, cache hits and evictions
//! - Refetches triggered by invalidation and polling
//!
//! # Example
//!
//! ```rust,no_run
//! use reflow_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.start()?;
//! println!("{}", recorder.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder. Serving the scrape payload is left to the
/// host; render it with [`MetricsRecorder::render`].
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not yet installed.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs
    /// a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the global recorder was not installed by this one.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store
    describe_counter!(
        "store_actions_dispatched_total",
        "Total number of actions that reached the reducer"
    );
    describe_counter!(
        "store_reducer_errors_total",
        "Total number of dispatches rejected by the reducer"
    );
    describe_histogram!(
        "store_dispatch_duration_seconds",
        "Time spent in the reducer and state swap"
    );
    describe_histogram!(
        "store_chain_duration_seconds",
        "Time spent in the whole middleware chain"
    );

    // Query cache
    describe_counter!(
        "query_fetches_started_total",
        "Total number of query fetches started"
    );
    describe_counter!(
        "query_fetches_fulfilled_total",
        "Total number of query fetches that succeeded"
    );
    describe_counter!(
        "query_fetches_rejected_total",
        "Total number of query fetches that failed"
    );
    describe_counter!(
        "query_cache_hits_total",
        "Total number of subscriptions served from cache"
    );
    describe_counter!(
        "query_cache_evictions_total",
        "Total number of cache entries removed after their keep-alive"
    );
    describe_counter!(
        "query_invalidation_refetches_total",
        "Total number of refetches caused by tag invalidation"
    );
    describe_counter!(
        "query_poll_refetches_total",
        "Total number of refetches caused by polling"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an action processed by the reducer.
    pub fn record_dispatch(duration: Duration) {
        counter!("store_actions_dispatched_total").increment(1);
        histogram!("store_dispatch_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a dispatch rejected by the reducer.
    pub fn record_error() {
        counter!("store_reducer_errors_total").increment(1);
    }

    /// Record the latency of a full pass through the middleware chain.
    pub fn record_chain(duration: Duration) {
        histogram!("store_chain_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Query cache metrics recorder.
pub struct QueryMetrics;

impl QueryMetrics {
    /// Record a fetch start.
    pub fn record_fetch_started(endpoint: &str) {
        counter!("query_fetches_started_total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a successful fetch.
    pub fn record_fetch_fulfilled(endpoint: &str) {
        counter!("query_fetches_fulfilled_total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a failed fetch.
    pub fn record_fetch_rejected(endpoint: &str) {
        counter!("query_fetches_rejected_total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a subscription served from cache.
    pub fn record_cache_hit() {
        counter!("query_cache_hits_total").increment(1);
    }

    /// Record a cache entry eviction.
    pub fn record_eviction() {
        counter!("query_cache_evictions_total").increment(1);
    }

    /// Record a refetch triggered by tag invalidation.
    pub fn record_invalidation_refetch() {
        counter!("query_invalidation_refetches_total").increment(1);
    }

    /// Record a refetch triggered by polling.
    pub fn record_poll_refetch() {
        counter!("query_poll_refetches_total").increment(1);
    }
}
