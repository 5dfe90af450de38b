//! Metrics for request orchestration.
//!
//! Counters and histograms are emitted through the `metrics` facade and are
//! no-ops until a recorder is installed. [`MetricsExporter`] installs a
//! Prometheus recorder whose output the host can serve however it likes.
//!
//! # Example
//!
//! ```rust,no_run
//! use reqhook_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

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

/// Prometheus recorder installer.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the recorder cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. If one is already
    /// installed this logs a warning and succeeds without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Requests
    describe_counter!(
        "reqhook.requests.started",
        "Requests dispatched to the transport"
    );
    describe_counter!(
        "reqhook.requests.completed",
        "Requests that finished with a response"
    );
    describe_counter!(
        "reqhook.requests.failed",
        "Requests that finished with a real failure"
    );
    describe_counter!(
        "reqhook.requests.cancelled",
        "Requests whose result was suppressed by cancellation"
    );
    describe_histogram!(
        "reqhook.request.duration_seconds",
        "Time spent waiting on the transport"
    );

    // Cache
    describe_counter!("reqhook.cache.hits", "Cache lookups that found an entry");
    describe_counter!("reqhook.cache.misses", "Cache lookups that found nothing");
    describe_counter!(
        "reqhook.cache.evictions",
        "Entries evicted to stay within capacity"
    );

    // Server rendering
    describe_counter!(
        "reqhook.ssr.prefetches",
        "Prefetches queued during server renders"
    );
}

/// Request metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record a request dispatched to the transport.
    pub fn record_start() {
        counter!("reqhook.requests.started").increment(1);
    }

    /// Record a request that produced a response.
    pub fn record_completed(duration: Duration) {
        counter!("reqhook.requests.completed").increment(1);
        histogram!("reqhook.request.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a real failure.
    pub fn record_failed(code: &'static str, duration: Duration) {
        counter!("reqhook.requests.failed", "code" => code).increment(1);
        histogram!("reqhook.request.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a cancelled request.
    pub fn record_cancelled() {
        counter!("reqhook.requests.cancelled").increment(1);
    }
}

/// Cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a lookup hit.
    pub fn record_hit() {
        counter!("reqhook.cache.hits").increment(1);
    }

    /// Record a lookup miss.
    pub fn record_miss() {
        counter!("reqhook.cache.misses").increment(1);
    }

    /// Record an eviction.
    pub fn record_eviction() {
        counter!("reqhook.cache.evictions").increment(1);
    }
}

/// Server-render metrics recorder.
pub struct SsrMetrics;

impl SsrMetrics {
    /// Record a queued prefetch.
    pub fn record_prefetch() {
        counter!("reqhook.ssr.prefetches").increment(1);
    }
}
