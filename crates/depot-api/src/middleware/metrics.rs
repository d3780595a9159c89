//! # Prometheus Metrics
//!
//! HTTP metrics are recorded by [`metrics_middleware`]; checksum scan
//! outcomes are reported through [`ApiMetrics::scan_observer`]. The
//! registry is exposed in text format on the separate metrics listener.
//!
//! Request metrics are labelled by method and status code only. Artifact
//! paths are unbounded and never become label values.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use depot_integrity::{ScanObserver, ScanOutcome};
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_inflight_requests: IntGauge,
    checksum_scans_total: IntCounterVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("inflight", &self.inflight())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("depot_http_requests_total", "Total HTTP requests by method and status"),
            &["method", "code"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "depot_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "code"],
        )
        .expect("metric can be created");

        let http_inflight_requests = IntGauge::new(
            "depot_http_inflight_requests",
            "HTTP requests currently being served",
        )
        .expect("metric can be created");

        let checksum_scans_total = IntCounterVec::new(
            Opts::new("depot_checksum_scans_total", "Checksum scan ticks by outcome"),
            &["outcome"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_inflight_requests.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(checksum_scans_total.clone()))
            .expect("metric can be registered");
        // CPU, memory and file descriptor usage of this process.
        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_inflight_requests,
                checksum_scans_total,
            }),
        }
    }

    /// Total recorded requests (sum across all labels).
    pub fn requests(&self) -> u64 {
        let mut total = 0u64;
        for mf in &self.inner.http_requests_total.collect() {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    /// Requests currently in flight.
    pub fn inflight(&self) -> i64 {
        self.inner.http_inflight_requests.get()
    }

    /// Scan ticks recorded with the given outcome.
    pub fn scans(&self, outcome: ScanOutcome) -> u64 {
        self.inner
            .checksum_scans_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    fn record_request(&self, method: &str, status: u16, duration_secs: f64) {
        let code = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, &code])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, &code])
            .observe(duration_secs);
    }

    fn record_scan(&self, outcome: ScanOutcome) {
        self.inner
            .checksum_scans_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Observer for the checksum scheduler that counts every tick outcome.
    pub fn scan_observer(&self) -> ScanObserver {
        let metrics = self.clone();
        Arc::new(move |outcome| metrics.record_scan(outcome))
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge even when the request future is dropped.
struct InflightGuard(IntGauge);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let Some(metrics) = request.extensions().get::<ApiMetrics>().cloned() else {
        return next.run(request).await;
    };

    let method = request.method().to_string();
    let start = Instant::now();
    metrics.inner.http_inflight_requests.inc();
    let _guard = InflightGuard(metrics.inner.http_inflight_requests.clone());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    metrics.record_request(&method, response.status().as_u16(), duration);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_metrics_new_starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.inflight(), 0);
    }

    #[test]
    fn requests_increments() {
        let m = ApiMetrics::new();
        m.record_request("GET", 200, 0.01);
        m.record_request("PUT", 201, 0.02);
        m.record_request("GET", 404, 0.005);
        assert_eq!(m.requests(), 3);
    }

    #[test]
    fn scan_observer_counts_outcomes() {
        let m = ApiMetrics::new();
        let observer = m.scan_observer();
        observer(ScanOutcome::Completed);
        observer(ScanOutcome::Skipped);
        observer(ScanOutcome::Skipped);
        assert_eq!(m.scans(ScanOutcome::Completed), 1);
        assert_eq!(m.scans(ScanOutcome::Skipped), 2);
        assert_eq!(m.scans(ScanOutcome::Failed), 0);
    }

    #[test]
    fn encoded_output_uses_depot_names() {
        let m = ApiMetrics::new();
        m.record_request("HEAD", 200, 0.001);
        m.record_scan(ScanOutcome::Failed);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("depot_http_requests_total{code=\"200\",method=\"HEAD\"} 1"));
        assert!(text.contains("depot_http_request_duration_seconds_bucket"));
        assert!(text.contains("depot_http_inflight_requests 0"));
        assert!(text.contains("depot_checksum_scans_total{outcome=\"failed\"} 1"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn encoded_output_includes_process_metrics() {
        let text = ApiMetrics::new().gather_and_encode().unwrap();
        assert!(text.contains("process_open_fds"));
        assert!(text.contains("process_resident_memory_bytes"));
    }
}
