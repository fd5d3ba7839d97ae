//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub wallet_operations: IntCounterVec,
    pub endpoint_failovers: IntCounterVec,
    pub volume_cycles: IntCounterVec,

    // Gauges
    pub active_volume_sessions: IntGauge,

    // Histograms
    pub batch_duration: HistogramVec,
    pub rpc_latency: HistogramVec,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let wallet_operations = IntCounterVec::new(
            Opts::new(
                "wallet_operations_total",
                "Per-wallet operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;

        let endpoint_failovers = IntCounterVec::new(
            Opts::new(
                "endpoint_failovers_total",
                "Number of times a failed endpoint was skipped for the next one",
            ),
            &["service"],
        )?;

        let volume_cycles = IntCounterVec::new(
            Opts::new("volume_cycles_total", "Volume cycles by outcome"),
            &["outcome"],
        )?;

        let active_volume_sessions = IntGauge::with_opts(Opts::new(
            "active_volume_sessions",
            "Number of volume sessions currently running",
        ))?;

        let batch_duration = HistogramVec::new(
            HistogramOpts::new("batch_duration_seconds", "Duration of one wallet batch")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["operation"],
        )?;

        let rpc_latency = HistogramVec::new(
            HistogramOpts::new("rpc_latency_seconds", "JSON-RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),
            &["method"],
        )?;

        // Register all metrics
        registry.register(Box::new(wallet_operations.clone()))?;
        registry.register(Box::new(endpoint_failovers.clone()))?;
        registry.register(Box::new(volume_cycles.clone()))?;
        registry.register(Box::new(active_volume_sessions.clone()))?;
        registry.register(Box::new(batch_duration.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            wallet_operations,
            endpoint_failovers,
            volume_cycles,
            active_volume_sessions,
            batch_duration,
            rpc_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one wallet's outcome; `outcome` is "success" or a failure kind
    pub fn record_wallet_operation(&self, operation: &str, outcome: &str) {
        self.wallet_operations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_wallet_operation("fund", "success");
        metrics.endpoint_failovers.with_label_values(&["rpc"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("wallet_operations_total{operation=\"fund\",outcome=\"success\"} 1"));
        assert!(text.contains("endpoint_failovers_total{service=\"rpc\"} 1"));
    }

    #[test]
    fn test_timer_observes() {
        let metrics = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&metrics.batch_duration.with_label_values(&["buy"]));
        assert_eq!(
            metrics
                .batch_duration
                .with_label_values(&["buy"])
                .get_sample_count(),
            1
        );
    }
}
