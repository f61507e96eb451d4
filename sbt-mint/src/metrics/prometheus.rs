//! Prometheus-backed mint metrics.
//!
//! [`MetricsRegistry`] owns a Prometheus registry and a set of
//! strongly-typed [`MintMetrics`].

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

/// Orchestrator metrics.
#[derive(Clone)]
pub struct MintMetrics {
    /// Mint attempts started.
    pub attempts: IntCounter,
    /// Mints that reached inclusion.
    pub completed: IntCounter,
    /// Failed mints, labelled by error kind.
    pub failures: IntCounterVec,
    /// Proof records that could not be published.
    pub publish_failures: IntCounter,
    /// Time spent in each mint step, in seconds.
    pub phase_seconds: HistogramVec,
    /// End-to-end duration of successful mints, in seconds.
    pub mint_seconds: Histogram,
}

impl MintMetrics {
    /// Registers mint metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let attempts = IntCounter::with_opts(Opts::new(
            "mint_attempts_total",
            "Total number of mint attempts started",
        ))?;
        registry.register(Box::new(attempts.clone()))?;

        let completed = IntCounter::with_opts(Opts::new(
            "mint_completed_total",
            "Total number of mints included in a block",
        ))?;
        registry.register(Box::new(completed.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new("mint_failures_total", "Total number of failed mints by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let publish_failures = IntCounter::with_opts(Opts::new(
            "mint_record_publish_failures_total",
            "Total number of proof records that failed to publish",
        ))?;
        registry.register(Box::new(publish_failures.clone()))?;

        // Proof building and inclusion dominate; both can take tens of seconds.
        let phase_seconds = HistogramVec::new(
            HistogramOpts::new("mint_phase_seconds", "Time spent in each mint step in seconds")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["phase"],
        )?;
        registry.register(Box::new(phase_seconds.clone()))?;

        let mint_seconds = Histogram::with_opts(
            HistogramOpts::new("mint_duration_seconds", "End-to-end duration of successful mints in seconds")
                .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(mint_seconds.clone()))?;

        Ok(Self {
            attempts,
            completed,
            failures,
            publish_failures,
            phase_seconds,
            mint_seconds,
        })
    }

    pub fn observe_phase(&self, phase: &str, seconds: f64) {
        self.phase_seconds.with_label_values(&[phase]).observe(seconds);
    }

    pub fn record_failure(&self, kind: &str) {
        self.failures.with_label_values(&[kind]).inc();
    }
}

/// Wrapper around a Prometheus registry and the mint metrics.
///
/// Cheap to clone; share it behind an `Arc` between the orchestrator and
/// whatever serves `/metrics`.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub mint: MintMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("sbt".to_string()), None)?;
        let mint = MintMetrics::register(&registry)?;
        Ok(Self { registry, mint })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = MintMetrics::register(&registry).expect("register metrics");

        metrics.attempts.inc();
        metrics.record_failure("decode_absent");
        metrics.observe_phase("proof_building", 3.2);

        let families = registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "mint_failures_total"));
    }

    #[test]
    fn gather_text_uses_namespace() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.mint.completed.inc();
        let text = registry.gather_text();
        assert!(text.contains("sbt_mint_completed_total 1"));
    }
}
