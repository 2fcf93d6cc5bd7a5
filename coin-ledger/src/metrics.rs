//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_entries_total` - Total ledger entries applied
//! - `ledger_apply_conflicts_total` - Version conflicts hit during apply
//! - `ledger_rejected_debits_total` - Debits refused for insufficient balance
//! - `ledger_apply_duration_seconds` - Histogram of apply latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total entries applied
    pub entries_total: IntCounter,

    /// Version conflicts during apply (pre-retry)
    pub conflicts_total: IntCounter,

    /// Debits refused for insufficient balance
    pub rejected_debits_total: IntCounter,

    /// Apply duration histogram
    pub apply_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::with_opts(Opts::new(
            "ledger_entries_total",
            "Total ledger entries applied",
        ))?;
        registry.register(Box::new(entries_total.clone()))?;

        let conflicts_total = IntCounter::with_opts(Opts::new(
            "ledger_apply_conflicts_total",
            "Version conflicts hit during apply",
        ))?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let rejected_debits_total = IntCounter::with_opts(Opts::new(
            "ledger_rejected_debits_total",
            "Debits refused for insufficient balance",
        ))?;
        registry.register(Box::new(rejected_debits_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_apply_duration_seconds",
                "Histogram of apply latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        Ok(Self {
            entries_total,
            conflicts_total,
            rejected_debits_total,
            apply_duration,
            registry,
        })
    }

    /// Record a successful apply
    pub fn record_apply(&self, duration_seconds: f64) {
        self.entries_total.inc();
        self.apply_duration.observe(duration_seconds);
    }

    /// Record a version conflict
    pub fn record_conflict(&self) {
        self.conflicts_total.inc();
    }

    /// Record a refused debit
    pub fn record_rejected_debit(&self) {
        self.rejected_debits_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_total.get(), 0);
        assert_eq!(metrics.conflicts_total.get(), 0);
    }

    #[test]
    fn test_record_apply() {
        let metrics = Metrics::new().unwrap();
        metrics.record_apply(0.002);
        metrics.record_apply(0.004);
        assert_eq!(metrics.entries_total.get(), 2);
    }

    #[test]
    fn test_record_conflict() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict();
        assert_eq!(metrics.conflicts_total.get(), 1);
    }
}
