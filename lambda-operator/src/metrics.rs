//! Prometheus metrics registry (spec.md SPEC_FULL ambient stack), modeled
//! on the `Metrics`/`State` split common to `kube-runtime`-based
//! operators: a registry owned by process state, a thin handle threaded
//! through reconcile `Context`.
use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, Registry};

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounterVec,
    pub reconcile_failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reconciliations: IntCounterVec::new(
                opts!("lambda_operator_reconciliations_total", "reconciliations processed"),
                &["kind"],
            )
            .unwrap(),
            reconcile_failures: IntCounterVec::new(
                opts!("lambda_operator_reconcile_failures_total", "reconciliations that returned an error"),
                &["kind", "reason"],
            )
            .unwrap(),
            reconcile_duration: HistogramVec::new(
                histogram_opts!("lambda_operator_reconcile_duration_seconds", "reconcile wall-clock duration"),
                &["kind"],
            )
            .unwrap(),
        }
    }

    pub fn register(self, registry: &Registry) -> prometheus::Result<Self> {
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.reconcile_failures.clone()))?;
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        Ok(self)
    }

    pub fn record_success(&self, kind: &str, elapsed_secs: f64) {
        self.reconciliations.with_label_values(&[kind]).inc();
        self.reconcile_duration.with_label_values(&[kind]).observe(elapsed_secs);
    }

    pub fn record_failure(&self, kind: &str, reason: &str) {
        self.reconcile_failures.with_label_values(&[kind, reason]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
