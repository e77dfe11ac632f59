//! Prometheus metrics for reconciliation and admission.

use crate::reconciler::Transition;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Controller metrics, registered in a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    reconcile_errors_total: IntCounter,
    admission_total: IntCounterVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new(
                "auto_service_reconcile_total",
                "Completed reconciliations by resulting transition",
            ),
            &["transition"],
        )?;
        let reconcile_errors_total = IntCounter::new(
            "auto_service_reconcile_errors_total",
            "Reconciliations that failed and were handed back for requeue",
        )?;
        let admission_total = IntCounterVec::new(
            Opts::new(
                "auto_service_admission_total",
                "Admission reviews by decision",
            ),
            &["decision"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(admission_total.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            reconcile_errors_total,
            admission_total,
        })
    }

    /// Count a completed reconciliation
    pub fn record_transition(&self, transition: Transition) {
        self.reconcile_total
            .with_label_values(&[transition.as_str()])
            .inc();
    }

    /// Count a failed reconciliation
    pub fn record_reconcile_error(&self) {
        self.reconcile_errors_total.inc();
    }

    /// Count an admission decision (`allow`, `deny` or `invalid`)
    pub fn record_admission(&self, decision: &str) {
        self.admission_total.with_label_values(&[decision]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_values() {
        let metrics = Metrics::new().expect("metrics register");
        metrics.record_transition(Transition::Activated);
        metrics.record_transition(Transition::Activated);
        metrics.record_reconcile_error();
        metrics.record_admission("deny");

        let text = metrics.encode().expect("encode");
        assert!(text.contains("auto_service_reconcile_total{transition=\"activated\"} 2"));
        assert!(text.contains("auto_service_reconcile_errors_total 1"));
        assert!(text.contains("auto_service_admission_total{decision=\"deny\"} 1"));
    }
}
