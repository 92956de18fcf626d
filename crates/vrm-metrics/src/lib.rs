use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Router manager metrics, registered on a registry owned by this struct
#[derive(Clone)]
pub struct ManagerMetrics {
    registry: Registry,
    pub commands_sent: IntCounterVec,
    pub dispatch_failures: IntCounterVec,
    pub dispatch_latency_seconds: Histogram,
    pub reconcile_queue_drops: IntCounter,
    pub redundant_pairs_checked: IntCounter,
    pub backup_reboots: IntCounter,
    pub duplicate_masters: IntCounter,
    pub usage_answers_applied: IntCounter,
    pub usage_answers_discarded: IntCounter,
    pub router_alerts_emitted: IntCounter,
}

impl ManagerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let commands_sent = IntCounterVec::new(
            Opts::new("vrm_commands_sent_total", "Agent commands sent, by command"),
            &["command"],
        )?;
        let dispatch_failures = IntCounterVec::new(
            Opts::new("vrm_dispatch_failures_total", "Failed dispatches, by error kind"),
            &["kind"],
        )?;
        let dispatch_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("vrm_dispatch_latency_seconds", "Batch round-trip latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        let reconcile_queue_drops = IntCounter::with_opts(Opts::new(
            "vrm_reconcile_queue_drops_total",
            "Networks not queued for reconciliation because the queue was full",
        ))?;
        let redundant_pairs_checked = IntCounter::with_opts(Opts::new(
            "vrm_redundant_pairs_checked_total",
            "Redundant router pairs reconciled",
        ))?;
        let backup_reboots = IntCounter::with_opts(Opts::new(
            "vrm_backup_reboots_total",
            "Backup routers rebooted to recover a redundant pair",
        ))?;
        let duplicate_masters = IntCounter::with_opts(Opts::new(
            "vrm_duplicate_masters_total",
            "Duplicate master detections",
        ))?;
        let usage_answers_applied = IntCounter::with_opts(Opts::new(
            "vrm_usage_answers_applied_total",
            "Network usage answers folded into statistics",
        ))?;
        let usage_answers_discarded = IntCounter::with_opts(Opts::new(
            "vrm_usage_answers_discarded_total",
            "Network usage answers dropped because the row moved on",
        ))?;
        let router_alerts_emitted = IntCounter::with_opts(Opts::new(
            "vrm_router_alerts_emitted_total",
            "Alerts raised from router monitoring",
        ))?;

        registry.register(Box::new(commands_sent.clone()))?;
        registry.register(Box::new(dispatch_failures.clone()))?;
        registry.register(Box::new(dispatch_latency_seconds.clone()))?;
        registry.register(Box::new(reconcile_queue_drops.clone()))?;
        registry.register(Box::new(redundant_pairs_checked.clone()))?;
        registry.register(Box::new(backup_reboots.clone()))?;
        registry.register(Box::new(duplicate_masters.clone()))?;
        registry.register(Box::new(usage_answers_applied.clone()))?;
        registry.register(Box::new(usage_answers_discarded.clone()))?;
        registry.register(Box::new(router_alerts_emitted.clone()))?;

        Ok(Self {
            registry,
            commands_sent,
            dispatch_failures,
            dispatch_latency_seconds,
            reconcile_queue_drops,
            redundant_pairs_checked,
            backup_reboots,
            duplicate_masters,
            usage_answers_applied,
            usage_answers_discarded,
            router_alerts_emitted,
        })
    }

    /// Gather metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let metrics = ManagerMetrics::new().unwrap();
        metrics.commands_sent.with_label_values(&["CheckRouter"]).inc();
        metrics.backup_reboots.inc();
        metrics.dispatch_latency_seconds.observe(0.2);

        let text = metrics.gather().unwrap();
        assert!(text.contains("vrm_commands_sent_total"));
        assert!(text.contains("CheckRouter"));
        assert!(text.contains("vrm_backup_reboots_total 1"));
    }

    #[test]
    fn test_instances_are_independent() {
        let first = ManagerMetrics::new().unwrap();
        let second = ManagerMetrics::new().unwrap();
        first.duplicate_masters.inc();
        assert_eq!(first.duplicate_masters.get(), 1);
        assert_eq!(second.duplicate_masters.get(), 0);
    }
}
