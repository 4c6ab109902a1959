use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Registered against the process-wide `Registry` passed into the
/// worker's constructor, rather than a global `lazy_static` registry.
pub struct SubmitterMetrics {
    pub commands_total: IntCounterVec,
    pub claim_batch_seconds: prometheus::Histogram,
    pub submit_duration_seconds: HistogramVec,
}

impl SubmitterMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("outbox_commands_total", "Outbox command terminal/transition counts by status"),
            &["status"],
        )?;
        let claim_batch_seconds = prometheus::Histogram::with_opts(HistogramOpts::new(
            "outbox_claim_batch_seconds",
            "Time spent claiming a batch of pending outbox commands",
        ))?;
        let submit_duration_seconds = HistogramVec::new(
            HistogramOpts::new("fabric_submit_duration_seconds", "Fabric submit call latency by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(claim_batch_seconds.clone()))?;
        registry.register(Box::new(submit_duration_seconds.clone()))?;

        Ok(Self {
            commands_total,
            claim_batch_seconds,
            submit_duration_seconds,
        })
    }
}
