use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Registered against the process-wide `Registry` passed into the
/// worker's constructor (same anti-global-singleton
/// convention `outbox-submitter::SubmitterMetrics` uses).
pub struct ProjectorMetrics {
    pub events_processed_total: IntCounterVec,
    pub blockchain_height: IntGauge,
    pub projector_lag_blocks: IntGauge,
    pub processing_duration_seconds: Histogram,
    pub checkpoints_saved_total: IntCounter,
    pub schema_validation_failures_total: IntCounter,
    pub schema_unknown_event_total: IntCounter,
}

impl ProjectorMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let events_processed_total = IntCounterVec::new(
            Opts::new(
                "projector_events_processed_total",
                "Chaincode events processed by the projector, by event name and outcome",
            ),
            &["event_name", "status"],
        )?;
        let blockchain_height = IntGauge::new(
            "projector_blockchain_height",
            "Highest block number the projector has observed on the event stream",
        )?;
        let projector_lag_blocks = IntGauge::new(
            "projector_lag_blocks",
            "Blocks between the observed chain tip and the last applied checkpoint",
        )?;
        let processing_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "processing_duration_seconds",
            "Time spent applying one chaincode event's read-model effect",
        ))?;
        let checkpoints_saved_total =
            IntCounter::new("projector_checkpoints_saved_total", "Checkpoint advances committed")?;
        let schema_validation_failures_total = IntCounter::new(
            "projector_schema_validation_failures_total",
            "Advisory schema validation failures observed on the event stream",
        )?;
        let schema_unknown_event_total = IntCounter::new(
            "projector_schema_unknown_event_total",
            "Events observed with no registered schema",
        )?;

        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(blockchain_height.clone()))?;
        registry.register(Box::new(projector_lag_blocks.clone()))?;
        registry.register(Box::new(processing_duration_seconds.clone()))?;
        registry.register(Box::new(checkpoints_saved_total.clone()))?;
        registry.register(Box::new(schema_validation_failures_total.clone()))?;
        registry.register(Box::new(schema_unknown_event_total.clone()))?;

        Ok(Self {
            events_processed_total,
            blockchain_height,
            projector_lag_blocks,
            processing_duration_seconds,
            checkpoints_saved_total,
            schema_validation_failures_total,
            schema_unknown_event_total,
        })
    }
}
