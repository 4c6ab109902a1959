use prometheus::{IntGauge, Opts, Registry};

/// Metrics owned by the process itself rather than by a single worker —
/// the circuit breaker is shared between the submitter and the projector,
/// so neither worker's own metrics struct is the right place for it.
pub struct BridgeMetrics {
    pub circuit_breaker_state: IntGauge,
}

impl BridgeMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let circuit_breaker_state = IntGauge::with_opts(Opts::new(
            "circuit_breaker_state",
            "Fabric gateway circuit breaker state (0=closed, 1=half_open, 2=open)",
        ))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;
        Ok(Self { circuit_breaker_state })
    }
}
