use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot published by each worker after every loop iteration and read by
/// the `/livez` and `/readyz` handlers in `bin/bridge`. Kept lock-free on the
/// hot path by living behind an `arc_swap::ArcSwap` — neither worker takes
/// a lock to publish or read it.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub last_heartbeat: DateTime<Utc>,
    pub submitter_last_success: Option<DateTime<Utc>>,
    pub projector_lag_blocks: Option<i64>,
    pub circuit_breaker_closed: bool,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            last_heartbeat: Utc::now(),
            submitter_last_success: None,
            projector_lag_blocks: None,
            circuit_breaker_closed: true,
        }
    }

    /// Liveness: process alive and heartbeat recent.
    pub fn is_live(&self, max_heartbeat_age: chrono::Duration) -> bool {
        Utc::now() - self.last_heartbeat < max_heartbeat_age
    }

    /// Readiness: projector lag within budget, circuit not OPEN.
    pub fn is_ready(&self, lag_budget_blocks: i64) -> bool {
        self.circuit_breaker_closed
            && self
                .projector_lag_blocks
                .map(|lag| lag <= lag_budget_blocks)
                .unwrap_or(true)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
