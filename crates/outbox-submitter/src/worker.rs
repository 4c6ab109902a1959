use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use bridge_types::{HealthState, OutboxCommand, TenantId};
use fabric_gateway::FabricGateway;
use outbox_store::OutboxStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SubmitterConfig;
use crate::error::SubmitterError;
use crate::metrics::SubmitterMetrics;
use crate::registry::CommandRegistry;

/// Drains `outbox_commands` with at-least-once delivery
/// Holds only `Arc`-shared collaborators constructed in `bin/bridge` —
/// no runtime-global state .
pub struct SubmitterWorker {
    tenant_id: TenantId,
    store: Arc<dyn OutboxStore>,
    gateway: Arc<dyn FabricGateway>,
    registry: CommandRegistry,
    config: SubmitterConfig,
    metrics: SubmitterMetrics,
    health: Arc<ArcSwap<HealthState>>,
}

impl SubmitterWorker {
    pub fn new(
        tenant_id: TenantId,
        store: Arc<dyn OutboxStore>,
        gateway: Arc<dyn FabricGateway>,
        registry: CommandRegistry,
        config: SubmitterConfig,
        metrics: SubmitterMetrics,
        health: Arc<ArcSwap<HealthState>>,
    ) -> Self {
        Self {
            tenant_id,
            store,
            gateway,
            registry,
            config,
            metrics,
            health,
        }
    }

    /// Runs until `cancel` fires. On shutdown, finishes the in-flight
    /// batch (bounded by `submitTimeout` per command) and returns —
    /// rows left PROCESSING are reclaimed once `staleProcessingAge`
    /// elapses.
    pub async fn run(self, cancel: CancellationToken) {
        info!(tenant_id = %self.tenant_id, "outbox submitter started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let claim_started = Instant::now();
            let claimed = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.store.claim_batch(
                    self.config.batch_size,
                    self.config.max_attempts,
                    self.config.stale_processing_age(),
                ) => result,
            };
            self.metrics.claim_batch_seconds.observe(claim_started.elapsed().as_secs_f64());

            let batch = match claimed {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "claim_batch failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval()) => {}
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                self.publish_health(true);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                }
                continue;
            }

            for cmd in batch {
                if cancel.is_cancelled() {
                    break;
                }
                self.process_one(&cmd).await;
            }
        }
        info!(tenant_id = %self.tenant_id, "outbox submitter shut down");
    }

    async fn process_one(&self, cmd: &OutboxCommand) {
        let locked = if self.config.single_worker_mode {
            true
        } else {
            match self.store.try_lock_aggregate(&cmd.aggregate_id).await {
                Ok(locked) => locked,
                Err(e) => {
                    error!(error = %e, aggregate_id = %cmd.aggregate_id, "failed to acquire aggregate lock");
                    false
                }
            }
        };

        if !locked {
            // Another worker holds the aggregate; requeue without
            // counting this as a submit attempt's failure classification.
            if let Err(e) = self
                .store
                .mark_failed(cmd.id, "aggregate lock held by another worker", true, self.config.max_attempts)
                .await
            {
                error!(error = %e, command_id = %cmd.id, "failed to requeue lock-contended command");
            }
            return;
        }

        let outcome = self.submit_command(cmd).await;

        if !self.config.single_worker_mode {
            if let Err(e) = self.store.unlock_aggregate(&cmd.aggregate_id).await {
                warn!(error = %e, aggregate_id = %cmd.aggregate_id, "failed to release aggregate lock");
            }
        }

        self.publish_health(outcome.is_ok() || matches!(outcome, Err(ref e) if !e.is_retryable()));
    }

    async fn submit_command(&self, cmd: &OutboxCommand) -> Result<(), SubmitterError> {
        let mapping = match self.registry.lookup(&cmd.command_type) {
            Ok(mapping) => mapping,
            Err(e) => {
                self.fail_terminally(cmd, &e).await;
                return Err(e);
            }
        };

        let args = match (mapping.encode)(&cmd.payload) {
            Ok(args) => args,
            Err(e) => {
                self.fail_terminally(cmd, &e).await;
                return Err(e);
            }
        };

        let started = Instant::now();
        match self.gateway.submit(mapping.function_name, args).await {
            Ok(result) => {
                self.metrics
                    .submit_duration_seconds
                    .with_label_values(&["committed"])
                    .observe(started.elapsed().as_secs_f64());
                if let Err(e) = self
                    .store
                    .mark_committed(cmd.id, &result.tx_id, result.block_number as i64)
                    .await
                {
                    error!(error = %e, command_id = %cmd.id, "failed to mark command committed");
                    return Err(SubmitterError::Store(e));
                }
                self.metrics.commands_total.with_label_values(&["COMMITTED"]).inc();
                info!(command_id = %cmd.id, fabric_tx_id = %result.tx_id, "command committed");
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                self.metrics
                    .submit_duration_seconds
                    .with_label_values(&[&format!("{kind:?}")])
                    .observe(started.elapsed().as_secs_f64());
                let submitter_err = SubmitterError::Fabric(e);
                let retryable = submitter_err.is_retryable();
                let status_label = if retryable { "PENDING" } else { "FAILED" };
                if let Err(store_err) = self
                    .store
                    .mark_failed(cmd.id, &submitter_err.to_string(), retryable, self.config.max_attempts)
                    .await
                {
                    error!(error = %store_err, command_id = %cmd.id, "failed to record submit failure");
                }
                self.metrics.commands_total.with_label_values(&[status_label]).inc();
                warn!(command_id = %cmd.id, error = %submitter_err, retryable, "submit failed");
                Err(submitter_err)
            }
        }
    }

    async fn fail_terminally(&self, cmd: &OutboxCommand, error: &SubmitterError) {
        if let Err(e) = self
            .store
            .mark_failed(cmd.id, &error.to_string(), false, self.config.max_attempts)
            .await
        {
            error!(error = %e, command_id = %cmd.id, "failed to mark command terminally failed");
        }
        self.metrics.commands_total.with_label_values(&["FAILED"]).inc();
    }

    fn publish_health(&self, success: bool) {
        let previous = self.health.load_full();
        let mut next = (*previous).clone();
        next.last_heartbeat = chrono::Utc::now();
        if success {
            next.submitter_last_success = Some(chrono::Utc::now());
        }
        next.circuit_breaker_closed = !matches!(self.gateway.circuit_state(), fabric_gateway::BreakerState::Open);
        self.health.store(Arc::new(next));
    }
}
