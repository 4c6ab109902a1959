use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use bridge_types::{BlockchainEvent, HealthState, ReadModelEffect, TenantId};
use event_schema::{EventEnvelope, EventSchemaRegistry};
use fabric_gateway::FabricGateway;
use futures::StreamExt;
use outbox_store::checkpoint::{advances, Checkpoint};
use outbox_store::OutboxStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ProjectorConfig;
use crate::error::ProjectorError;
use crate::handlers::HandlerRegistry;
use crate::metrics::ProjectorMetrics;

/// Turns the ordered chaincode event stream from `fabric-gateway` into
/// read-model state. One instance owns exactly one
/// `(tenant_id, projector_name, channel)` checkpoint row — running two
/// against the same row is the `CheckpointConflict` invariant violation
/// that ends the process.
pub struct ProjectorWorker {
    tenant_id: TenantId,
    projector_name: String,
    channel: String,
    store: Arc<dyn OutboxStore>,
    gateway: Arc<dyn FabricGateway>,
    schema_registry: Arc<EventSchemaRegistry>,
    handlers: HandlerRegistry,
    config: ProjectorConfig,
    metrics: ProjectorMetrics,
    health: Arc<ArcSwap<HealthState>>,
}

impl ProjectorWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        projector_name: String,
        channel: String,
        store: Arc<dyn OutboxStore>,
        gateway: Arc<dyn FabricGateway>,
        schema_registry: Arc<EventSchemaRegistry>,
        handlers: HandlerRegistry,
        config: ProjectorConfig,
        metrics: ProjectorMetrics,
        health: Arc<ArcSwap<HealthState>>,
    ) -> Self {
        Self {
            tenant_id,
            projector_name,
            channel,
            store,
            gateway,
            schema_registry,
            handlers,
            config,
            metrics,
            health,
        }
    }

    /// Runs until `cancel` fires or an unrecoverable error (checkpoint
    /// conflict, or a connect failure the reconnect loop gives up on)
    /// surfaces. `bin/bridge` exits non-zero on `Err` so a supervisor can
    /// restart the process — the checkpoint already reflects every event
    /// actually applied, so restart is safe.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ProjectorError> {
        self.gateway.connect().await?;
        info!(tenant_id = %self.tenant_id, projector = %self.projector_name, channel = %self.channel, "projector started");

        let mut backoff = self.config.reconnect_initial_backoff();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_stream(&cancel).await {
                Ok(()) => break,
                Err(e) if e.kind() == bridge_types::ErrorKind::CheckpointConflict => {
                    error!(error = %e, "checkpoint conflict; exiting for operator reconciliation");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "projector stream failed; reconnecting");
                    backoff = backoff.min(self.config.reconnect_max_backoff());
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.config.reconnect_max_backoff());
                }
            }
        }

        self.gateway.disconnect().await?;
        info!(tenant_id = %self.tenant_id, projector = %self.projector_name, "projector shut down");
        Ok(())
    }

    /// One `streamEvents` session: connects, replays from the persisted
    /// checkpoint, and applies events until the stream errors or `cancel`
    /// fires. Returning `Ok(())` means a clean shutdown; returning `Err`
    /// hands control back to `run`'s reconnect/backoff loop (or its fatal
    /// exit, for `CheckpointConflict`).
    async fn run_stream(&self, cancel: &CancellationToken) -> Result<(), ProjectorError> {
        let (last_block, last_event_index) = self
            .store
            .load_checkpoint(&self.tenant_id, &self.projector_name, &self.channel, self.config.configured_start_block)
            .await?;

        // Resume-boundary nuance: mid-block checkpoints re-request the
        // same block so in-block redeliveries can be filtered below;
        // block-boundary checkpoints move on to the next block.
        let from_block = if last_event_index >= 0 { last_block } else { last_block + 1 };
        let mut cursor = Checkpoint { last_block, last_event_index };
        let mut stream = self.gateway.stream_events(from_block).await?;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                item = stream.next() => item,
            };

            let event = match next {
                None => return Err(ProjectorError::StreamClosed),
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(e.into()),
            };

            self.metrics.blockchain_height.set(event.block_number as i64);

            let event_cursor = Checkpoint {
                last_block: event.block_number,
                last_event_index: event.event_index as i32,
            };
            if !advances(cursor, event_cursor) {
                // Already applied in a prior session; the gateway may
                // redeliver the remainder of a partially-consumed block.
                continue;
            }

            self.process_event(&event).await?;
            cursor = event_cursor;
        }
    }

    async fn process_event(&self, event: &BlockchainEvent) -> Result<(), ProjectorError> {
        let started = Instant::now();

        let payload: serde_json::Value = match serde_json::from_slice(&event.payload) {
            Ok(value) => value,
            Err(e) => {
                self.metrics
                    .events_processed_total
                    .with_label_values(&[&event.event_name, "decode_failed"])
                    .inc();
                warn!(event_name = %event.event_name, block = event.block_number, error = %e, "malformed event payload; advancing past it");
                self.write_dlq(event, &e.to_string()).await;
                return self.finalize(event, ReadModelEffect::NoOp, started).await;
            }
        };

        let outcome = self.schema_registry.validate(EventEnvelope {
            event_name: &event.event_name,
            event_version: &event.event_version,
            payload: &payload,
        });
        if outcome.warn_unknown_event {
            self.metrics.schema_unknown_event_total.inc();
        }
        if !outcome.ok {
            self.metrics.schema_validation_failures_total.inc();
            warn!(event_name = %event.event_name, errors = ?outcome.errors, "schema validation failed");
            if self.config.strict_schema {
                return Err(ProjectorError::SchemaValidationFailed(outcome.errors.join("; ")));
            }
        }

        let effect = match self.handlers.lookup(&event.event_name, &event.event_version) {
            None => {
                self.metrics
                    .events_processed_total
                    .with_label_values(&[&event.event_name, "unknown_event"])
                    .inc();
                warn!(event_name = %event.event_name, "no handler registered; advancing checkpoint with warning");
                ReadModelEffect::NoOp
            }
            Some(handler) => self.run_handler_with_retries(event, &payload, handler).await,
        };

        self.metrics
            .events_processed_total
            .with_label_values(&[&event.event_name, "applied"])
            .inc();
        self.finalize(event, effect, started).await
    }

    /// Retries a `HandlerError` up to `handler_max_attempts` times with a
    /// linear backoff, then quarantines the event to the DLQ and lets the
    /// checkpoint advance past it anyway — a poison event must not stall
    /// the stream forever.
    async fn run_handler_with_retries(
        &self,
        event: &BlockchainEvent,
        payload: &serde_json::Value,
        handler: crate::handlers::Handler,
    ) -> ReadModelEffect {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match handler(payload) {
                Ok(effect) => return effect,
                Err(e) => {
                    if attempt >= self.config.handler_max_attempts {
                        self.metrics
                            .events_processed_total
                            .with_label_values(&[&event.event_name, "handler_failed"])
                            .inc();
                        error!(event_name = %event.event_name, error = %e, attempt, "handler failed after bounded retries");
                        self.write_dlq(event, &e.to_string()).await;
                        return ReadModelEffect::NoOp;
                    }
                    warn!(event_name = %event.event_name, error = %e, attempt, "handler failed; retrying");
                    tokio::time::sleep(self.config.handler_retry_backoff(attempt)).await;
                }
            }
        }
    }

    async fn write_dlq(&self, event: &BlockchainEvent, reason: &str) {
        if let Err(e) = self
            .store
            .record_dlq(
                &self.tenant_id,
                &self.projector_name,
                &self.channel,
                &event.event_name,
                event.block_number,
                event.tx_index,
                event.event_index,
                event.payload.clone(),
                reason,
            )
            .await
        {
            error!(error = %e, event_name = %event.event_name, "failed to record DLQ row");
        }
    }

    async fn finalize(
        &self,
        event: &BlockchainEvent,
        effect: ReadModelEffect,
        started: Instant,
    ) -> Result<(), ProjectorError> {
        self.store
            .apply_event(
                &self.tenant_id,
                &self.projector_name,
                &self.channel,
                event.block_number,
                event.event_index as i32,
                effect,
            )
            .await?;
        self.metrics.checkpoints_saved_total.inc();
        self.metrics.processing_duration_seconds.observe(started.elapsed().as_secs_f64());
        self.publish_health(event.block_number);
        Ok(())
    }

    fn publish_health(&self, last_applied_block: u64) {
        let previous = self.health.load_full();
        let mut next = (*previous).clone();
        next.last_heartbeat = chrono::Utc::now();
        let tip = self.metrics.blockchain_height.get().max(last_applied_block as i64);
        let lag = (tip - last_applied_block as i64).max(0);
        self.metrics.projector_lag_blocks.set(lag);
        next.projector_lag_blocks = Some(lag);
        next.circuit_breaker_closed = !matches!(self.gateway.circuit_state(), fabric_gateway::BreakerState::Open);
        self.health.store(Arc::new(next));
    }
}
