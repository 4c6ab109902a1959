mod config;
mod error;
mod health_server;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bridge_types::HealthState;
use clap::Parser;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use event_schema::EventSchemaRegistry;
use fabric_gateway::{FabricGateway, FabricGatewayClient};
use outbox_store::PgOutboxStore;
use outbox_submitter::{CommandRegistry, SubmitterMetrics, SubmitterWorker};
use projector::{HandlerRegistry, ProjectorMetrics, ProjectorWorker};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{BridgeConfig, LogFormat};
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}

async fn build_pool(database_url: &str, pool_size: u32) -> Result<Pool<AsyncPgConnection>, BridgeError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .await
        .map_err(|e| BridgeError::Pool(e.to_string()))
}

/// Periodically mirrors the gateway's circuit breaker state onto the
/// `circuit_breaker_state` gauge — neither worker's own metrics struct
/// owns the breaker, so nothing else updates this on its behalf.
async fn run_circuit_breaker_gauge(
    gateway: Arc<dyn FabricGateway>,
    gauge: prometheus::IntGauge,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                gauge.set(gateway.circuit_state().as_gauge());
            }
        }
    }
}

async fn run(config: BridgeConfig) -> Result<(), BridgeError> {
    let registry = Registry::new();
    let bridge_metrics = BridgeMetrics::register(&registry)?;
    let submitter_metrics = SubmitterMetrics::register(&registry)?;
    let projector_metrics = ProjectorMetrics::register(&registry)?;

    info!(tenant_id = %config.tenant_id, network = config.fabric.network.as_str(), "starting bridge");

    outbox_store::run_migrations(&config.database_url)
        .await
        .map_err(BridgeError::Store)?;

    let submitter_pool = build_pool(&config.database_url, config.submitter_pool_size).await?;
    let projector_pool = build_pool(&config.database_url, config.projector_pool_size).await?;

    let submitter_store: Arc<dyn outbox_store::OutboxStore> = Arc::new(PgOutboxStore::new(submitter_pool));
    let projector_store: Arc<dyn outbox_store::OutboxStore> = Arc::new(PgOutboxStore::new(projector_pool));

    let gateway: Arc<dyn FabricGateway> =
        Arc::new(FabricGatewayClient::new(config.fabric.clone()).map_err(BridgeError::Fabric)?);

    let schema_registry = Arc::new(EventSchemaRegistry::load_embedded());
    let command_registry = CommandRegistry::with_defaults();
    let handler_registry = HandlerRegistry::with_defaults();

    let health = Arc::new(ArcSwap::from_pointee(HealthState::new()));
    let cancel = CancellationToken::new();

    let submitter = SubmitterWorker::new(
        config.tenant_id.clone(),
        submitter_store,
        gateway.clone(),
        command_registry,
        config.submitter.clone(),
        submitter_metrics,
        health.clone(),
    );
    let projector = ProjectorWorker::new(
        config.tenant_id.clone(),
        config.projector_name.clone(),
        config.fabric.channel.clone(),
        projector_store,
        gateway.clone(),
        schema_registry,
        handler_registry,
        config.projector.clone(),
        projector_metrics,
        health.clone(),
    );

    let submitter_handle = tokio::spawn(submitter.run(cancel.child_token()));
    let projector_handle = tokio::spawn(projector.run(cancel.child_token()));
    let breaker_gauge_handle = tokio::spawn(run_circuit_breaker_gauge(
        gateway.clone(),
        bridge_metrics.circuit_breaker_state,
        cancel.child_token(),
    ));

    let shutdown_signal = {
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    };

    let health_server = health_server::serve(
        config.http_addr,
        health,
        registry,
        config.health_max_heartbeat_age(),
        config.projector.lag_budget_blocks,
        cancel.child_token(),
    );

    let health_server_failed = tokio::select! {
        _ = shutdown_signal => None,
        result = health_server => {
            cancel.cancel();
            result.err()
        }
    };

    let projector_result = projector_handle.await;
    if let Err(e) = submitter_handle.await {
        error!(error = %e, "submitter task panicked");
    }
    let _ = breaker_gauge_handle.await;

    if let Some(e) = health_server_failed {
        error!(error = %e, "health server exited unexpectedly");
        return Err(BridgeError::HealthServer(e.to_string()));
    }

    match projector_result {
        Ok(Err(e)) => {
            error!(error = %e, "projector exited with an error");
            Err(BridgeError::Worker(e.to_string()))
        }
        Err(e) => {
            error!(error = %e, "projector task panicked");
            Ok(())
        }
        Ok(Ok(())) => Ok(()),
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() {
    let config = BridgeConfig::parse();
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, exit_code = e.exit_code(), "bridge exited with error");
        std::process::exit(e.exit_code());
    }
}
