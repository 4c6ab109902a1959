use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_types::BlockchainEvent;
use chrono::{TimeZone, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity as TlsIdentity};
use tracing::{info, warn};

use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::config::FabricGatewayConfig;
use crate::error::FabricError;
use crate::proto::gateway::gateway_client::GatewayClient;
use crate::proto::gateway::{
    EndorseRequest, SignedChaincodeEventsRequest, SignedCommitStatusRequest, SubmitRequest,
};
use crate::wallet::FileSystemWallet;

/// Result of a committed submit
pub struct SubmitOutcome {
    pub tx_id: String,
    pub block_number: u64,
    pub payload: Vec<u8>,
}

/// The seam `outbox-submitter` and `projector` depend on. Concrete gRPC
/// I/O lives in [`FabricGatewayClient`]; tests depend on this trait and a
/// `mockall`-generated fake instead.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait FabricGateway: Send + Sync {
    async fn connect(&self) -> Result<(), FabricError>;
    async fn disconnect(&self) -> Result<(), FabricError>;
    async fn submit(&self, function_name: &str, args: Vec<Vec<u8>>) -> Result<SubmitOutcome, FabricError>;
    async fn health_checkpoint(&self) -> Result<(), FabricError>;
    fn circuit_state(&self) -> BreakerState;

    /// Returns a cold stream starting at `from_block` inclusive. Callers
    /// that previously consumed part of `from_block` must filter
    /// redeliveries themselves ( resume-boundary nuance); the
    /// gateway always (re)starts a fresh stream at a block boundary.
    async fn stream_events(
        &self,
        from_block: u64,
    ) -> Result<BoxStream<'static, Result<BlockchainEvent, FabricError>>, FabricError>;
}

pub struct FabricGatewayClient {
    config: FabricGatewayConfig,
    wallet: FileSystemWallet,
    breaker: Arc<CircuitBreaker>,
    channel: Mutex<Option<Channel>>,
}

impl FabricGatewayClient {
    pub fn new(config: FabricGatewayConfig) -> Result<Self, FabricError> {
        let wallet = FileSystemWallet::load(&config.identity_dir(), &config.msp_id)?;
        let breaker = Arc::new(CircuitBreaker::new(
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.reset_timeout(),
            config.circuit_breaker.half_open_probe_count,
        ));
        Ok(Self {
            config,
            wallet,
            breaker,
            channel: Mutex::new(None),
        })
    }

    fn tls_config(&self) -> Result<ClientTlsConfig, FabricError> {
        let identity = self.wallet.identity();
        let mut tls = ClientTlsConfig::new()
            .identity(TlsIdentity::from_pem(identity.cert_pem, self.wallet.key_pem()));

        if let Some(ca_cert) = &self.config.tls.ca_cert {
            let ca_pem = std::fs::read(ca_cert)
                .map_err(|e| FabricError::Connect(format!("failed to read CA cert: {e}")))?;
            tls = tls.ca_certificate(Certificate::from_pem(ca_pem));
        }

        // When set, server_name_override becomes the transport's
        // authority override, handling internal-DNS / external-SAN mismatch.
        if let Some(override_name) = &self.config.tls.server_name_override {
            tls = tls.domain_name(override_name.clone());
        }

        Ok(tls)
    }

    async fn dial(&self) -> Result<Channel, FabricError> {
        let endpoint = Channel::from_shared(self.config.peer_endpoint.clone())
            .map_err(|e| FabricError::Connect(e.to_string()))?;

        let endpoint = if self.config.tls.enabled {
            endpoint
                .tls_config(self.tls_config()?)
                .map_err(|e| FabricError::Connect(e.to_string()))?
        } else {
            endpoint
        };

        endpoint
            .connect()
            .await
            .map_err(FabricError::Transport)
    }

    fn channel(&self) -> Result<Channel, FabricError> {
        self.channel
            .lock()
            .clone()
            .ok_or_else(|| FabricError::Connect("gateway not connected".to_string()))
    }

    fn guard_circuit(&self) -> Result<(), FabricError> {
        if !self.breaker.allow_request() {
            return Err(FabricError::CircuitOpen);
        }
        Ok(())
    }
}

#[async_trait]
impl FabricGateway for FabricGatewayClient {
    async fn connect(&self) -> Result<(), FabricError> {
        if self.channel.lock().is_some() {
            return Ok(()); // connect() is idempotent
        }
        let channel = self.dial().await?;
        *self.channel.lock() = Some(channel);
        info!(network = self.config.network.as_str(), "fabric gateway connected");
        self.health_checkpoint().await
    }

    async fn disconnect(&self) -> Result<(), FabricError> {
        *self.channel.lock() = None;
        Ok(())
    }

    async fn submit(&self, function_name: &str, args: Vec<Vec<u8>>) -> Result<SubmitOutcome, FabricError> {
        self.guard_circuit()?;
        let channel = self.channel()?;
        let mut client = GatewayClient::new(channel);

        // Generated client-side, as the real Fabric gateway SDK does, so it
        // is known before endorsement even begins and can be returned to
        // the submitter whether or not the chaincode commits.
        let tx_id = uuid::Uuid::new_v4().to_string();

        let endorse_fut = client.endorse(EndorseRequest {
            channel_id: self.config.channel.clone(),
            chaincode_id: self.config.chaincode.clone(),
            transaction_id: tx_id.clone(),
            function_name: function_name.to_string(),
            arguments: args,
        });
        let endorsed = match tokio::time::timeout(self.config.endorse_timeout(), endorse_fut).await {
            Ok(Ok(resp)) => resp.into_inner(),
            Ok(Err(status)) => {
                let err = FabricError::Status(status);
                self.record_outcome(&err);
                return Err(err);
            }
            Err(_) => {
                let err = FabricError::Timeout(self.config.endorse_timeout());
                self.record_outcome(&err);
                return Err(err);
            }
        };

        let submit_fut = client.submit(SubmitRequest {
            prepared_transaction: endorsed.prepared_transaction,
        });
        match tokio::time::timeout(self.config.submit_timeout(), submit_fut).await {
            Ok(Ok(_)) => {}
            Ok(Err(status)) => {
                let err = FabricError::Status(status);
                self.record_outcome(&err);
                return Err(err);
            }
            Err(_) => {
                let err = FabricError::Timeout(self.config.submit_timeout());
                self.record_outcome(&err);
                return Err(err);
            }
        }

        let status_fut = client.commit_status(SignedCommitStatusRequest { request: Vec::new() });
        let status = match tokio::time::timeout(self.config.submit_timeout(), status_fut).await {
            Ok(Ok(resp)) => resp.into_inner(),
            Ok(Err(status)) => {
                let err = FabricError::Status(status);
                self.record_outcome(&err);
                return Err(err);
            }
            Err(_) => {
                let err = FabricError::Timeout(self.config.submit_timeout());
                self.record_outcome(&err);
                return Err(err);
            }
        };

        if status.result != 0 {
            let err = FabricError::Chaincode(format!("commit status {}", status.result));
            self.record_outcome(&err);
            return Err(err);
        }

        self.breaker.record_success();
        Ok(SubmitOutcome {
            tx_id,
            block_number: status.block_number,
            payload: Vec::new(),
        })
    }

    async fn health_checkpoint(&self) -> Result<(), FabricError> {
        self.channel()?;
        Ok(())
    }

    fn circuit_state(&self) -> BreakerState {
        self.breaker.state()
    }

    async fn stream_events(
        &self,
        from_block: u64,
    ) -> Result<BoxStream<'static, Result<BlockchainEvent, FabricError>>, FabricError> {
        self.guard_circuit()?;
        let channel = self.channel()?;
        let mut client = GatewayClient::new(channel);

        let response = client
            .chaincode_events(SignedChaincodeEventsRequest {
                channel_id: self.config.channel.clone(),
                chaincode_id: self.config.chaincode.clone(),
                start_block: from_block,
            })
            .await
            .map_err(FabricError::Status)?;

        let breaker = self.breaker.clone();
        let stream = response.into_inner().flat_map(move |block| {
            let breaker = breaker.clone();
            let events: Vec<Result<BlockchainEvent, FabricError>> = match block {
                Ok(block) if block.block_number >= from_block => {
                    breaker.record_success();
                    block
                        .events
                        .into_iter()
                        .map(|event| {
                            Ok(BlockchainEvent {
                                event_name: event.event_name,
                                event_version: event.event_version,
                                payload: event.payload,
                                tx_id: event.tx_id,
                                block_number: block.block_number,
                                tx_index: event.tx_index,
                                event_index: event.event_index,
                                timestamp: Utc
                                    .timestamp_millis_opt(event.timestamp_unix_ms)
                                    .single()
                                    .unwrap_or_else(Utc::now),
                            })
                        })
                        .collect()
                }
                Ok(_) => Vec::new(),
                Err(status) => {
                    let err = FabricError::Status(status);
                    breaker.record_failure();
                    vec![Err(err)]
                }
            };
            futures::stream::iter(events)
        });

        Ok(Box::pin(stream))
    }
}

impl FabricGatewayClient {
    fn record_outcome(&self, err: &FabricError) {
        if err.is_retryable() || matches!(err, FabricError::PermissionDenied(_)) {
            self.breaker.record_failure();
        }
        warn!(error = %err, "fabric submit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_outcome_is_plain_data() {
        let outcome = SubmitOutcome {
            tx_id: "tx-1".to_string(),
            block_number: 42,
            payload: vec![1, 2, 3],
        };
        assert_eq!(outcome.block_number, 42);
    }
}
