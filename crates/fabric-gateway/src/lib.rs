//! Fabric Gateway Client: connection lifecycle, submission, and event
//! streaming against a selected Hyperledger Fabric network. This is the
//! leaf component — nothing else in the bridge talks to Fabric directly.

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod wallet;

mod proto {
    pub mod gateway {
        tonic::include_proto!("gateway");
    }
}

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use client::{FabricGateway, FabricGatewayClient, SubmitOutcome};
pub use config::{FabricGatewayConfig, Network, TlsConfig};
pub use error::FabricError;

#[cfg(feature = "test-util")]
pub use client::MockFabricGateway;
