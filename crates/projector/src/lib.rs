//! Projector: streams chaincode events from the Fabric gateway's block
//! stream, validates them against the event schema registry, and applies
//! idempotent read-model updates with exactly-once effect per
//! `(block, txIndex, eventIndex)`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod worker;

pub use config::ProjectorConfig;
pub use error::ProjectorError;
pub use handlers::{Handler, HandlerRegistry};
pub use metrics::ProjectorMetrics;
pub use worker::ProjectorWorker;
