//! Outbox Submitter: drains `outbox_commands` with at-least-once
//! delivery, bounded retries, and backpressure

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod worker;

pub use config::SubmitterConfig;
pub use error::SubmitterError;
pub use metrics::SubmitterMetrics;
pub use registry::{ChaincodeMapping, CommandRegistry};
pub use worker::SubmitterWorker;
