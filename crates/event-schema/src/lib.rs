//! Event Schema Registry: validates chaincode event payloads against a
//! named, versioned schema set before projection
//! Validation is advisory by default — a mismatch is logged and counted,
//! never a reason to stall the projector.

mod registry;

pub use registry::{EventEnvelope, EventSchemaRegistry, ValidationOutcome};
