//! Domain types shared across the bridge's crates.
//!
//! Nothing here owns I/O. Every type is a plain value the store, gateway,
//! submitter and projector crates agree on, so that none of them need to
//! depend on each other to talk about a command or an event.

pub mod command;
pub mod effect;
pub mod error;
pub mod event;
pub mod health;

pub use command::{CommandStatus, NewOutboxCommand, OutboxCommand};
pub use effect::{ReadModelEffect, VoteChoice};
pub use error::ErrorKind;
pub use event::{BlockchainEvent, EventCursor};
pub use health::HealthState;

/// Opaque tenant identifier. A `String` rather than a `Uuid` because the
/// API tier that produces commands is free to use whatever scheme it likes;
/// the bridge never interprets it beyond equality.
pub type TenantId = String;

/// Identifies the aggregate (e.g. a single wallet) a command or event
/// belongs to. Mandatory on every `OutboxCommand`, unlike an optional
/// `aggregateId` that callers could leave unset.
pub type AggregateId = String;
