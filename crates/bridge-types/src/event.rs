use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chaincode event delivered by the Fabric gateway's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainEvent {
    pub event_name: String,
    /// Real schema version carried on the wire, never hardcoded.
    pub event_version: String,
    /// Raw UTF-8 JSON payload; decoding happens in the projector so that a
    /// malformed payload can be recorded to the DLQ without losing the
    /// envelope metadata needed to advance the checkpoint past it.
    pub payload: Vec<u8>,
    pub tx_id: String,
    pub block_number: u64,
    pub tx_index: u32,
    pub event_index: u32,
    pub timestamp: DateTime<Utc>,
}

/// `(block_number, event_index)` pair matching the gateway's
/// `(blockNumber asc, txIndex asc, eventIndex asc)` stream order, used
/// by the projector to filter already-applied redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventCursor {
    pub block_number: u64,
    pub event_index: i32,
}

impl BlockchainEvent {
    pub fn cursor(&self) -> EventCursor {
        EventCursor {
            block_number: self.block_number,
            event_index: self.event_index as i32,
        }
    }
}
