use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, TenantId};

/// Lifecycle of an outbox command
///
/// Transitions: PENDING -> PROCESSING -> (COMMITTED | PENDING | FAILED).
/// Never reverses; `outbox-store` is the only crate allowed to write this
/// column and it always does so through a conditional `UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Processing,
    Committed,
    Failed,
}

impl CommandStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Processing => "processing",
            CommandStatus::Committed => "committed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CommandStatus::Pending),
            "processing" => Some(CommandStatus::Processing),
            "committed" => Some(CommandStatus::Committed),
            "failed" => Some(CommandStatus::Failed),
            _ => None,
        }
    }
}

/// What an API handler inserts to request a ledger write. `aggregate_id` is
/// required (not `Option`) — `enqueue_command` rejects a blank string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutboxCommand {
    pub tenant_id: TenantId,
    pub service: String,
    pub command_type: String,
    pub aggregate_id: AggregateId,
    pub request_id: String,
    pub payload: serde_json::Value,
}

/// A row of `outbox_commands`, as read back by the submitter or by tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxCommand {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub service: String,
    pub command_type: String,
    pub aggregate_id: AggregateId,
    pub request_id: String,
    pub payload: serde_json::Value,
    pub status: CommandStatus,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub fabric_tx_id: Option<String>,
    pub commit_block: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
