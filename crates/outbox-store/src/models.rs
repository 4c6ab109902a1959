use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::{http_idempotency, outbox_commands, outbox_projector_state};

/// `claim_batch` loads this via `diesel::sql_query(...).load(...)` rather
/// than the query DSL (it needs `FOR UPDATE SKIP LOCKED` inside a
/// subselect), so it must derive `QueryableByName`, not just `Queryable`.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = outbox_commands)]
pub struct OutboxCommandRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub service: String,
    pub command_type: String,
    pub aggregate_id: String,
    pub request_id: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub fabric_tx_id: Option<String>,
    pub commit_block: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OutboxCommandRow> for bridge_types::OutboxCommand {
    fn from(row: OutboxCommandRow) -> Self {
        bridge_types::OutboxCommand {
            id: row.id,
            tenant_id: row.tenant_id,
            service: row.service,
            command_type: row.command_type,
            aggregate_id: row.aggregate_id,
            request_id: row.request_id,
            payload: row.payload,
            status: bridge_types::CommandStatus::from_db_str(&row.status)
                .unwrap_or(bridge_types::CommandStatus::Pending),
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            fabric_tx_id: row.fabric_tx_id,
            commit_block: row.commit_block,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_commands)]
pub struct NewOutboxCommandRow<'a> {
    pub tenant_id: &'a str,
    pub service: &'a str,
    pub command_type: &'a str,
    pub aggregate_id: &'a str,
    pub request_id: &'a str,
    pub payload: &'a serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = outbox_projector_state)]
pub struct ProjectorStateRow {
    pub tenant_id: String,
    pub projector_name: String,
    pub channel: String,
    pub last_block: BigDecimal,
    pub last_event_index: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = http_idempotency)]
pub struct HttpIdempotencyRow {
    pub tenant_id: String,
    pub method: String,
    pub path: String,
    pub body_hash: String,
    pub idempotency_key: String,
    pub status_code: i32,
    pub response_body: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
