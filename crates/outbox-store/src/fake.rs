//! In-memory [`OutboxStore`] used by `outbox-submitter` and `projector`'s
//! test suites ( : "idempotent-replay and FIFO/uniqueness
//! properties... against an in-memory fake store implementing the same
//! trait"). Never compiled into `bin/bridge`.

use std::collections::HashMap;

use async_trait::async_trait;
use bridge_types::{CommandStatus, OutboxCommand, ReadModelEffect, TenantId, VoteChoice};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{is_expired, OutboxStore};

/// In-memory mirror of the representative read-model tables, kept as
/// plain structs rather than Diesel rows so `projector` tests can assert
/// on them without a schema dependency.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub status: String,
    pub onchain_registered_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Wallet {
    pub owner_user_id: String,
    pub cached_balance: i128,
    pub is_frozen: bool,
}

#[derive(Debug, Clone)]
pub struct TransactionLeg {
    pub on_chain_tx_id: String,
    pub side: &'static str,
    pub wallet_id: String,
    pub counterparty_wallet_id: String,
    pub amount: i128,
    pub fee: i128,
}

#[derive(Debug, Clone, Default)]
pub struct GovernanceProposal {
    pub title: String,
    pub description: Option<String>,
    pub yes_votes: i64,
    pub no_votes: i64,
}

#[derive(Default)]
struct State {
    commands: HashMap<Uuid, OutboxCommand>,
    checkpoints: HashMap<(String, String, String), (u64, i32)>,
    idempotency: HashMap<(String, String, String, String, String), (i32, serde_json::Value, chrono::DateTime<Utc>)>,
    dlq: Vec<DlqRow>,
    aggregate_locks: std::collections::HashSet<String>,
    user_profiles: HashMap<String, UserProfile>,
    wallets: HashMap<String, Wallet>,
    transactions: Vec<TransactionLeg>,
    transaction_keys: std::collections::HashSet<(String, &'static str)>,
    governance_proposals: HashMap<String, GovernanceProposal>,
    governance_votes: std::collections::HashSet<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct DlqRow {
    pub tenant_id: String,
    pub projector_name: String,
    pub channel: String,
    pub event_name: String,
    pub block_number: u64,
    pub tx_index: u32,
    pub event_index: u32,
    pub payload: Vec<u8>,
    pub failure_reason: String,
}

/// A single-process, mutex-guarded stand-in for `PgOutboxStore`. Ordering,
/// uniqueness, and monotonicity are enforced with the same rules the SQL
/// queries express, so tests exercising this fake cover the same
/// invariants the Postgres backend does.
pub struct FakeOutboxStore {
    state: Mutex<State>,
}

impl FakeOutboxStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Test helper: snapshot of every DLQ row recorded so far.
    pub fn dlq_rows(&self) -> Vec<DlqRow> {
        self.state.lock().dlq.clone()
    }

    /// Test helper: read a command back by id without going through the
    /// trait's batch-oriented API.
    pub fn get(&self, id: Uuid) -> Option<OutboxCommand> {
        self.state.lock().commands.get(&id).cloned()
    }

    /// Test helper: seed a user profile as `projector`'s tests need one to
    /// pre-exist before `ActivateUserProfile` can transition it (the
    /// profile itself is created by the API tier, never by the bridge).
    pub fn seed_user_profile(&self, fabric_user_id: &str, status: &str) {
        self.state.lock().user_profiles.insert(
            fabric_user_id.to_string(),
            UserProfile {
                status: status.to_string(),
                onchain_registered_at: None,
            },
        );
    }

    pub fn user_profile(&self, fabric_user_id: &str) -> Option<UserProfile> {
        self.state.lock().user_profiles.get(fabric_user_id).cloned()
    }

    pub fn wallet(&self, wallet_id: &str) -> Option<Wallet> {
        self.state.lock().wallets.get(wallet_id).cloned()
    }

    pub fn transaction_legs(&self) -> Vec<TransactionLeg> {
        self.state.lock().transactions.clone()
    }

    pub fn governance_proposal(&self, proposal_id: &str) -> Option<GovernanceProposal> {
        self.state.lock().governance_proposals.get(proposal_id).cloned()
    }

    pub fn checkpoint(&self, tenant_id: &str, projector_name: &str, channel: &str) -> Option<(u64, i32)> {
        self.state
            .lock()
            .checkpoints
            .get(&(tenant_id.to_string(), projector_name.to_string(), channel.to_string()))
            .copied()
    }

    /// Test helper: sets the persisted checkpoint directly, bypassing the
    /// monotonicity check `advance_checkpoint` enforces. Used to simulate
    /// a second consumer racing the same checkpoint row.
    pub fn seed_checkpoint(&self, tenant_id: &str, projector_name: &str, channel: &str, last_block: u64, last_event_index: i32) {
        self.state.lock().checkpoints.insert(
            (tenant_id.to_string(), projector_name.to_string(), channel.to_string()),
            (last_block, last_event_index),
        );
    }
}

impl Default for FakeOutboxStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboxStore for FakeOutboxStore {
    async fn enqueue_command(
        &self,
        tenant_id: &TenantId,
        service: &str,
        command_type: &str,
        aggregate_id: &str,
        request_id: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, StoreError> {
        if aggregate_id.trim().is_empty() {
            return Err(StoreError::MissingAggregateId);
        }

        let mut state = self.state.lock();
        if let Some(existing) = state.commands.values().find(|c| {
            &c.tenant_id == tenant_id && c.command_type == command_type && c.request_id == request_id
        }) {
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        state.commands.insert(
            id,
            OutboxCommand {
                id,
                tenant_id: tenant_id.clone(),
                service: service.to_string(),
                command_type: command_type.to_string(),
                aggregate_id: aggregate_id.to_string(),
                request_id: request_id.to_string(),
                payload,
                status: CommandStatus::Pending,
                attempts: 0,
                last_attempt_at: None,
                fabric_tx_id: None,
                commit_block: None,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn claim_batch(
        &self,
        limit: i64,
        max_attempts: i32,
        stale_processing_age: Duration,
    ) -> Result<Vec<OutboxCommand>, StoreError> {
        let mut state = self.state.lock();
        let now = Utc::now();

        let mut by_time: Vec<(chrono::DateTime<Utc>, Uuid)> = state
            .commands
            .values()
            .filter(|c| c.attempts < max_attempts)
            .filter(|c| match c.status {
                CommandStatus::Pending => true,
                CommandStatus::Processing => c
                    .last_attempt_at
                    .map(|at| now - at >= stale_processing_age)
                    .unwrap_or(false),
                _ => false,
            })
            .map(|c| (c.created_at, c.id))
            .collect();
        by_time.sort_by_key(|(created_at, _)| *created_at);

        let mut claimed = Vec::new();
        for (_, id) in by_time.into_iter().take(limit as usize) {
            let cmd = state.commands.get_mut(&id).expect("id came from commands map");
            cmd.status = CommandStatus::Processing;
            cmd.attempts += 1;
            cmd.last_attempt_at = Some(now);
            cmd.updated_at = now;
            claimed.push(cmd.clone());
        }
        Ok(claimed)
    }

    async fn mark_committed(
        &self,
        id: Uuid,
        fabric_tx_id: &str,
        block_number: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let cmd = state.commands.get_mut(&id).ok_or(StoreError::CommandNotFound(id))?;
        cmd.status = CommandStatus::Committed;
        cmd.fabric_tx_id = Some(fabric_tx_id.to_string());
        cmd.commit_block = Some(block_number);
        cmd.error = None;
        cmd.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retryable: bool,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let cmd = state.commands.get_mut(&id).ok_or(StoreError::CommandNotFound(id))?;
        let attempts_exhausted = retryable && cmd.attempts >= max_attempts;
        cmd.status = if retryable && !attempts_exhausted {
            CommandStatus::Pending
        } else {
            CommandStatus::Failed
        };
        // Mirrors `PgOutboxStore::mark_failed`: attempt exhaustion on a
        // retryable failure stores the literal marker, not the last error.
        cmd.error = Some(if attempts_exhausted { "max_attempts_exceeded".to_string() } else { error.to_string() });
        cmd.updated_at = Utc::now();
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        configured_start_block: u64,
    ) -> Result<(u64, i32), StoreError> {
        let state = self.state.lock();
        let key = (tenant_id.clone(), projector_name.to_string(), channel.to_string());
        Ok(state.checkpoints.get(&key).copied().unwrap_or((configured_start_block, -1)))
    }

    async fn advance_checkpoint(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        last_block: u64,
        last_event_index: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let key = (tenant_id.clone(), projector_name.to_string(), channel.to_string());
        let current = state.checkpoints.get(&key).copied().unwrap_or((0, -1));

        if !crate::checkpoint::advances(
            crate::checkpoint::Checkpoint {
                last_block: current.0,
                last_event_index: current.1,
            },
            crate::checkpoint::Checkpoint {
                last_block,
                last_event_index,
            },
        ) {
            return Err(StoreError::CheckpointConflict {
                tenant_id: tenant_id.clone(),
                projector_name: projector_name.to_string(),
                channel: channel.to_string(),
                attempted_block: last_block,
                attempted_index: last_event_index,
                current_block: current.0,
                current_index: current.1,
            });
        }

        state.checkpoints.insert(key, (last_block, last_event_index));
        Ok(())
    }

    async fn record_idempotent(
        &self,
        tenant_id: &TenantId,
        method: &str,
        path: &str,
        body_hash: &str,
        idempotency_key: &str,
        status_code: i32,
        response_body: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let key = (
            tenant_id.clone(),
            method.to_string(),
            path.to_string(),
            body_hash.to_string(),
            idempotency_key.to_string(),
        );
        // First write wins, matching the Postgres `ON CONFLICT DO NOTHING`.
        state
            .idempotency
            .entry(key)
            .or_insert((status_code, response_body, Utc::now() + ttl));
        Ok(())
    }

    async fn lookup_idempotent(
        &self,
        tenant_id: &TenantId,
        method: &str,
        path: &str,
        body_hash: &str,
        idempotency_key: &str,
    ) -> Result<Option<(i32, serde_json::Value)>, StoreError> {
        let state = self.state.lock();
        let key = (
            tenant_id.clone(),
            method.to_string(),
            path.to_string(),
            body_hash.to_string(),
            idempotency_key.to_string(),
        );
        Ok(state.idempotency.get(&key).and_then(|(status, body, expires_at)| {
            if is_expired(*expires_at, Utc::now()) {
                None
            } else {
                Some((*status, body.clone()))
            }
        }))
    }

    async fn record_dlq(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        event_name: &str,
        block_number: u64,
        tx_index: u32,
        event_index: u32,
        payload: Vec<u8>,
        failure_reason: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.dlq.push(DlqRow {
            tenant_id: tenant_id.clone(),
            projector_name: projector_name.to_string(),
            channel: channel.to_string(),
            event_name: event_name.to_string(),
            block_number,
            tx_index,
            event_index,
            payload,
            failure_reason: failure_reason.to_string(),
        });
        Ok(())
    }

    async fn try_lock_aggregate(&self, aggregate_id: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().aggregate_locks.insert(aggregate_id.to_string()))
    }

    async fn unlock_aggregate(&self, aggregate_id: &str) -> Result<(), StoreError> {
        self.state.lock().aggregate_locks.remove(aggregate_id);
        Ok(())
    }

    async fn apply_event(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        last_block: u64,
        last_event_index: i32,
        effect: ReadModelEffect,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let key = (tenant_id.clone(), projector_name.to_string(), channel.to_string());
        let current = state.checkpoints.get(&key).copied().unwrap_or((0, -1));

        if !crate::checkpoint::advances(
            crate::checkpoint::Checkpoint {
                last_block: current.0,
                last_event_index: current.1,
            },
            crate::checkpoint::Checkpoint {
                last_block,
                last_event_index,
            },
        ) {
            return Err(StoreError::CheckpointConflict {
                tenant_id: tenant_id.clone(),
                projector_name: projector_name.to_string(),
                channel: channel.to_string(),
                attempted_block: last_block,
                attempted_index: last_event_index,
                current_block: current.0,
                current_index: current.1,
            });
        }

        match effect {
            ReadModelEffect::ActivateUserProfile { fabric_user_id, onchain_registered_at } => {
                if let Some(profile) = state.user_profiles.get_mut(&fabric_user_id) {
                    profile.status = "ACTIVE".to_string();
                    profile.onchain_registered_at = Some(onchain_registered_at);
                }
            }
            ReadModelEffect::UpsertWallet { wallet_id, owner_user_id } => {
                let wallet = state.wallets.entry(wallet_id).or_default();
                wallet.owner_user_id = owner_user_id;
            }
            ReadModelEffect::ApplyTransfer {
                on_chain_tx_id,
                from_wallet_id,
                to_wallet_id,
                amount,
                fee,
                remark: _,
            } => {
                let amount: i128 = amount.parse().map_err(|_| StoreError::CheckpointConflict {
                    tenant_id: tenant_id.clone(),
                    projector_name: projector_name.to_string(),
                    channel: channel.to_string(),
                    attempted_block: last_block,
                    attempted_index: last_event_index,
                    current_block: current.0,
                    current_index: current.1,
                })?;
                let fee: i128 = fee.parse().unwrap_or(0);

                if let Some(wallet) = state.wallets.get_mut(&from_wallet_id) {
                    wallet.cached_balance -= amount + fee;
                }
                if let Some(wallet) = state.wallets.get_mut(&to_wallet_id) {
                    wallet.cached_balance += amount;
                }

                if state.transaction_keys.insert((on_chain_tx_id.clone(), "SENT")) {
                    state.transactions.push(TransactionLeg {
                        on_chain_tx_id: on_chain_tx_id.clone(),
                        side: "SENT",
                        wallet_id: from_wallet_id.clone(),
                        counterparty_wallet_id: to_wallet_id.clone(),
                        amount,
                        fee,
                    });
                }
                if state.transaction_keys.insert((on_chain_tx_id.clone(), "RECEIVED")) {
                    state.transactions.push(TransactionLeg {
                        on_chain_tx_id,
                        side: "RECEIVED",
                        wallet_id: to_wallet_id,
                        counterparty_wallet_id: from_wallet_id,
                        amount,
                        fee: 0,
                    });
                }
            }
            ReadModelEffect::SetWalletFrozen { wallet_id, owner_user_id, frozen } => {
                if let Some(wallet) = state.wallets.get_mut(&wallet_id) {
                    wallet.is_frozen = frozen;
                }
                if let Some(profile) = state.user_profiles.get_mut(&owner_user_id) {
                    profile.status = if frozen { "FROZEN" } else { "ACTIVE" }.to_string();
                }
            }
            ReadModelEffect::UpsertGovernanceProposal { proposal_id, title, description } => {
                let proposal = state.governance_proposals.entry(proposal_id).or_default();
                proposal.title = title;
                proposal.description = description;
            }
            ReadModelEffect::CastGovernanceVote { proposal_id, voter_id, choice } => {
                // Guarded by (proposal_id, voter_id): a redelivered vote is
                // a no-op, so the tally only increments once, mirroring
                // the Postgres unique-constraint behavior.
                if state.governance_votes.insert((proposal_id.clone(), voter_id)) {
                    if let Some(proposal) = state.governance_proposals.get_mut(&proposal_id) {
                        match choice {
                            VoteChoice::Yes => proposal.yes_votes += 1,
                            VoteChoice::No => proposal.no_votes += 1,
                        }
                    }
                }
            }
            ReadModelEffect::NoOp => {}
        }

        state.checkpoints.insert(key, (last_block, last_event_index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> TenantId {
        "tenant-a".to_string()
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_request_id() {
        let store = FakeOutboxStore::new();
        let a = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "wallet-1", "req-1", json!({}))
            .await
            .unwrap();
        let b = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "wallet-1", "req-1", json!({}))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(store.state.lock().commands.len(), 1);
    }

    #[tokio::test]
    async fn enqueue_rejects_blank_aggregate_id() {
        let store = FakeOutboxStore::new();
        let result = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "  ", "req-1", json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::MissingAggregateId)));
    }

    #[tokio::test]
    async fn claim_batch_returns_pending_rows_in_fifo_order() {
        let store = FakeOutboxStore::new();
        let first = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "w-1", "req-1", json!({}))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "w-1", "req-2", json!({}))
            .await
            .unwrap();

        let claimed = store.claim_batch(10, 5, Duration::seconds(30)).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].id, first);
        assert_eq!(claimed[1].id, second);
        assert!(claimed.iter().all(|c| matches!(c.status, CommandStatus::Processing)));
    }

    #[tokio::test]
    async fn mark_failed_resets_to_pending_until_max_attempts_then_fails() {
        let store = FakeOutboxStore::new();
        let id = store
            .enqueue_command(&tenant(), "api", "TRANSFER_TOKENS", "w-1", "req-1", json!({}))
            .await
            .unwrap();

        store.claim_batch(10, 2, Duration::seconds(30)).await.unwrap();
        store.mark_failed(id, "timeout", true, 2).await.unwrap();
        assert!(matches!(store.get(id).unwrap().status, CommandStatus::Pending));

        store.claim_batch(10, 2, Duration::seconds(30)).await.unwrap();
        store.mark_failed(id, "timeout", true, 2).await.unwrap();
        assert!(matches!(store.get(id).unwrap().status, CommandStatus::Failed));
    }

    #[tokio::test]
    async fn advance_checkpoint_rejects_regression() {
        let store = FakeOutboxStore::new();
        store.advance_checkpoint(&tenant(), "proj", "ch1", 10, 2).await.unwrap();
        let result = store.advance_checkpoint(&tenant(), "proj", "ch1", 9, 99).await;
        assert!(matches!(result, Err(StoreError::CheckpointConflict { .. })));
    }

    #[tokio::test]
    async fn aggregate_lock_is_exclusive_until_unlocked() {
        let store = FakeOutboxStore::new();
        assert!(store.try_lock_aggregate("wallet-1").await.unwrap());
        assert!(!store.try_lock_aggregate("wallet-1").await.unwrap());
        store.unlock_aggregate("wallet-1").await.unwrap();
        assert!(store.try_lock_aggregate("wallet-1").await.unwrap());
    }

    #[tokio::test]
    async fn idempotent_lookup_returns_stored_response_once_recorded() {
        let store = FakeOutboxStore::new();
        assert!(store
            .lookup_idempotent(&tenant(), "POST", "/transfer", "hash-1", "K-9")
            .await
            .unwrap()
            .is_none());

        store
            .record_idempotent(&tenant(), "POST", "/transfer", "hash-1", "K-9", 200, json!({"ok": true}), Duration::hours(24))
            .await
            .unwrap();

        let (status, body) = store
            .lookup_idempotent(&tenant(), "POST", "/transfer", "hash-1", "K-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn apply_event_activates_profile_and_advances_checkpoint_atomically() {
        let store = FakeOutboxStore::new();
        store.seed_user_profile("user-1", "PENDING");

        store
            .apply_event(
                &tenant(),
                "read-model",
                "mychannel",
                10,
                0,
                ReadModelEffect::ActivateUserProfile {
                    fabric_user_id: "user-1".to_string(),
                    onchain_registered_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.user_profile("user-1").unwrap().status, "ACTIVE");
        assert_eq!(store.checkpoint("tenant-a", "read-model", "mychannel"), Some((10, 0)));
    }

    #[tokio::test]
    async fn apply_event_rejects_checkpoint_regression_and_leaves_state_untouched() {
        let store = FakeOutboxStore::new();
        store
            .apply_event(&tenant(), "read-model", "ch", 10, 5, ReadModelEffect::NoOp)
            .await
            .unwrap();

        let result = store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                10,
                4,
                ReadModelEffect::UpsertWallet {
                    wallet_id: "w-1".to_string(),
                    owner_user_id: "user-1".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::CheckpointConflict { .. })));
        assert!(store.wallet("w-1").is_none());
    }

    #[tokio::test]
    async fn apply_event_transfer_moves_balances_and_records_both_legs() {
        let store = FakeOutboxStore::new();
        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                1,
                0,
                ReadModelEffect::UpsertWallet {
                    wallet_id: "w-from".to_string(),
                    owner_user_id: "user-a".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                2,
                0,
                ReadModelEffect::UpsertWallet {
                    wallet_id: "w-to".to_string(),
                    owner_user_id: "user-b".to_string(),
                },
            )
            .await
            .unwrap();

        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                3,
                0,
                ReadModelEffect::ApplyTransfer {
                    on_chain_tx_id: "tx-1".to_string(),
                    from_wallet_id: "w-from".to_string(),
                    to_wallet_id: "w-to".to_string(),
                    amount: "100".to_string(),
                    fee: "1".to_string(),
                    remark: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.wallet("w-from").unwrap().cached_balance, -101);
        assert_eq!(store.wallet("w-to").unwrap().cached_balance, 100);
        assert_eq!(store.transaction_legs().len(), 2);

        // Redelivery of the same event is a no-op against the ledger legs.
        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                3,
                0,
                ReadModelEffect::ApplyTransfer {
                    on_chain_tx_id: "tx-1".to_string(),
                    from_wallet_id: "w-from".to_string(),
                    to_wallet_id: "w-to".to_string(),
                    amount: "100".to_string(),
                    fee: "1".to_string(),
                    remark: None,
                },
            )
            .await;
        assert_eq!(store.transaction_legs().len(), 2);
    }

    #[tokio::test]
    async fn apply_event_vote_is_counted_once_per_voter() {
        let store = FakeOutboxStore::new();
        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                1,
                0,
                ReadModelEffect::UpsertGovernanceProposal {
                    proposal_id: "prop-1".to_string(),
                    title: "Raise fee cap".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();

        store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                2,
                0,
                ReadModelEffect::CastGovernanceVote {
                    proposal_id: "prop-1".to_string(),
                    voter_id: "user-a".to_string(),
                    choice: VoteChoice::Yes,
                },
            )
            .await
            .unwrap();

        // A redelivered vote from the same voter must not double-count.
        let _ = store
            .apply_event(
                &tenant(),
                "read-model",
                "ch",
                2,
                0,
                ReadModelEffect::CastGovernanceVote {
                    proposal_id: "prop-1".to_string(),
                    voter_id: "user-a".to_string(),
                    choice: VoteChoice::Yes,
                },
            )
            .await;

        let proposal = store.governance_proposal("prop-1").unwrap();
        assert_eq!(proposal.yes_votes, 1);
        assert_eq!(proposal.no_votes, 0);
    }
}
