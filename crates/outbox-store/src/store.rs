use async_trait::async_trait;
use bridge_types::{OutboxCommand, ReadModelEffect, TenantId};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::StoreError;

/// The relational persistence contract used by
/// `outbox-submitter` and `projector`. Both a Postgres-backed
/// implementation ([`PgOutboxStore`]) and an in-memory one
/// ([`crate::fake::FakeOutboxStore`]) implement this trait, so the
/// submitter/projector's business logic can be exercised without a live
/// database.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue_command(
        &self,
        tenant_id: &TenantId,
        service: &str,
        command_type: &str,
        aggregate_id: &str,
        request_id: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, StoreError>;

    async fn claim_batch(
        &self,
        limit: i64,
        max_attempts: i32,
        stale_processing_age: Duration,
    ) -> Result<Vec<OutboxCommand>, StoreError>;

    async fn mark_committed(
        &self,
        id: Uuid,
        fabric_tx_id: &str,
        block_number: i64,
    ) -> Result<(), StoreError>;

    /// `retryable = true` resets the row to PENDING iff `attempts <
    /// max_attempts`, otherwise (or when `retryable = false`) transitions
    /// it to FAILED
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retryable: bool,
        max_attempts: i32,
    ) -> Result<(), StoreError>;

    async fn load_checkpoint(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        configured_start_block: u64,
    ) -> Result<(u64, i32), StoreError>;

    /// Enforces checkpoint monotonicity itself rather than trusting the caller.
    /// Returns `Err(StoreError::CheckpointConflict)` if `(last_block,
    /// last_event_index)` would regress relative to the stored value.
    async fn advance_checkpoint(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        last_block: u64,
        last_event_index: i32,
    ) -> Result<(), StoreError>;

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
    ) -> Result<(), StoreError>;

    async fn lookup_idempotent(
        &self,
        tenant_id: &TenantId,
        method: &str,
        path: &str,
        body_hash: &str,
        idempotency_key: &str,
    ) -> Result<Option<(i32, serde_json::Value)>, StoreError>;

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
    ) -> Result<(), StoreError>;

    /// Session-scoped advisory lock keyed by `aggregate_id`, the FIFO
    /// strategy calls "(a) serialize all claims for a given
    /// `aggregateId`". Returns `false` without blocking if another worker
    /// already holds it. Unused when the submitter runs in
    /// `single_worker_mode`.
    async fn try_lock_aggregate(&self, aggregate_id: &str) -> Result<bool, StoreError>;

    async fn unlock_aggregate(&self, aggregate_id: &str) -> Result<(), StoreError>;

    /// Applies one projected read-model mutation and advances the
    /// checkpoint to `(last_block, last_event_index)` in a single
    /// transaction, the exactly-once-effect boundary the projector relies on.
    /// Returns `Err(StoreError::CheckpointConflict)` under the same
    /// conditional-update rule as `advance_checkpoint` if the proposed
    /// checkpoint does not strictly advance ( : a second
    /// consumer on the same checkpoint row is an invariant violation, not
    /// a retry).
    async fn apply_event(
        &self,
        tenant_id: &TenantId,
        projector_name: &str,
        channel: &str,
        last_block: u64,
        last_event_index: i32,
        effect: bridge_types::ReadModelEffect,
    ) -> Result<(), StoreError>;
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

#[cfg(feature = "postgres")]
pub mod postgres {
    use super::*;
    use bigdecimal::{BigDecimal, ToPrimitive};
    use diesel::prelude::*;
    use diesel_async::pooled_connection::bb8::Pool;
    use diesel_async::scoped_futures::ScopedFutureExt;
    use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

    use crate::models::{HttpIdempotencyRow, NewOutboxCommandRow, OutboxCommandRow};
    use crate::schema::{event_dlq, http_idempotency, outbox_commands, outbox_projector_state};

    /// Diesel-async + bb8 backed implementation Each
    /// worker in `bin/bridge` constructs its own pool (separate submitter
    /// and projector pools priority-inversion note).
    pub struct PgOutboxStore {
        pool: Pool<AsyncPgConnection>,
    }

    impl PgOutboxStore {
        pub fn new(pool: Pool<AsyncPgConnection>) -> Self {
            Self { pool }
        }

        async fn conn(
            &self,
        ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, StoreError>
        {
            self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
        }
    }

    #[async_trait]
    impl OutboxStore for PgOutboxStore {
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

            let mut conn = self.conn().await?;
            let new_row = NewOutboxCommandRow {
                tenant_id,
                service,
                command_type,
                aggregate_id,
                request_id,
                payload: &payload,
            };

            // ON CONFLICT (tenant_id, command_type, request_id) DO UPDATE
            // SET updated_at = updated_at — a no-op write that still
            // returns the existing id, keeping enqueue idempotent.
            let id: Uuid = diesel::insert_into(outbox_commands::table)
                .values(&new_row)
                .on_conflict((
                    outbox_commands::tenant_id,
                    outbox_commands::command_type,
                    outbox_commands::request_id,
                ))
                .do_update()
                .set(outbox_commands::updated_at.eq(outbox_commands::updated_at))
                .returning(outbox_commands::id)
                .get_result(&mut conn)
                .await?;

            Ok(id)
        }

        async fn claim_batch(
            &self,
            limit: i64,
            max_attempts: i32,
            stale_processing_age: Duration,
        ) -> Result<Vec<OutboxCommand>, StoreError> {
            let mut conn = self.conn().await?;
            let stale_seconds = stale_processing_age.num_seconds();

            // `FOR UPDATE SKIP LOCKED` is the row-level locking primitive
            // calls for, preventing two workers from claiming
            // the same row.
            let rows: Vec<OutboxCommandRow> = diesel::sql_query(
                "UPDATE outbox_commands SET status = 'processing', attempts = attempts + 1, \
                 last_attempt_at = now(), updated_at = now() \
                 WHERE id IN ( \
                   SELECT id FROM outbox_commands \
                   WHERE (status = 'pending') \
                      OR (status = 'processing' AND last_attempt_at < now() - ($2 || ' seconds')::interval) \
                   ORDER BY created_at ASC LIMIT $1 FOR UPDATE SKIP LOCKED \
                 ) AND attempts < $3 \
                 RETURNING *",
            )
            .bind::<diesel::sql_types::BigInt, _>(limit)
            .bind::<diesel::sql_types::Text, _>(stale_seconds.to_string())
            .bind::<diesel::sql_types::Integer, _>(max_attempts)
            .load(&mut conn)
            .await?;

            Ok(rows.into_iter().map(Into::into).collect())
        }

        async fn mark_committed(
            &self,
            id: Uuid,
            fabric_tx_id: &str,
            block_number: i64,
        ) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            diesel::update(outbox_commands::table.find(id))
                .set((
                    outbox_commands::status.eq("committed"),
                    outbox_commands::fabric_tx_id.eq(fabric_tx_id),
                    outbox_commands::commit_block.eq(block_number),
                    outbox_commands::error.eq(Option::<String>::None),
                    outbox_commands::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        }

        async fn mark_failed(
            &self,
            id: Uuid,
            error: &str,
            retryable: bool,
            max_attempts: i32,
        ) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            conn.transaction::<_, StoreError, _>(|conn| {
                async move {
                    let current: OutboxCommandRow = outbox_commands::table
                        .find(id)
                        .select(OutboxCommandRow::as_select())
                        .first(conn)
                        .await?;

                    let attempts_exhausted = retryable && current.attempts >= max_attempts;
                    let next_status = if retryable && !attempts_exhausted { "pending" } else { "failed" };

                    // A retryable failure forced terminal by attempt exhaustion
                    // gets the literal `max_attempts_exceeded` marker rather
                    // than the last submit error, per the failure semantics;
                    // a non-retryable rejection keeps its own error message.
                    let stored_error = if attempts_exhausted { "max_attempts_exceeded" } else { error };

                    diesel::update(outbox_commands::table.find(id))
                        .set((
                            outbox_commands::status.eq(next_status),
                            outbox_commands::error.eq(stored_error),
                            outbox_commands::updated_at.eq(diesel::dsl::now),
                        ))
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
        }

        async fn load_checkpoint(
            &self,
            tenant_id: &TenantId,
            projector_name: &str,
            channel: &str,
            configured_start_block: u64,
        ) -> Result<(u64, i32), StoreError> {
            let mut conn = self.conn().await?;
            let row: Option<(BigDecimal, i32)> = outbox_projector_state::table
                .filter(outbox_projector_state::tenant_id.eq(tenant_id))
                .filter(outbox_projector_state::projector_name.eq(projector_name))
                .filter(outbox_projector_state::channel.eq(channel))
                .select((
                    outbox_projector_state::last_block,
                    outbox_projector_state::last_event_index,
                ))
                .first(&mut conn)
                .await
                .optional()?;

            match row {
                Some((last_block, last_event_index)) => {
                    let last_block = last_block.to_u64().unwrap_or(configured_start_block);
                    Ok((last_block, last_event_index))
                }
                None => Ok((configured_start_block, -1)),
            }
        }

        async fn advance_checkpoint(
            &self,
            tenant_id: &TenantId,
            projector_name: &str,
            channel: &str,
            last_block: u64,
            last_event_index: i32,
        ) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            let affected = diesel::sql_query(
                "INSERT INTO outbox_projector_state (tenant_id, projector_name, channel, last_block, last_event_index) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (tenant_id, projector_name, channel) DO UPDATE \
                 SET last_block = EXCLUDED.last_block, last_event_index = EXCLUDED.last_event_index, updated_at = now() \
                 WHERE (EXCLUDED.last_block, EXCLUDED.last_event_index) > \
                       (outbox_projector_state.last_block, outbox_projector_state.last_event_index)",
            )
            .bind::<diesel::sql_types::Text, _>(tenant_id)
            .bind::<diesel::sql_types::Text, _>(projector_name)
            .bind::<diesel::sql_types::Text, _>(channel)
            .bind::<diesel::sql_types::Numeric, _>(BigDecimal::from(last_block))
            .bind::<diesel::sql_types::Integer, _>(last_event_index)
            .execute(&mut conn)
            .await?;

            if affected == 0 {
                let (current_block, current_index) =
                    self.load_checkpoint(tenant_id, projector_name, channel, 0).await?;
                return Err(StoreError::CheckpointConflict {
                    tenant_id: tenant_id.clone(),
                    projector_name: projector_name.to_string(),
                    channel: channel.to_string(),
                    attempted_block: last_block,
                    attempted_index: last_event_index,
                    current_block,
                    current_index,
                });
            }
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
            let mut conn = self.conn().await?;
            let expires_at = Utc::now() + ttl;
            diesel::insert_into(http_idempotency::table)
                .values((
                    http_idempotency::tenant_id.eq(tenant_id),
                    http_idempotency::method.eq(method),
                    http_idempotency::path.eq(path),
                    http_idempotency::body_hash.eq(body_hash),
                    http_idempotency::idempotency_key.eq(idempotency_key),
                    http_idempotency::status_code.eq(status_code),
                    http_idempotency::response_body.eq(response_body),
                    http_idempotency::expires_at.eq(expires_at),
                ))
                .on_conflict((
                    http_idempotency::tenant_id,
                    http_idempotency::method,
                    http_idempotency::path,
                    http_idempotency::body_hash,
                    http_idempotency::idempotency_key,
                ))
                .do_nothing()
                .execute(&mut conn)
                .await?;
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
            let mut conn = self.conn().await?;
            let row: Option<HttpIdempotencyRow> = http_idempotency::table
                .find((tenant_id, method, path, body_hash, idempotency_key))
                .select(HttpIdempotencyRow::as_select())
                .first(&mut conn)
                .await
                .optional()?;

            Ok(row
                .filter(|row| !is_expired(row.expires_at, Utc::now()))
                .map(|row| (row.status_code, row.response_body)))
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
            let mut conn = self.conn().await?;
            diesel::insert_into(event_dlq::table)
                .values((
                    event_dlq::tenant_id.eq(tenant_id),
                    event_dlq::projector_name.eq(projector_name),
                    event_dlq::channel.eq(channel),
                    event_dlq::event_name.eq(event_name),
                    event_dlq::block_number.eq(BigDecimal::from(block_number)),
                    event_dlq::tx_index.eq(tx_index as i32),
                    event_dlq::event_index.eq(event_index as i32),
                    event_dlq::payload.eq(payload),
                    event_dlq::failure_reason.eq(failure_reason),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        }

        // `pg_try_advisory_lock`/`pg_advisory_unlock` are scoped to the
        // session holding them. Because `self.conn()` checks a connection
        // back out to the bb8 pool on drop rather than pinning one for the
        // worker's whole claim/submit/release sequence, this pairing is
        // only safe when pool size >= concurrent in-flight aggregates, so
        // the lock and its matching unlock are unlikely to land on the
        // same physical connection across a busy worker. Tracked as an
        // open item in DESIGN.md; `submitter.single_worker_mode` sidesteps
        // it entirely by removing the need for cross-worker exclusion.
        async fn try_lock_aggregate(&self, aggregate_id: &str) -> Result<bool, StoreError> {
            let mut conn = self.conn().await?;
            #[derive(QueryableByName)]
            struct Locked {
                #[diesel(sql_type = diesel::sql_types::Bool)]
                locked: bool,
            }
            let result: Locked = diesel::sql_query(
                "SELECT pg_try_advisory_lock(hashtext($1)::bigint) AS locked",
            )
            .bind::<diesel::sql_types::Text, _>(aggregate_id)
            .get_result(&mut conn)
            .await?;
            Ok(result.locked)
        }

        async fn unlock_aggregate(&self, aggregate_id: &str) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            diesel::sql_query("SELECT pg_advisory_unlock(hashtext($1)::bigint)")
                .bind::<diesel::sql_types::Text, _>(aggregate_id)
                .execute(&mut conn)
                .await?;
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
            use crate::schema::{governance_proposals, governance_votes, transaction_history, user_profiles, wallets};

            let mut conn = self.conn().await?;
            let tenant_id = tenant_id.clone();
            let projector_name = projector_name.to_string();
            let channel = channel.to_string();

            conn.transaction::<_, StoreError, _>(|conn| {
                async move {
                    match effect {
                        ReadModelEffect::ActivateUserProfile { fabric_user_id, onchain_registered_at } => {
                            diesel::update(user_profiles::table.find(&fabric_user_id))
                                .set((
                                    user_profiles::status.eq("ACTIVE"),
                                    user_profiles::onchain_registered_at.eq(onchain_registered_at),
                                    user_profiles::updated_at.eq(diesel::dsl::now),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        ReadModelEffect::UpsertWallet { wallet_id, owner_user_id } => {
                            diesel::insert_into(wallets::table)
                                .values((
                                    wallets::wallet_id.eq(&wallet_id),
                                    wallets::owner_user_id.eq(&owner_user_id),
                                ))
                                .on_conflict(wallets::wallet_id)
                                .do_update()
                                .set(wallets::owner_user_id.eq(&owner_user_id))
                                .execute(conn)
                                .await?;
                        }
                        ReadModelEffect::ApplyTransfer {
                            on_chain_tx_id,
                            from_wallet_id,
                            to_wallet_id,
                            amount,
                            fee,
                            remark,
                        } => {
                            let amount_dec: BigDecimal = amount
                                .parse()
                                .map_err(|_| diesel::result::Error::RollbackTransaction)?;
                            let fee_dec: BigDecimal = fee
                                .parse()
                                .map_err(|_| diesel::result::Error::RollbackTransaction)?;
                            let debit = amount_dec.clone() + fee_dec.clone();

                            diesel::update(wallets::table.find(&from_wallet_id))
                                .set(wallets::cached_balance.eq(wallets::cached_balance - &debit))
                                .execute(conn)
                                .await?;
                            diesel::update(wallets::table.find(&to_wallet_id))
                                .set(wallets::cached_balance.eq(wallets::cached_balance + &amount_dec))
                                .execute(conn)
                                .await?;

                            diesel::insert_into(transaction_history::table)
                                .values((
                                    transaction_history::on_chain_tx_id.eq(&on_chain_tx_id),
                                    transaction_history::side.eq("SENT"),
                                    transaction_history::wallet_id.eq(&from_wallet_id),
                                    transaction_history::counterparty_wallet_id.eq(&to_wallet_id),
                                    transaction_history::amount.eq(&amount_dec),
                                    transaction_history::fee.eq(&fee_dec),
                                    transaction_history::remark.eq(&remark),
                                ))
                                .on_conflict_do_nothing()
                                .execute(conn)
                                .await?;
                            diesel::insert_into(transaction_history::table)
                                .values((
                                    transaction_history::on_chain_tx_id.eq(&on_chain_tx_id),
                                    transaction_history::side.eq("RECEIVED"),
                                    transaction_history::wallet_id.eq(&to_wallet_id),
                                    transaction_history::counterparty_wallet_id.eq(&from_wallet_id),
                                    transaction_history::amount.eq(&amount_dec),
                                    transaction_history::fee.eq(BigDecimal::from(0)),
                                    transaction_history::remark.eq(&remark),
                                ))
                                .on_conflict_do_nothing()
                                .execute(conn)
                                .await?;
                        }
                        ReadModelEffect::SetWalletFrozen { wallet_id, owner_user_id, frozen } => {
                            diesel::update(wallets::table.find(&wallet_id))
                                .set(wallets::is_frozen.eq(frozen))
                                .execute(conn)
                                .await?;
                            diesel::update(user_profiles::table.find(&owner_user_id))
                                .set(user_profiles::status.eq(if frozen { "FROZEN" } else { "ACTIVE" }))
                                .execute(conn)
                                .await?;
                        }
                        ReadModelEffect::UpsertGovernanceProposal { proposal_id, title, description } => {
                            diesel::insert_into(governance_proposals::table)
                                .values((
                                    governance_proposals::proposal_id.eq(&proposal_id),
                                    governance_proposals::title.eq(&title),
                                    governance_proposals::description.eq(&description),
                                ))
                                .on_conflict(governance_proposals::proposal_id)
                                .do_update()
                                .set((
                                    governance_proposals::title.eq(&title),
                                    governance_proposals::description.eq(&description),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        ReadModelEffect::CastGovernanceVote { proposal_id, voter_id, choice } => {
                            let inserted = diesel::insert_into(governance_votes::table)
                                .values((
                                    governance_votes::proposal_id.eq(&proposal_id),
                                    governance_votes::voter_id.eq(&voter_id),
                                    governance_votes::choice.eq(choice_label(choice)),
                                ))
                                .on_conflict_do_nothing()
                                .execute(conn)
                                .await?;
                            // Guarded by the (proposal_id, voter_id) unique
                            // constraint: a redelivered vote is a no-op
                            // insert, so the tally only increments once.
                            if inserted > 0 {
                                let column = match choice {
                                    bridge_types::VoteChoice::Yes => governance_proposals::yes_votes,
                                    bridge_types::VoteChoice::No => governance_proposals::no_votes,
                                };
                                diesel::update(governance_proposals::table.find(&proposal_id))
                                    .set(column.eq(column + 1))
                                    .execute(conn)
                                    .await?;
                            }
                        }
                        ReadModelEffect::NoOp => {}
                    }

                    let affected = diesel::sql_query(
                        "INSERT INTO outbox_projector_state (tenant_id, projector_name, channel, last_block, last_event_index) \
                         VALUES ($1, $2, $3, $4, $5) \
                         ON CONFLICT (tenant_id, projector_name, channel) DO UPDATE \
                         SET last_block = EXCLUDED.last_block, last_event_index = EXCLUDED.last_event_index, updated_at = now() \
                         WHERE (EXCLUDED.last_block, EXCLUDED.last_event_index) > \
                               (outbox_projector_state.last_block, outbox_projector_state.last_event_index)",
                    )
                    .bind::<diesel::sql_types::Text, _>(&tenant_id)
                    .bind::<diesel::sql_types::Text, _>(&projector_name)
                    .bind::<diesel::sql_types::Text, _>(&channel)
                    .bind::<diesel::sql_types::Numeric, _>(BigDecimal::from(last_block))
                    .bind::<diesel::sql_types::Integer, _>(last_event_index)
                    .execute(conn)
                    .await?;

                    if affected == 0 {
                        return Err(StoreError::CheckpointConflict {
                            tenant_id: tenant_id.clone(),
                            projector_name: projector_name.clone(),
                            channel: channel.clone(),
                            attempted_block: last_block,
                            attempted_index: last_event_index,
                            current_block: 0,
                            current_index: 0,
                        });
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
        }
    }

    fn choice_label(choice: bridge_types::VoteChoice) -> &'static str {
        match choice {
            bridge_types::VoteChoice::Yes => "YES",
            bridge_types::VoteChoice::No => "NO",
        }
    }
}
