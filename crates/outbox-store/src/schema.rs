// Hand-maintained alongside migrations/0001_init rather than generated by
// `diesel print-schema`, since this workspace has no live database to
// introspect at transform time. Column order and types mirror the `up.sql`
// exactly.

diesel::table! {
    outbox_commands (id) {
        id -> Uuid,
        tenant_id -> Text,
        service -> Text,
        command_type -> Text,
        aggregate_id -> Text,
        request_id -> Text,
        payload -> Jsonb,
        status -> Text,
        attempts -> Integer,
        last_attempt_at -> Nullable<Timestamptz>,
        fabric_tx_id -> Nullable<Text>,
        commit_block -> Nullable<BigInt>,
        error -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    http_idempotency (tenant_id, method, path, body_hash, idempotency_key) {
        tenant_id -> Text,
        method -> Text,
        path -> Text,
        body_hash -> Text,
        idempotency_key -> Text,
        status_code -> Integer,
        response_body -> Jsonb,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    outbox_projector_state (tenant_id, projector_name, channel) {
        tenant_id -> Text,
        projector_name -> Text,
        channel -> Text,
        last_block -> Numeric,
        last_event_index -> Integer,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    event_dlq (id) {
        id -> Uuid,
        tenant_id -> Text,
        projector_name -> Text,
        channel -> Text,
        event_name -> Text,
        block_number -> Numeric,
        tx_index -> Integer,
        event_index -> Integer,
        payload -> Binary,
        failure_reason -> Text,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    user_profiles (fabric_user_id) {
        fabric_user_id -> Text,
        status -> Text,
        onchain_registered_at -> Nullable<Timestamptz>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    wallets (wallet_id) {
        wallet_id -> Text,
        owner_user_id -> Text,
        cached_balance -> Numeric,
        is_frozen -> Bool,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    transaction_history (on_chain_tx_id, side) {
        on_chain_tx_id -> Text,
        side -> Text,
        wallet_id -> Text,
        counterparty_wallet_id -> Text,
        amount -> Numeric,
        fee -> Numeric,
        remark -> Nullable<Text>,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    governance_proposals (proposal_id) {
        proposal_id -> Text,
        title -> Text,
        description -> Nullable<Text>,
        status -> Text,
        yes_votes -> BigInt,
        no_votes -> BigInt,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    governance_votes (proposal_id, voter_id) {
        proposal_id -> Text,
        voter_id -> Text,
        choice -> Text,
        recorded_at -> Timestamptz,
    }
}
