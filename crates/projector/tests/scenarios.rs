use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bridge_types::{BlockchainEvent, HealthState};
use chrono::Utc;
use event_schema::EventSchemaRegistry;
use fabric_gateway::{BreakerState, MockFabricGateway};
use futures::stream::{self, BoxStream};
use outbox_store::fake::FakeOutboxStore;
use prometheus::Registry;
use projector::{HandlerRegistry, ProjectorConfig, ProjectorMetrics, ProjectorWorker};
use tokio_util::sync::CancellationToken;

const TENANT: &str = "tenant-a";
const PROJECTOR: &str = "read-model";
const CHANNEL: &str = "mychannel";

fn config() -> ProjectorConfig {
    ProjectorConfig {
        configured_start_block: 0,
        reconnect_initial_backoff_ms: 5,
        reconnect_max_backoff_ms: 20,
        lag_budget_blocks: 50,
        strict_schema: false,
        handler_max_attempts: 2,
        handler_retry_backoff_ms: 1,
    }
}

fn event(event_name: &str, event_version: &str, block_number: u64, event_index: u32, payload: serde_json::Value) -> BlockchainEvent {
    BlockchainEvent {
        event_name: event_name.to_string(),
        event_version: event_version.to_string(),
        payload: serde_json::to_vec(&payload).unwrap(),
        tx_id: format!("tx-{block_number}-{event_index}"),
        block_number,
        tx_index: 0,
        event_index,
        timestamp: Utc::now(),
    }
}

fn raw_event(event_name: &str, block_number: u64, event_index: u32, payload: Vec<u8>) -> BlockchainEvent {
    BlockchainEvent {
        event_name: event_name.to_string(),
        event_version: "1.0".to_string(),
        payload,
        tx_id: format!("tx-{block_number}-{event_index}"),
        block_number,
        tx_index: 0,
        event_index,
        timestamp: Utc::now(),
    }
}

fn gateway_streaming(events: Vec<BlockchainEvent>) -> MockFabricGateway {
    let mut mock = MockFabricGateway::new();
    mock.expect_connect().returning(|| Ok(()));
    mock.expect_disconnect().returning(|| Ok(()));
    mock.expect_circuit_state().returning(|| BreakerState::Closed);
    mock.expect_stream_events().returning(move |_from_block| {
        let events = events.clone();
        let boxed: BoxStream<'static, Result<BlockchainEvent, fabric_gateway::FabricError>> =
            Box::pin(stream::iter(events.into_iter().map(Ok)));
        Ok(boxed)
    });
    mock
}

#[allow(clippy::too_many_arguments)]
async fn run_until_cancelled(
    store: Arc<FakeOutboxStore>,
    gateway: Arc<MockFabricGateway>,
    cfg: ProjectorConfig,
    wait_ms: u64,
) {
    let registry = Registry::new();
    let metrics = ProjectorMetrics::register(&registry).unwrap();
    let health = Arc::new(ArcSwap::from_pointee(HealthState::new()));
    let worker = ProjectorWorker::new(
        TENANT.to_string(),
        PROJECTOR.to_string(),
        CHANNEL.to_string(),
        store,
        gateway,
        Arc::new(EventSchemaRegistry::load_embedded()),
        HandlerRegistry::with_defaults(),
        cfg,
        metrics,
        health,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        cancel_clone.cancel();
    });
    let _ = worker.run(cancel).await;
}

#[tokio::test]
async fn wallet_created_applies_once_and_advances_checkpoint() {
    let store = Arc::new(FakeOutboxStore::new());
    let events = vec![event(
        "WalletCreated",
        "1.0",
        5,
        0,
        serde_json::json!({ "walletId": "wallet-A", "userId": "user-1" }),
    )];
    let gateway = gateway_streaming(events);

    run_until_cancelled(store.clone(), Arc::new(gateway), config(), 60).await;

    let wallet = store.wallet("wallet-A").expect("wallet should be projected");
    assert_eq!(wallet.owner_user_id, "user-1");
    assert_eq!(store.checkpoint(TENANT, PROJECTOR, CHANNEL), Some((5, 0)));
}

#[tokio::test]
async fn redelivered_event_is_not_reapplied() {
    let store = Arc::new(FakeOutboxStore::new());
    let create = event(
        "WalletCreated",
        "1.0",
        5,
        0,
        serde_json::json!({ "walletId": "wallet-A", "userId": "user-1" }),
    );
    let freeze = event(
        "WalletFrozen",
        "1.0",
        6,
        0,
        serde_json::json!({ "walletId": "wallet-A", "ownerUserId": "user-1" }),
    );
    // the gateway redelivers the WalletCreated event before the new one
    let events = vec![create.clone(), create, freeze];
    let gateway = gateway_streaming(events);

    run_until_cancelled(store.clone(), Arc::new(gateway), config(), 60).await;

    let wallet = store.wallet("wallet-A").unwrap();
    assert!(wallet.is_frozen);
    assert_eq!(store.checkpoint(TENANT, PROJECTOR, CHANNEL), Some((6, 0)));
}

#[tokio::test]
async fn resume_re_requests_mid_block_and_skips_already_applied_index() {
    let store = Arc::new(FakeOutboxStore::new());
    store.seed_checkpoint(TENANT, PROJECTOR, CHANNEL, 5, 0);
    let events = vec![
        event("WalletCreated", "1.0", 5, 0, serde_json::json!({ "walletId": "wallet-A", "userId": "user-1" })),
        event("WalletFrozen", "1.0", 5, 1, serde_json::json!({ "walletId": "wallet-A", "ownerUserId": "user-1" })),
    ];
    let gateway = gateway_streaming(events);

    run_until_cancelled(store.clone(), Arc::new(gateway), config(), 60).await;

    assert!(store.wallet("wallet-A").is_none(), "index 0 was already applied before this session; WalletCreated never runs again");
    let wallet_frozen_applied = store.checkpoint(TENANT, PROJECTOR, CHANNEL) == Some((5, 1));
    assert!(wallet_frozen_applied);
}

#[tokio::test]
async fn malformed_payload_goes_to_dlq_and_checkpoint_still_advances() {
    let store = Arc::new(FakeOutboxStore::new());
    let events = vec![raw_event("WalletCreated", 3, 0, b"not valid json".to_vec())];
    let gateway = gateway_streaming(events);

    run_until_cancelled(store.clone(), Arc::new(gateway), config(), 60).await;

    let rows = store.dlq_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_name, "WalletCreated");
    assert_eq!(store.checkpoint(TENANT, PROJECTOR, CHANNEL), Some((3, 0)));
}

#[tokio::test]
async fn handler_failure_exhausts_retries_then_quarantines_to_dlq() {
    let store = Arc::new(FakeOutboxStore::new());
    let events = vec![event(
        "GovernanceVoteCast",
        "1.0",
        9,
        0,
        serde_json::json!({ "proposalId": "p-1", "voterId": "voter-1", "choice": "maybe" }),
    )];
    let gateway = gateway_streaming(events);

    run_until_cancelled(store.clone(), Arc::new(gateway), config(), 60).await;

    let rows = store.dlq_rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].failure_reason.contains("maybe"));
    assert_eq!(store.checkpoint(TENANT, PROJECTOR, CHANNEL), Some((9, 0)));
}

#[tokio::test]
async fn checkpoint_conflict_from_a_racing_consumer_is_fatal() {
    let store = Arc::new(FakeOutboxStore::new());
    let store_for_race = store.clone();
    let mut mock = MockFabricGateway::new();
    mock.expect_connect().returning(|| Ok(()));
    mock.expect_disconnect().returning(|| Ok(()));
    mock.expect_circuit_state().returning(|| BreakerState::Closed);
    mock.expect_stream_events().returning(move |_from_block| {
        // simulates a second consumer advancing the checkpoint past this
        // event while this worker's stream is already in flight.
        store_for_race.seed_checkpoint(TENANT, PROJECTOR, CHANNEL, 20, 0);
        let events = vec![event(
            "WalletCreated",
            "1.0",
            10,
            0,
            serde_json::json!({ "walletId": "wallet-A", "userId": "user-1" }),
        )];
        let boxed: BoxStream<'static, Result<BlockchainEvent, fabric_gateway::FabricError>> =
            Box::pin(stream::iter(events.into_iter().map(Ok)));
        Ok(boxed)
    });

    let registry = Registry::new();
    let metrics = ProjectorMetrics::register(&registry).unwrap();
    let health = Arc::new(ArcSwap::from_pointee(HealthState::new()));
    let worker = ProjectorWorker::new(
        TENANT.to_string(),
        PROJECTOR.to_string(),
        CHANNEL.to_string(),
        store,
        Arc::new(mock),
        Arc::new(EventSchemaRegistry::load_embedded()),
        HandlerRegistry::with_defaults(),
        config(),
        metrics,
        health,
    );

    let result = worker.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(ref e) if e.kind() == bridge_types::ErrorKind::CheckpointConflict));
}
