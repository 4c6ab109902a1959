use std::sync::Arc;

use arc_swap::ArcSwap;
use bridge_types::HealthState;
use fabric_gateway::{FabricError, MockFabricGateway, SubmitOutcome};
use outbox_store::fake::FakeOutboxStore;
use outbox_store::OutboxStore;
use outbox_submitter::{CommandRegistry, SubmitterConfig, SubmitterMetrics, SubmitterWorker};
use prometheus::Registry;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn config() -> SubmitterConfig {
    SubmitterConfig {
        batch_size: 10,
        max_attempts: 3,
        stale_processing_age_ms: 60_000,
        poll_interval_ms: 5,
        single_worker_mode: true,
    }
}

async fn run_one_pass(
    store: Arc<FakeOutboxStore>,
    gateway: Arc<MockFabricGateway>,
    cfg: SubmitterConfig,
) {
    let registry = Registry::new();
    let metrics = SubmitterMetrics::register(&registry).unwrap();
    let health = Arc::new(ArcSwap::from_pointee(HealthState::new()));
    let worker = SubmitterWorker::new(
        "tenant-a".to_string(),
        store,
        gateway,
        CommandRegistry::with_defaults(),
        cfg,
        metrics,
        health,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        cancel_clone.cancel();
    });
    worker.run(cancel).await;
}

#[tokio::test]
async fn happy_path_transfer_commits_with_fabric_tx_id() {
    let store = Arc::new(FakeOutboxStore::new());
    let id = store
        .enqueue_command(
            &"tenant-a".to_string(),
            "api",
            "TRANSFER_TOKENS",
            "wallet-A",
            "r-1",
            json!({ "fromUserId": "U-A", "toUserId": "U-B", "amount": 100, "remark": "test" }),
        )
        .await
        .unwrap();

    let mut mock = MockFabricGateway::new();
    mock.expect_submit().returning(|_, _| {
        Ok(SubmitOutcome {
            tx_id: "tx-123".to_string(),
            block_number: 42,
            payload: Vec::new(),
        })
    });
    mock.expect_circuit_state().returning(|| fabric_gateway::BreakerState::Closed);

    run_one_pass(store.clone(), Arc::new(mock), config()).await;

    let committed = store.get(id).unwrap();
    assert!(matches!(committed.status, bridge_types::CommandStatus::Committed));
    assert_eq!(committed.fabric_tx_id.as_deref(), Some("tx-123"));
    assert_eq!(committed.commit_block, Some(42));
}

#[tokio::test]
async fn chaincode_rejection_fails_without_retry() {
    let store = Arc::new(FakeOutboxStore::new());
    let id = store
        .enqueue_command(
            &"tenant-a".to_string(),
            "api",
            "TRANSFER_TOKENS",
            "wallet-A",
            "r-2",
            json!({ "fromUserId": "U-A", "toUserId": "U-B", "amount": 999_999_999, "remark": "" }),
        )
        .await
        .unwrap();

    let mut mock = MockFabricGateway::new();
    mock.expect_submit()
        .returning(|_, _| Err(FabricError::Chaincode("insufficient balance".to_string())));
    mock.expect_circuit_state().returning(|| fabric_gateway::BreakerState::Closed);

    run_one_pass(store.clone(), Arc::new(mock), config()).await;

    let failed = store.get(id).unwrap();
    assert!(matches!(failed.status, bridge_types::CommandStatus::Failed));
    assert!(failed.error.unwrap().contains("insufficient balance"));
    assert_eq!(failed.attempts, 1);
}

#[tokio::test]
async fn timeout_is_retried_until_max_attempts_then_fails() {
    let store = Arc::new(FakeOutboxStore::new());
    let id = store
        .enqueue_command(
            &"tenant-a".to_string(),
            "api",
            "FREEZE_WALLET",
            "wallet-A",
            "r-3",
            json!({ "walletId": "wallet-A" }),
        )
        .await
        .unwrap();

    let mut mock = MockFabricGateway::new();
    mock.expect_submit()
        .returning(|_, _| Err(FabricError::Timeout(std::time::Duration::from_secs(5))));
    mock.expect_circuit_state().returning(|| fabric_gateway::BreakerState::Closed);

    let mut cfg = config();
    cfg.max_attempts = 2;
    run_one_pass(store.clone(), Arc::new(mock), cfg).await;

    let result = store.get(id).unwrap();
    assert!(matches!(result.status, bridge_types::CommandStatus::Failed));
    assert!(result.attempts >= 2);
    assert_eq!(result.error.as_deref(), Some("max_attempts_exceeded"));
}

#[tokio::test]
async fn idempotent_enqueue_produces_exactly_one_committed_row() {
    let store = Arc::new(FakeOutboxStore::new());
    let payload = json!({ "fromUserId": "U-A", "toUserId": "U-B", "amount": 50, "remark": "" });

    let first = store
        .enqueue_command(&"tenant-a".to_string(), "api", "TRANSFER_TOKENS", "wallet-A", "r-dup", payload.clone())
        .await
        .unwrap();
    let second = store
        .enqueue_command(&"tenant-a".to_string(), "api", "TRANSFER_TOKENS", "wallet-A", "r-dup", payload)
        .await
        .unwrap();
    assert_eq!(first, second);

    let mut mock = MockFabricGateway::new();
    mock.expect_submit().returning(|_, _| {
        Ok(SubmitOutcome {
            tx_id: "tx-dup".to_string(),
            block_number: 7,
            payload: Vec::new(),
        })
    });
    mock.expect_circuit_state().returning(|| fabric_gateway::BreakerState::Closed);

    run_one_pass(store.clone(), Arc::new(mock), config()).await;

    assert!(matches!(store.get(first).unwrap().status, bridge_types::CommandStatus::Committed));
}
