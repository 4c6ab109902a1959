use std::collections::HashMap;

use bridge_types::{ReadModelEffect, VoteChoice};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ProjectorError;

/// A pure decode step: JSON payload in, read-model effect out. Handlers
/// never touch the database themselves — `ProjectorWorker` applies the
/// returned [`ReadModelEffect`] and the checkpoint advance together in one
/// `OutboxStore::apply_event` transaction. A handler must not read any
/// external state; everything it needs has to be in the event payload.
pub type Handler = fn(&Value) -> Result<ReadModelEffect, ProjectorError>;

fn field<'a>(payload: &'a Value, key: &'static str) -> Result<&'a str, ProjectorError> {
    payload.get(key).and_then(|v| v.as_str()).ok_or(ProjectorError::MissingField(key))
}

/// `UserCreated` only ever *transitions* an existing profile — the
/// projector refuses to fabricate a row because
/// the profile's PII is not on-chain. The "locate, and skip if absent"
/// half of that rule lives in `OutboxStore::apply_event`'s `UPDATE`,
/// which is a no-op against a missing row.
fn user_created(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let fabric_user_id = field(payload, "fabricUserId")?.to_string();
    let timestamp = field(payload, "timestamp")?;
    let onchain_registered_at: DateTime<Utc> = DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ProjectorError::MissingField("timestamp"))?;
    Ok(ReadModelEffect::ActivateUserProfile {
        fabric_user_id,
        onchain_registered_at,
    })
}

fn wallet_created(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let wallet_id = field(payload, "walletId")?.to_string();
    let owner_user_id = field(payload, "userId")?.to_string();
    Ok(ReadModelEffect::UpsertWallet { wallet_id, owner_user_id })
}

/// `TransferCompleted` is the single canonical transfer event — schema
/// registration already rejects `InternalTransferEvent` by name, so this
/// handler never sees the `fromID`-shaped payload.
fn transfer_completed(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let on_chain_tx_id = field(payload, "onChainTxId")?.to_string();
    let from_wallet_id = field(payload, "fromWalletId")?.to_string();
    let to_wallet_id = field(payload, "toWalletId")?.to_string();
    let amount = field(payload, "amount")?.to_string();
    let fee = field(payload, "fee")?.to_string();
    let remark = payload.get("remark").and_then(|v| v.as_str()).map(|s| s.to_string());
    Ok(ReadModelEffect::ApplyTransfer {
        on_chain_tx_id,
        from_wallet_id,
        to_wallet_id,
        amount,
        fee,
        remark,
    })
}

fn wallet_frozen(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let wallet_id = field(payload, "walletId")?.to_string();
    let owner_user_id = field(payload, "ownerUserId")?.to_string();
    Ok(ReadModelEffect::SetWalletFrozen {
        wallet_id,
        owner_user_id,
        frozen: true,
    })
}

fn wallet_unfrozen(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let wallet_id = field(payload, "walletId")?.to_string();
    let owner_user_id = field(payload, "ownerUserId")?.to_string();
    Ok(ReadModelEffect::SetWalletFrozen {
        wallet_id,
        owner_user_id,
        frozen: false,
    })
}

/// Follows the same UPSERT-by-natural-key pattern as `WalletCreated`.
fn governance_proposal_created(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let proposal_id = field(payload, "proposalId")?.to_string();
    let title = field(payload, "title")?.to_string();
    let description = payload.get("description").and_then(|v| v.as_str()).map(|s| s.to_string());
    Ok(ReadModelEffect::UpsertGovernanceProposal {
        proposal_id,
        title,
        description,
    })
}

fn governance_vote_cast(payload: &Value) -> Result<ReadModelEffect, ProjectorError> {
    let proposal_id = field(payload, "proposalId")?.to_string();
    let voter_id = field(payload, "voterId")?.to_string();
    let choice_raw = field(payload, "choice")?;
    let choice = VoteChoice::parse(choice_raw).ok_or_else(|| ProjectorError::InvalidVoteChoice(choice_raw.to_string()))?;
    Ok(ReadModelEffect::CastGovernanceVote {
        proposal_id,
        voter_id,
        choice,
    })
}

/// `(eventName, eventVersion) -> Handler` lookup, replacing a switch-based
/// dispatch. Falls back to a version-agnostic entry per event name so a
/// bumped `eventVersion` that hasn't been given its own handler yet still
/// dispatches; the schema registry's own per-version lookup is a separate,
/// stricter concern.
#[derive(Default)]
pub struct HandlerRegistry {
    exact: HashMap<(String, String), Handler>,
    by_name: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event_name: &str, event_version: &str, handler: Handler) -> &mut Self {
        self.exact.insert((event_name.to_string(), event_version.to_string()), handler);
        self.by_name.entry(event_name.to_string()).or_insert(handler);
        self
    }

    pub fn lookup(&self, event_name: &str, event_version: &str) -> Option<Handler> {
        self.exact
            .get(&(event_name.to_string(), event_version.to_string()))
            .or_else(|| self.by_name.get(event_name))
            .copied()
    }

    /// The seven event handlers wired by default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("UserCreated", "1.0", user_created)
            .register("WalletCreated", "1.0", wallet_created)
            .register("TransferCompleted", "1.0", transfer_completed)
            .register("WalletFrozen", "1.0", wallet_frozen)
            .register("WalletUnfrozen", "1.0", wallet_unfrozen)
            .register("GovernanceProposalCreated", "1.0", governance_proposal_created)
            .register("GovernanceVoteCast", "1.0", governance_vote_cast);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_completed_decodes_amount_and_fee_as_strings() {
        let registry = HandlerRegistry::with_defaults();
        let handler = registry.lookup("TransferCompleted", "1.0").unwrap();
        let payload = json!({
            "onChainTxId": "tx-1",
            "fromWalletId": "w-a",
            "toWalletId": "w-b",
            "amount": "100",
            "fee": "1",
            "remark": "rent"
        });
        let effect = handler(&payload).unwrap();
        match effect {
            ReadModelEffect::ApplyTransfer { amount, fee, remark, .. } => {
                assert_eq!(amount, "100");
                assert_eq!(fee, "1");
                assert_eq!(remark.as_deref(), Some("rent"));
            }
            _ => panic!("expected ApplyTransfer"),
        }
    }

    #[test]
    fn missing_field_is_rejected() {
        let registry = HandlerRegistry::with_defaults();
        let handler = registry.lookup("WalletCreated", "1.0").unwrap();
        let result = handler(&json!({ "walletId": "w-1" }));
        assert!(matches!(result, Err(ProjectorError::MissingField("userId"))));
    }

    #[test]
    fn unversioned_lookup_falls_back_to_registered_name() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.lookup("WalletCreated", "2.0").is_some());
    }

    #[test]
    fn unknown_event_name_has_no_handler() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.lookup("SomeFutureEvent", "1.0").is_none());
    }

    #[test]
    fn invalid_vote_choice_is_rejected() {
        let registry = HandlerRegistry::with_defaults();
        let handler = registry.lookup("GovernanceVoteCast", "1.0").unwrap();
        let result = handler(&json!({ "proposalId": "p-1", "voterId": "u-1", "choice": "maybe" }));
        assert!(matches!(result, Err(ProjectorError::InvalidVoteChoice(_))));
    }
}
