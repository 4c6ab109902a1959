use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A structured read-model mutation, keyed by the natural identifiers
/// each projector handler describes. Replacing a freeform
/// "apply this closure inside a transaction" seam with a typed enum keeps
/// `OutboxStore` object-safe (typed records per variant replace freeform
/// dictionaries) while still letting the store apply the mutation and
/// `advance_checkpoint` in one database transaction — the
/// exactly-once-effect boundary the projector depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReadModelEffect {
    /// `UserCreated`: only transitions an *existing* profile to ACTIVE.
    /// A missing profile is a warn-and-skip, never a
    /// row fabricated from the event alone (the profile's PII is not
    /// on-chain).
    ActivateUserProfile {
        fabric_user_id: String,
        onchain_registered_at: DateTime<Utc>,
    },
    /// `WalletCreated`: upsert keyed by `wallet_id`.
    UpsertWallet {
        wallet_id: String,
        owner_user_id: String,
    },
    /// `TransferCompleted` (the single canonical event; `InternalTransferEvent`
    /// is rejected at the schema boundary). `amount`/`fee` are decimal
    /// strings — the projector never parses them as machine integers, only
    /// the store's `NUMERIC` column does.
    ApplyTransfer {
        on_chain_tx_id: String,
        from_wallet_id: String,
        to_wallet_id: String,
        amount: String,
        fee: String,
        remark: Option<String>,
    },
    /// `WalletFrozen` / `WalletUnfrozen`: flips `wallets.is_frozen` and the
    /// owning user's projected status.
    SetWalletFrozen {
        wallet_id: String,
        owner_user_id: String,
        frozen: bool,
    },
    /// `GovernanceProposalCreated`: upsert keyed by `proposal_id`.
    UpsertGovernanceProposal {
        proposal_id: String,
        title: String,
        description: Option<String>,
    },
    /// `GovernanceVoteCast`: append-guarded by `(proposal_id, voter_id)` so
    /// a redelivered vote never double-counts the tally.
    CastGovernanceVote {
        proposal_id: String,
        voter_id: String,
        choice: VoteChoice,
    },
    /// Decode failures, unknown event names, and warn-and-skip outcomes
    /// still need the checkpoint to advance past them ( step
    /// 1/3) without touching any read-model table.
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Some(VoteChoice::Yes),
            "no" | "n" | "false" => Some(VoteChoice::No),
            _ => None,
        }
    }
}
