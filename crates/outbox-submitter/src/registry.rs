use std::collections::HashMap;

use crate::error::SubmitterError;

/// Encodes an outbox command's JSON payload into the positional string
/// arguments the chaincode function expects. A plain `fn` pointer, not a
/// closure capturing state — encoders are pure, so the registry can be a
/// `'static` table built once in `bin/bridge` ( 's
/// anti-singleton redesign: no `Lazy`-static, passed in explicitly).
pub type ArgEncoder = fn(&serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError>;

#[derive(Clone, Copy)]
pub struct ChaincodeMapping {
    pub function_name: &'static str,
    pub encode: ArgEncoder,
}

/// `commandType -> (chaincodeFunction, argEncoder)`. Adding a new command
/// is a three-step change: add a schema, add a mapping here, and add a
/// handler for its emitted event.
#[derive(Default)]
pub struct CommandRegistry {
    mappings: HashMap<&'static str, ChaincodeMapping>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command_type: &'static str, mapping: ChaincodeMapping) -> &mut Self {
        self.mappings.insert(command_type, mapping);
        self
    }

    pub fn lookup(&self, command_type: &str) -> Result<ChaincodeMapping, SubmitterError> {
        self.mappings
            .get(command_type)
            .copied()
            .ok_or_else(|| SubmitterError::UnknownCommandType(command_type.to_string()))
    }

    /// The five command types requires wired by default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                "TRANSFER_TOKENS",
                ChaincodeMapping {
                    function_name: "TransferTokens",
                    encode: encode_transfer_tokens,
                },
            )
            .register(
                "CREATE_WALLET",
                ChaincodeMapping {
                    function_name: "CreateWallet",
                    encode: encode_create_wallet,
                },
            )
            .register(
                "FREEZE_WALLET",
                ChaincodeMapping {
                    function_name: "FreezeWallet",
                    encode: encode_freeze_wallet,
                },
            )
            .register(
                "CREATE_GOVERNANCE_PROPOSAL",
                ChaincodeMapping {
                    function_name: "CreateGovernanceProposal",
                    encode: encode_create_governance_proposal,
                },
            )
            .register(
                "CAST_VOTE",
                ChaincodeMapping {
                    function_name: "CastVote",
                    encode: encode_cast_vote,
                },
            );
        registry
    }
}

fn field<'a>(payload: &'a serde_json::Value, key: &'static str) -> Result<&'a str, SubmitterError> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or(SubmitterError::MissingField(key))
}

fn as_bytes(values: &[&str]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.as_bytes().to_vec()).collect()
}

fn encode_transfer_tokens(payload: &serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError> {
    let from_user_id = field(payload, "fromUserId")?;
    let to_user_id = field(payload, "toUserId")?;
    let amount = payload
        .get("amount")
        .map(|v| v.to_string())
        .ok_or(SubmitterError::MissingField("amount"))?;
    let remark = payload.get("remark").and_then(|v| v.as_str()).unwrap_or("");
    Ok(as_bytes(&[from_user_id, to_user_id, amount.as_str(), remark]))
}

fn encode_create_wallet(payload: &serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError> {
    let user_id = field(payload, "userId")?;
    let wallet_id = field(payload, "walletId")?;
    Ok(as_bytes(&[user_id, wallet_id]))
}

fn encode_freeze_wallet(payload: &serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError> {
    let wallet_id = field(payload, "walletId")?;
    Ok(as_bytes(&[wallet_id]))
}

fn encode_create_governance_proposal(payload: &serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError> {
    let proposal_id = field(payload, "proposalId")?;
    let title = field(payload, "title")?;
    let description = payload.get("description").and_then(|v| v.as_str()).unwrap_or("");
    Ok(as_bytes(&[proposal_id, title, description]))
}

fn encode_cast_vote(payload: &serde_json::Value) -> Result<Vec<Vec<u8>>, SubmitterError> {
    let proposal_id = field(payload, "proposalId")?;
    let voter_id = field(payload, "voterId")?;
    let choice = field(payload, "choice")?;
    Ok(as_bytes(&[proposal_id, voter_id, choice]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_tokens_round_trips_fields_into_positional_args() {
        let registry = CommandRegistry::with_defaults();
        let mapping = registry.lookup("TRANSFER_TOKENS").unwrap();
        assert_eq!(mapping.function_name, "TransferTokens");

        let payload = json!({ "fromUserId": "U-A", "toUserId": "U-B", "amount": 100, "remark": "test" });
        let args = (mapping.encode)(&payload).unwrap();
        assert_eq!(args, vec![b"U-A".to_vec(), b"U-B".to_vec(), b"100".to_vec(), b"test".to_vec()]);
    }

    #[test]
    fn unknown_command_type_is_rejected() {
        let registry = CommandRegistry::with_defaults();
        let result = registry.lookup("DOES_NOT_EXIST");
        assert!(matches!(result, Err(SubmitterError::UnknownCommandType(_))));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let registry = CommandRegistry::with_defaults();
        let mapping = registry.lookup("FREEZE_WALLET").unwrap();
        let result = (mapping.encode)(&json!({}));
        assert!(matches!(result, Err(SubmitterError::MissingField("walletId"))));
    }
}
