use std::collections::HashMap;

use jsonschema::JSONSchema;

/// `{eventName, eventVersion, payload}`, the shape validates.
pub struct EventEnvelope<'a> {
    pub event_name: &'a str,
    pub event_version: &'a str,
    pub payload: &'a serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
    /// Set when `eventName` has no registered schema at all — the registry
    /// still reports `ok = true` so unrecognized ledger events never block
    /// the projector.
    pub warn_unknown_event: bool,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warn_unknown_event: false,
        }
    }

    fn unknown_event() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warn_unknown_event: true,
        }
    }

    fn rejected(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            errors,
            warn_unknown_event: false,
        }
    }
}

/// Each entry is compiled once at construction (schemas are `include_str!`d
/// at compile time) and never mutated afterwards. `JSONSchema` borrows the
/// parsed `serde_json::Value` it was compiled from, so the parsed schema
/// documents are leaked to `'static` once at startup — the set is small and
/// fixed for the life of the process, so this is not an unbounded leak.
pub struct EventSchemaRegistry {
    schemas: HashMap<(String, String), JSONSchema<'static>>,
    strict_mode: bool,
}

macro_rules! embed_schema {
    ($name:literal, $version:literal) => {
        (
            $name,
            $version,
            include_str!(concat!("../schemas/", $name, "/", $version, ".json")),
        )
    };
}

const EMBEDDED_SCHEMAS: &[(&str, &str, &str)] = &[
    embed_schema!("UserCreated", "1.0"),
    embed_schema!("WalletCreated", "1.0"),
    embed_schema!("TransferCompleted", "1.0"),
    embed_schema!("WalletFrozen", "1.0"),
    embed_schema!("WalletUnfrozen", "1.0"),
    embed_schema!("GovernanceProposalCreated", "1.0"),
    embed_schema!("GovernanceVoteCast", "1.0"),
];

impl EventSchemaRegistry {
    /// Loads the built-in schema set. Panics on a malformed embedded
    /// schema document — that's a build-time defect, not a runtime one.
    pub fn load_embedded() -> Self {
        let mut schemas = HashMap::new();
        for (name, version, raw) in EMBEDDED_SCHEMAS {
            let value: serde_json::Value =
                serde_json::from_str(raw).unwrap_or_else(|e| panic!("invalid schema json for {name}/{version}: {e}"));
            // Leaked once per embedded schema at process startup; `JSONSchema`
            // borrows from the parsed document and the registry keeps it for
            // the life of the process, so a `'static` reference is correct.
            let value: &'static serde_json::Value = Box::leak(Box::new(value));
            let compiled = JSONSchema::compile(value)
                .unwrap_or_else(|e| panic!("invalid json schema for {name}/{version}: {e}"));
            schemas.insert((name.to_string(), version.to_string()), compiled);
        }
        Self {
            schemas,
            strict_mode: false,
        }
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn validate(&self, envelope: EventEnvelope<'_>) -> ValidationOutcome {
        // The two overlapping payload shapes collapse to
        // one canonical event at the schema boundary.
        if envelope.event_name == "InternalTransferEvent" {
            return ValidationOutcome::rejected(vec![
                "superseded by TransferCompleted; do not emit".to_string(),
            ]);
        }

        let key = (envelope.event_name.to_string(), envelope.event_version.to_string());
        let schema = match self.schemas.get(&key) {
            Some(schema) => schema,
            None => return ValidationOutcome::unknown_event(),
        };

        match schema.validate(envelope.payload) {
            Ok(()) => ValidationOutcome::valid(),
            Err(errors) => ValidationOutcome::rejected(errors.map(|e| e.to_string()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_user_created_payload_passes() {
        let registry = EventSchemaRegistry::load_embedded();
        let payload = json!({ "fabricUserId": "U-1", "timestamp": "2024-01-01T00:00:00Z" });
        let outcome = registry.validate(EventEnvelope {
            event_name: "UserCreated",
            event_version: "1.0",
            payload: &payload,
        });
        assert!(outcome.ok);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn missing_required_field_fails_but_stays_advisory_by_caller() {
        let registry = EventSchemaRegistry::load_embedded();
        let payload = json!({ "timestamp": "2024-01-01T00:00:00Z" });
        let outcome = registry.validate(EventEnvelope {
            event_name: "UserCreated",
            event_version: "1.0",
            payload: &payload,
        });
        assert!(!outcome.ok);
        assert!(!outcome.errors.is_empty());
    }

    #[test]
    fn unknown_event_name_is_ok_with_warning() {
        let registry = EventSchemaRegistry::load_embedded();
        let payload = json!({});
        let outcome = registry.validate(EventEnvelope {
            event_name: "SomeFutureEvent",
            event_version: "2.0",
            payload: &payload,
        });
        assert!(outcome.ok);
        assert!(outcome.warn_unknown_event);
    }

    #[test]
    fn internal_transfer_event_is_rejected_by_name() {
        let registry = EventSchemaRegistry::load_embedded();
        let payload = json!({ "fromID": "U-A" });
        let outcome = registry.validate(EventEnvelope {
            event_name: "InternalTransferEvent",
            event_version: "1.0",
            payload: &payload,
        });
        assert!(!outcome.ok);
        assert_eq!(outcome.errors[0], "superseded by TransferCompleted; do not emit");
    }

    #[test]
    fn transfer_completed_requires_core_fields() {
        let registry = EventSchemaRegistry::load_embedded();
        let payload = json!({
            "onChainTxId": "tx-1",
            "fromWalletId": "W-A",
            "toWalletId": "W-B",
            "amount": "100",
            "fee": "1"
        });
        let outcome = registry.validate(EventEnvelope {
            event_name: "TransferCompleted",
            event_version: "1.0",
            payload: &payload,
        });
        assert!(outcome.ok);
    }
}
