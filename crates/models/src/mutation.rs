use serde::{Deserialize, Serialize};

/// Typed change request processed by consensus.
///
/// The log order is total across replicas; applying the same ordered log
/// to two fresh stores yields byte-identical contents, so payloads carry
/// everything apply needs and apply itself never generates randomness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    pub tenant_slug: String,
    pub ts_unix: i64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    UpsertTenant,
    UpdateTenantSettings,
    DeleteTenant,
    UpsertClient,
    DeleteClient,
    UpsertScope,
    DeleteScope,
    UpsertClaim,
    DeleteClaim,
    UpsertRole,
    DeleteRole,
    RotateTenantKey,
}

impl MutationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationType::UpsertTenant => "upsert_tenant",
            MutationType::UpdateTenantSettings => "update_tenant_settings",
            MutationType::DeleteTenant => "delete_tenant",
            MutationType::UpsertClient => "upsert_client",
            MutationType::DeleteClient => "delete_client",
            MutationType::UpsertScope => "upsert_scope",
            MutationType::DeleteScope => "delete_scope",
            MutationType::UpsertClaim => "upsert_claim",
            MutationType::DeleteClaim => "delete_claim",
            MutationType::UpsertRole => "upsert_role",
            MutationType::DeleteRole => "delete_role",
            MutationType::RotateTenantKey => "rotate_tenant_key",
        }
    }
}

/// Payload for `rotate_tenant_key`.
///
/// The leader generates the keypair and pre-serializes both blobs so every
/// replica writes identical bytes. `retiring_json = None` means the prior
/// retiring key is revoked and its file removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RotateKeyPayload {
    pub active_json: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retiring_json: Option<String>,
}

/// Payload for `delete_client` / `delete_scope` / `delete_claim` /
/// `delete_role`: the entity key within the tenant subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteByKey {
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_type_wire_names() {
        let json = serde_json::to_string(&MutationType::RotateTenantKey).unwrap();
        assert_eq!(json, "\"rotate_tenant_key\"");
        let parsed: MutationType = serde_json::from_str("\"upsert_tenant\"").unwrap();
        assert_eq!(parsed, MutationType::UpsertTenant);
    }

    #[test]
    fn test_mutation_roundtrip() {
        let mutation = Mutation {
            mutation_type: MutationType::UpsertScope,
            tenant_slug: "acme".to_string(),
            ts_unix: 1_700_000_000,
            payload: serde_json::json!({"name": "read:users"}),
        };
        let json = serde_json::to_string(&mutation).unwrap();
        assert!(json.contains("\"type\":\"upsert_scope\""));
        assert!(json.contains("\"tenantSlug\":\"acme\""));
        let back: Mutation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mutation);
    }
}
