use crate::error::{RaftError, Result};
use hivejar_models::{
    ClaimDefinition, Mutation, MutationType, OAuthClient, Role, RotateKeyPayload, Scope, Tenant,
};
use hivejar_store::{ConfigStore, KeySlot};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Apply one committed mutation to the local config store.
///
/// This is the replicated state machine: deterministic (no randomness, no
/// clock reads; timestamps and key material ride in the payload) and
/// idempotent under replay. Upserts are last-writer-wins on the keyed
/// blob; deletes tolerate missing targets.
pub fn apply_mutation(store: &ConfigStore, mutation: &Mutation) -> Result<()> {
    let slug = mutation.tenant_slug.as_str();

    match mutation.mutation_type {
        MutationType::UpsertTenant | MutationType::UpdateTenantSettings => {
            let tenant: Tenant = payload(mutation)?;
            store.put_tenant(&tenant)?;
        }
        MutationType::DeleteTenant => {
            store.delete_tenant_tree(slug)?;
        }
        MutationType::UpsertClient => {
            let client: OAuthClient = payload(mutation)?;
            store.put_client(slug, &client)?;
        }
        MutationType::DeleteClient => {
            store.delete_client(slug, &delete_key(mutation)?)?;
        }
        MutationType::UpsertScope => {
            let scope: Scope = payload(mutation)?;
            store.put_scope(slug, &scope)?;
        }
        MutationType::DeleteScope => {
            store.delete_scope(slug, &delete_key(mutation)?)?;
        }
        MutationType::UpsertClaim => {
            let claim: ClaimDefinition = payload(mutation)?;
            store.put_claim(slug, &claim)?;
        }
        MutationType::DeleteClaim => {
            let key = delete_key(mutation)?;
            let id = Uuid::parse_str(&key)
                .map_err(|_| RaftError::Internal(format!("delete_claim key '{}' is not a UUID", key)))?;
            store.delete_claim(slug, id)?;
        }
        MutationType::UpsertRole => {
            let role: Role = payload(mutation)?;
            store.put_role(slug, &role)?;
        }
        MutationType::DeleteRole => {
            store.delete_role(slug, &delete_key(mutation)?)?;
        }
        MutationType::RotateTenantKey => {
            let rotation: RotateKeyPayload = payload(mutation)?;
            // Blobs were serialized on the leader; write them verbatim so
            // every replica holds identical bytes.
            store.put_key_raw(slug, KeySlot::Active, rotation.active_json.as_bytes())?;
            match rotation.retiring_json {
                Some(retiring) => {
                    store.put_key_raw(slug, KeySlot::Retiring, retiring.as_bytes())?;
                }
                None => {
                    store.delete_key(slug, KeySlot::Retiring)?;
                }
            }
        }
    }

    Ok(())
}

fn payload<T: DeserializeOwned>(mutation: &Mutation) -> Result<T> {
    serde_json::from_value(mutation.payload.clone()).map_err(|e| {
        RaftError::Internal(format!(
            "malformed {} payload: {}",
            mutation.mutation_type.as_str(),
            e
        ))
    })
}

fn delete_key(mutation: &Mutation) -> Result<String> {
    let key: hivejar_models::mutation::DeleteByKey = payload(mutation)?;
    Ok(key.key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hivejar_models::TenantSettings;

    fn upsert_tenant_mutation(slug: &str) -> Mutation {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: "Acme".to_string(),
            display_name: String::new(),
            language: "en".to_string(),
            settings: TenantSettings::default(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        Mutation {
            mutation_type: MutationType::UpsertTenant,
            tenant_slug: slug.to_string(),
            ts_unix: 1_700_000_000,
            payload: serde_json::to_value(&tenant).unwrap(),
        }
    }

    #[test]
    fn test_apply_upsert_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        apply_mutation(&store, &upsert_tenant_mutation("acme")).unwrap();
        assert!(store.get_tenant("acme").unwrap().is_some());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        let mutation = upsert_tenant_mutation("acme");
        apply_mutation(&store, &mutation).unwrap();
        let first = std::fs::read(dir.path().join("tenants/acme/tenant.json")).unwrap();

        apply_mutation(&store, &mutation).unwrap();
        let second = std::fs::read(dir.path().join("tenants/acme/tenant.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_same_log_is_deterministic() {
        let mutations = vec![
            upsert_tenant_mutation("acme"),
            upsert_tenant_mutation("beta"),
            Mutation {
                mutation_type: MutationType::DeleteTenant,
                tenant_slug: "beta".to_string(),
                ts_unix: 1_700_000_001,
                payload: serde_json::Value::Null,
            },
        ];

        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let store_a = ConfigStore::open(dir_a.path()).unwrap();
        let store_b = ConfigStore::open(dir_b.path()).unwrap();

        for m in &mutations {
            apply_mutation(&store_a, m).unwrap();
            apply_mutation(&store_b, m).unwrap();
        }

        let blob_a = std::fs::read(dir_a.path().join("tenants/acme/tenant.json")).unwrap();
        let blob_b = std::fs::read(dir_b.path().join("tenants/acme/tenant.json")).unwrap();
        assert_eq!(blob_a, blob_b);
        assert!(store_a.get_tenant("beta").unwrap().is_none());
        assert!(store_b.get_tenant("beta").unwrap().is_none());
    }

    #[test]
    fn test_apply_delete_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        let mutation = Mutation {
            mutation_type: MutationType::DeleteScope,
            tenant_slug: "acme".to_string(),
            ts_unix: 1_700_000_000,
            payload: serde_json::json!({"key": "ghost"}),
        };
        apply_mutation(&store, &mutation).unwrap();
    }

    #[test]
    fn test_apply_rotation_writes_verbatim_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        let active_json = serde_json::json!({
            "kid": "k2",
            "tenantId": Uuid::nil(),
            "algorithm": "RS256",
            "status": "active",
            "createdAt": "2024-01-01T00:00:00Z",
            "graceSeconds": 0,
            "privatePem": "PEM",
            "publicJwk": {"kty": "RSA", "kid": "k2", "use": "sig", "alg": "RS256", "n": "", "e": ""}
        })
        .to_string();

        let mutation = Mutation {
            mutation_type: MutationType::RotateTenantKey,
            tenant_slug: "acme".to_string(),
            ts_unix: 1_700_000_000,
            payload: serde_json::json!({"activeJson": active_json}),
        };
        apply_mutation(&store, &mutation).unwrap();

        let on_disk = std::fs::read(dir.path().join("tenants/acme/keys/active.json")).unwrap();
        assert_eq!(on_disk, active_json.as_bytes());
        // No retiring payload means the retiring slot is cleared.
        assert!(store.get_key("acme", KeySlot::Retiring).unwrap().is_none());
    }
}
