use crate::error::{KeyError, Result};
use crate::material::{encoding_key, generate_signing_key, jwt_algorithm};
use chrono::{DateTime, Utc};
use hivejar_crypto::canonicalize;
use hivejar_models::{
    JwkSet, KeyAlgorithm, KeyStatus, RotateKeyPayload, SigningKey, Tenant,
};
use hivejar_store::{ConfigStore, KeySlot};
use serde::Serialize;
use std::sync::Arc;

/// A freshly prepared rotation: the mutation payload for the replicated
/// log plus the new key for the caller.
#[derive(Debug)]
pub struct RotationOutcome {
    pub payload: RotateKeyPayload,
    pub new_key: SigningKey,
}

/// Per-tenant signing key lifecycle over the config store's `keys/active`
/// and `keys/retiring` blobs.
///
/// Key material is generated here (on the leader, before a mutation is
/// emitted) and persisted through the replicated log; this manager never
/// writes key blobs directly except to reap expired retiring keys.
pub struct KeyManager {
    store: Arc<ConfigStore>,
    algorithm: KeyAlgorithm,
}

impl KeyManager {
    pub fn new(store: Arc<ConfigStore>, algorithm: KeyAlgorithm) -> Self {
        Self { store, algorithm }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// The current active key, used for signing.
    pub fn current_signing_key(&self, slug: &str) -> Result<SigningKey> {
        self.store
            .get_key(slug, KeySlot::Active)?
            .ok_or_else(|| KeyError::NoKey(slug.to_string()))
    }

    /// Public keys that verify tokens right now: the active key plus the
    /// retiring key while its grace window is open. Expired retiring keys
    /// are treated as absent and reaped best-effort.
    pub fn verification_set(&self, slug: &str, now: DateTime<Utc>) -> Result<JwkSet> {
        let mut set = JwkSet::default();

        if let Some(active) = self.store.get_key(slug, KeySlot::Active)? {
            set.keys.push(active.public_jwk);
        }

        if let Some(retiring) = self.store.get_key(slug, KeySlot::Retiring)? {
            if retiring.verifies_at(now) {
                set.keys.push(retiring.public_jwk);
            } else {
                self.reap_retiring(slug);
            }
        }

        Ok(set)
    }

    /// Prepare a rotation on the leader.
    ///
    /// Generates the new active key, moves the old active into the
    /// retiring slot with `retired_at = now`, and serializes both blobs so
    /// every replica writes identical bytes. Any previously retiring key
    /// is dropped (the payload omits it, which clears the slot on apply).
    pub fn prepare_rotation(
        &self,
        tenant: &Tenant,
        grace_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome> {
        let new_key = generate_signing_key(tenant.id, self.algorithm, now)?;
        let active_json = String::from_utf8(canonicalize(&new_key)?)
            .expect("canonical JSON is UTF-8");

        let retiring_json = match self.store.get_key(&tenant.slug, KeySlot::Active)? {
            Some(mut outgoing) => {
                outgoing.status = KeyStatus::Retiring;
                outgoing.retired_at = Some(now);
                outgoing.grace_seconds = grace_seconds;
                Some(
                    String::from_utf8(canonicalize(&outgoing)?)
                        .expect("canonical JSON is UTF-8"),
                )
            }
            // First rotation for this tenant: fresh active, no retiring.
            None => None,
        };

        Ok(RotationOutcome {
            payload: RotateKeyPayload {
                active_json,
                retiring_json,
            },
            new_key,
        })
    }

    /// Sign a claims object with the tenant's active key; the kid rides
    /// in the JWT header so verifiers can pick the right JWK.
    pub fn sign_claims<T: Serialize>(&self, slug: &str, claims: &T) -> Result<String> {
        let key = self.current_signing_key(slug)?;
        let mut header = jsonwebtoken::Header::new(jwt_algorithm(&key));
        header.kid = Some(key.kid.clone());
        Ok(jsonwebtoken::encode(&header, claims, &encoding_key(&key)?)?)
    }

    /// Drop expired retiring keys for every tenant. Run periodically as
    /// the optional retirement sweeper.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let slugs = match self.store.list_tenant_slugs() {
            Ok(slugs) => slugs,
            Err(e) => {
                tracing::warn!("Key sweep could not list tenants: {}", e);
                return;
            }
        };

        for slug in slugs {
            match self.store.get_key(&slug, KeySlot::Retiring) {
                Ok(Some(retiring)) if !retiring.verifies_at(now) => self.reap_retiring(&slug),
                Ok(_) => {}
                Err(e) => tracing::warn!("Key sweep failed for tenant '{}': {}", slug, e),
            }
        }
    }

    fn reap_retiring(&self, slug: &str) {
        if let Err(e) = self.store.delete_key(slug, KeySlot::Retiring) {
            tracing::warn!("Failed to reap retired key for tenant '{}': {}", slug, e);
        } else {
            tracing::info!("Reaped expired retiring key for tenant '{}'", slug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hivejar_models::TenantSettings;
    use uuid::Uuid;

    fn test_tenant() -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            display_name: String::new(),
            language: "en".to_string(),
            settings: TenantSettings::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn apply_rotation(store: &ConfigStore, slug: &str, payload: &RotateKeyPayload) {
        store
            .put_key_raw(slug, KeySlot::Active, payload.active_json.as_bytes())
            .unwrap();
        match &payload.retiring_json {
            Some(json) => store
                .put_key_raw(slug, KeySlot::Retiring, json.as_bytes())
                .unwrap(),
            None => store.delete_key(slug, KeySlot::Retiring).unwrap(),
        }
    }

    #[test]
    fn test_first_rotation_creates_active_without_retiring() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let manager = KeyManager::new(store.clone(), KeyAlgorithm::RS256);
        let tenant = test_tenant();

        let outcome = manager.prepare_rotation(&tenant, 60, Utc::now()).unwrap();
        assert!(outcome.payload.retiring_json.is_none());

        apply_rotation(&store, "acme", &outcome.payload);
        let active = manager.current_signing_key("acme").unwrap();
        assert_eq!(active.kid, outcome.new_key.kid);
        assert_eq!(active.status, KeyStatus::Active);
    }

    #[test]
    fn test_rotation_moves_active_to_retiring_with_grace() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let manager = KeyManager::new(store.clone(), KeyAlgorithm::RS256);
        let tenant = test_tenant();
        let now = Utc::now();

        let first = manager.prepare_rotation(&tenant, 60, now).unwrap();
        apply_rotation(&store, "acme", &first.payload);
        let k1 = first.new_key.kid.clone();

        let second = manager.prepare_rotation(&tenant, 60, now).unwrap();
        apply_rotation(&store, "acme", &second.payload);
        let k2 = second.new_key.kid.clone();
        assert_ne!(k1, k2);

        // Inside the grace window both keys verify, K2 signs.
        let set = manager.verification_set("acme", now + Duration::seconds(30)).unwrap();
        let kids: Vec<&str> = set.keys.iter().map(|k| k.kid.as_str()).collect();
        assert_eq!(kids, vec![k2.as_str(), k1.as_str()]);
        assert_eq!(manager.current_signing_key("acme").unwrap().kid, k2);

        // Outside the window only K2 remains.
        let set = manager.verification_set("acme", now + Duration::seconds(61)).unwrap();
        let kids: Vec<&str> = set.keys.iter().map(|k| k.kid.as_str()).collect();
        assert_eq!(kids, vec![k2.as_str()]);
    }

    #[test]
    fn test_zero_grace_drops_old_key_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let manager = KeyManager::new(store.clone(), KeyAlgorithm::RS256);
        let tenant = test_tenant();
        let now = Utc::now();

        let first = manager.prepare_rotation(&tenant, 0, now).unwrap();
        apply_rotation(&store, "acme", &first.payload);
        let second = manager.prepare_rotation(&tenant, 0, now).unwrap();
        apply_rotation(&store, "acme", &second.payload);

        let set = manager.verification_set("acme", now).unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].kid, second.new_key.kid);
    }

    #[test]
    fn test_missing_key_is_no_key_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let manager = KeyManager::new(store, KeyAlgorithm::RS256);
        assert!(matches!(
            manager.current_signing_key("ghost").unwrap_err(),
            KeyError::NoKey(_)
        ));
    }

    #[test]
    fn test_sign_claims_uses_active_kid() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let manager = KeyManager::new(store.clone(), KeyAlgorithm::RS256);
        let tenant = test_tenant();

        let outcome = manager.prepare_rotation(&tenant, 60, Utc::now()).unwrap();
        apply_rotation(&store, "acme", &outcome.payload);

        #[derive(Serialize)]
        struct Claims {
            sub: String,
            exp: i64,
        }
        let token = manager
            .sign_claims(
                "acme",
                &Claims {
                    sub: "user-1".to_string(),
                    exp: (Utc::now() + Duration::hours(1)).timestamp(),
                },
            )
            .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(outcome.new_key.kid.as_str()));
    }
}
