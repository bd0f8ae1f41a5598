use crate::error::{ControlError, Result};
use crate::secrets::seal_settings;
use chrono::Utc;
use hivejar_crypto::{etag, Envelope};
use hivejar_keys::KeyManager;
use hivejar_models::{
    validate_slug, CreateTenant, JwkSet, Mutation, MutationType, Patch, Role, Scope, SigningKey,
    Tenant, TenantSettings, TenantSettingsPatch, UpdateTenant, UserDbConfig,
};
use hivejar_raft::RaftNode;
use hivejar_store::ConfigStore;
use hivejar_tenantdb::{BootstrapReport, TenantAccess, TenantDbManager};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Callback invoked after a key rotation so the serving layer can drop
/// cached JWKS documents.
pub type JwksInvalidationHook = Box<dyn Fn(&str) + Send + Sync>;

/// Result of tenant creation; bootstrap runs best-effort and reports its
/// failure without failing the create.
#[derive(Debug)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    pub bootstrap_error: Option<String>,
}

/// Result of a settings update.
#[derive(Debug)]
pub struct UpdatedSettings {
    pub tenant: Tenant,
    pub etag: String,
}

/// The control plane: validates admin intents, turns them into mutations
/// on the replicated log, and serves reads from the local config store.
///
/// Writes happen on the leader only and are serialized through one guard
/// so uniqueness checks cannot race their own commits. Reads never touch
/// the log.
pub struct ControlPlane {
    store: Arc<ConfigStore>,
    raft: Arc<RaftNode>,
    envelope: Envelope,
    keys: Arc<KeyManager>,
    tenant_db: Arc<TenantDbManager>,
    jwks_hook: RwLock<Option<JwksInvalidationHook>>,
    /// Serializes mutation authoring on this node.
    write_serial: tokio::sync::Mutex<()>,
    /// Parent token for detached side-effect tasks; cancel on shutdown.
    side_effects: CancellationToken,
}

pub const DEFAULT_ROTATION_GRACE_SECONDS: u64 = 60;

/// Scopes every tenant starts with; immutable and undeletable.
const SYSTEM_SCOPES: &[(&str, &str)] = &[
    ("openid", "OpenID Connect sign-in"),
    ("profile", "Basic profile claims"),
    ("email", "Email address claims"),
    ("offline_access", "Refresh token issuance"),
];

/// Roles every tenant starts with.
const SYSTEM_ROLES: &[(&str, &str)] = &[("admin", "Tenant administration")];

impl ControlPlane {
    pub fn new(
        store: Arc<ConfigStore>,
        raft: Arc<RaftNode>,
        envelope: Envelope,
        keys: Arc<KeyManager>,
        tenant_db: Arc<TenantDbManager>,
    ) -> Self {
        Self {
            store,
            raft,
            envelope,
            keys,
            tenant_db,
            jwks_hook: RwLock::new(None),
            write_serial: tokio::sync::Mutex::new(()),
            side_effects: CancellationToken::new(),
        }
    }

    /// Register the JWKS invalidation hook. Owned by the application
    /// container; replaces any previous hook.
    pub fn set_jwks_hook(&self, hook: JwksInvalidationHook) {
        *self.jwks_hook.write().expect("jwks hook lock") = Some(hook);
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn raft(&self) -> &Arc<RaftNode> {
        &self.raft
    }

    pub fn tenant_db(&self) -> &Arc<TenantDbManager> {
        &self.tenant_db
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Cancel outstanding best-effort side effects (shutdown path).
    pub fn shutdown(&self) {
        self.side_effects.cancel();
    }

    // ---- tenants ----

    pub async fn create_tenant(
        &self,
        input: CreateTenant,
        cancel: &CancellationToken,
    ) -> Result<CreatedTenant> {
        let _serial = self.write_serial.lock().await;
        self.check_writable()?;

        validate_slug(&input.slug).map_err(ControlError::InvalidInput)?;
        if input.name.trim().is_empty() || input.name.len() > 255 {
            return Err(ControlError::InvalidInput(
                "name must be between 1 and 255 characters".to_string(),
            ));
        }
        if self.store.get_tenant(&input.slug)?.is_some() {
            return Err(ControlError::AlreadyExists(format!(
                "tenant '{}' already exists",
                input.slug
            )));
        }

        let now = Utc::now();
        let mut settings = input.settings.unwrap_or_default();
        seal_settings(&mut settings, &self.envelope, &input.slug)?;

        let language = match input.language.as_deref() {
            None | Some("") => "en".to_string(),
            Some(lang) => lang.to_string(),
        };

        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: input.slug.clone(),
            name: input.name,
            display_name: input.display_name.unwrap_or_default(),
            language,
            settings,
            created_at: now,
            updated_at: now,
        };

        self.submit(MutationType::UpsertTenant, &tenant.slug, &tenant)
            .await?;
        self.seed_system_entities(&tenant).await?;
        tracing::info!("Tenant created: slug={} id={}", tenant.slug, tenant.id);

        // Bootstrap may open pools and run migrations; other writes must
        // not queue behind it.
        drop(_serial);

        // Bootstrap is best-effort: a broken DSN must not fail the create.
        let bootstrap_error = if tenant.settings.user_db.is_some() {
            match self.tenant_db.bootstrap(&tenant.slug, cancel).await {
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Bootstrap failed for new tenant '{}': {}", tenant.slug, e);
                    Some(e.to_string())
                }
            }
        } else {
            None
        };

        let tenant = self
            .store
            .get_tenant(&tenant.slug)?
            .ok_or_else(|| ControlError::Internal("tenant vanished after apply".to_string()))?;

        Ok(CreatedTenant {
            tenant,
            bootstrap_error,
        })
    }

    /// Lookup by slug; a UUID-shaped miss falls back to id lookup.
    pub fn get_tenant(&self, slug_or_id: &str) -> Result<Tenant> {
        if let Some(tenant) = self.store.get_tenant(slug_or_id)? {
            return Ok(tenant);
        }
        if let Ok(id) = Uuid::parse_str(slug_or_id) {
            if let Some(tenant) = self.store.get_tenant_by_id(id)? {
                return Ok(tenant);
            }
        }
        Err(ControlError::NotFound(format!("tenant '{}'", slug_or_id)))
    }

    /// All tenants in deterministic (slug) order.
    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants = Vec::new();
        for slug in self.store.list_tenant_slugs()? {
            if let Some(tenant) = self.store.get_tenant(&slug)? {
                tenants.push(tenant);
            }
        }
        Ok(tenants)
    }

    pub async fn update_tenant(&self, slug_or_id: &str, input: UpdateTenant) -> Result<Tenant> {
        let _serial = self.write_serial.lock().await;
        self.check_writable()?;

        let mut tenant = self.get_tenant(slug_or_id)?;
        if let Some(name) = input.name {
            if name.trim().is_empty() || name.len() > 255 {
                return Err(ControlError::InvalidInput(
                    "name must be between 1 and 255 characters".to_string(),
                ));
            }
            tenant.name = name;
        }
        if let Some(display_name) = input.display_name {
            tenant.display_name = display_name;
        }
        if let Some(language) = input.language {
            if !language.is_empty() {
                tenant.language = language;
            }
        }
        tenant.updated_at = Utc::now();

        self.submit(MutationType::UpsertTenant, &tenant.slug.clone(), &tenant)
            .await?;
        Ok(self.get_tenant(&tenant.slug)?)
    }

    /// Delete a tenant; apply cascades to all child blobs. The data-plane
    /// pool is evicted, the database itself is untouched.
    pub async fn delete_tenant(&self, slug_or_id: &str) -> Result<()> {
        let _serial = self.write_serial.lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        self.submit_raw(Mutation {
            mutation_type: MutationType::DeleteTenant,
            tenant_slug: tenant.slug.clone(),
            ts_unix: Utc::now().timestamp(),
            payload: serde_json::Value::Null,
        })
        .await?;

        self.tenant_db.clear(&tenant.slug).await;
        tracing::info!("Tenant deleted: slug={}", tenant.slug);
        Ok(())
    }

    // ---- settings ----

    /// Settings plus the ETag for optimistic updates.
    pub fn get_settings(&self, slug_or_id: &str) -> Result<(Tenant, String)> {
        let tenant = self.get_tenant(slug_or_id)?;
        let tag = etag(&tenant.settings)?;
        Ok((tenant, tag))
    }

    /// Apply a partial settings update guarded by an ETag precondition.
    pub async fn update_settings(
        &self,
        slug_or_id: &str,
        patch: TenantSettingsPatch,
        if_match: &str,
    ) -> Result<UpdatedSettings> {
        let _serial = self.write_serial.lock().await;
        self.check_writable()?;

        let mut tenant = self.get_tenant(slug_or_id)?;
        let current = etag(&tenant.settings)?;
        if if_match != current {
            return Err(ControlError::PreconditionFailed);
        }

        let before_db = tenant.settings.user_db.clone();
        let before_fields = tenant.settings.user_fields.clone();

        apply_settings_patch(&mut tenant.settings, patch);
        seal_settings(&mut tenant.settings, &self.envelope, &tenant.slug)?;
        tenant.updated_at = Utc::now();

        let slug = tenant.slug.clone();
        self.submit(MutationType::UpdateTenantSettings, &slug, &tenant)
            .await?;

        let tenant = self.get_tenant(&slug)?;
        let db_changed = tenant.settings.user_db != before_db;
        let fields_changed = tenant.settings.user_fields != before_fields;
        if db_changed || fields_changed {
            self.spawn_data_plane_sync(&slug, db_changed);
        }

        let tag = etag(&tenant.settings)?;
        Ok(UpdatedSettings { tenant, etag: tag })
    }

    // ---- signing keys ----

    /// Rotate the tenant's signing key on the leader; the outgoing active
    /// key keeps verifying for `grace_seconds`.
    pub async fn rotate_tenant_key(
        &self,
        slug_or_id: &str,
        grace_seconds: Option<u64>,
    ) -> Result<SigningKey> {
        let _serial = self.write_serial.lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let grace = grace_seconds.unwrap_or(DEFAULT_ROTATION_GRACE_SECONDS);
        let outcome = self.keys.prepare_rotation(&tenant, grace, Utc::now())?;

        self.submit_raw(Mutation {
            mutation_type: MutationType::RotateTenantKey,
            tenant_slug: tenant.slug.clone(),
            ts_unix: Utc::now().timestamp(),
            payload: serde_json::to_value(&outcome.payload)
                .map_err(|e| ControlError::Internal(e.to_string()))?,
        })
        .await?;

        self.invalidate_jwks(&tenant.slug);
        tracing::info!(
            "Signing key rotated: tenant={} kid={} grace={}s",
            tenant.slug,
            outcome.new_key.kid,
            grace
        );
        Ok(outcome.new_key)
    }

    /// The active signing key, created lazily on the leader the first
    /// time a tenant needs to sign.
    pub async fn ensure_signing_key(&self, slug_or_id: &str) -> Result<SigningKey> {
        let tenant = self.get_tenant(slug_or_id)?;
        match self.keys.current_signing_key(&tenant.slug) {
            Ok(key) => Ok(key),
            Err(hivejar_keys::KeyError::NoKey(_)) => {
                // Followers cannot generate; redirect to the leader.
                self.rotate_tenant_key(&tenant.slug, Some(DEFAULT_ROTATION_GRACE_SECONDS))
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Public JWKS for token verification.
    pub fn verification_set(&self, slug_or_id: &str) -> Result<JwkSet> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.keys.verification_set(&tenant.slug, Utc::now())?)
    }

    // ---- data plane ----

    pub async fn bootstrap_tenant(
        &self,
        slug_or_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BootstrapReport> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.tenant_db.bootstrap(&tenant.slug, cancel).await?)
    }

    pub async fn tenant_access(
        &self,
        slug_or_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TenantAccess> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.tenant_db.access(&tenant.slug, cancel).await)
    }

    // ---- shared internals ----

    pub(crate) async fn submit<T: serde::Serialize>(
        &self,
        mutation_type: MutationType,
        slug: &str,
        payload: &T,
    ) -> Result<()> {
        self.submit_raw(Mutation {
            mutation_type,
            tenant_slug: slug.to_string(),
            ts_unix: Utc::now().timestamp(),
            payload: serde_json::to_value(payload)
                .map_err(|e| ControlError::Internal(e.to_string()))?,
        })
        .await
    }

    pub(crate) async fn submit_raw(&self, mutation: Mutation) -> Result<()> {
        self.raft.submit(mutation).await?;
        Ok(())
    }

    /// Writes require a healthy store and the leader role.
    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.store.is_degraded() {
            return Err(ControlError::ServiceUnavailable(
                "config store is degraded".to_string(),
            ));
        }
        self.raft.require_leader()?;
        Ok(())
    }

    pub(crate) async fn write_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_serial.lock().await
    }

    pub(crate) fn invalidate_jwks(&self, slug: &str) {
        if let Some(hook) = self.jwks_hook.read().expect("jwks hook lock").as_ref() {
            hook(slug);
        }
    }

    async fn seed_system_entities(&self, tenant: &Tenant) -> Result<()> {
        let now = tenant.created_at;
        for (name, description) in SYSTEM_SCOPES {
            let scope = Scope {
                name: name.to_string(),
                description: description.to_string(),
                display_name: String::new(),
                claims: Vec::new(),
                depends_on: None,
                system: true,
                created_at: now,
                updated_at: now,
            };
            self.submit(MutationType::UpsertScope, &tenant.slug, &scope)
                .await?;
        }

        for (name, description) in SYSTEM_ROLES {
            let role = Role {
                name: name.to_string(),
                description: description.to_string(),
                inherits_from: None,
                system: true,
                permissions: BTreeSet::new(),
                created_at: now,
                updated_at: now,
            };
            self.submit(MutationType::UpsertRole, &tenant.slug, &role)
                .await?;
        }
        Ok(())
    }

    /// Detached best-effort data-plane sync after a settings change;
    /// never blocks the admin response. Leader-only by construction (the
    /// settings write already required leadership).
    fn spawn_data_plane_sync(&self, slug: &str, db_changed: bool) {
        let tenant_db = Arc::clone(&self.tenant_db);
        let slug = slug.to_string();
        let cancel = self.side_effects.child_token();
        tokio::spawn(async move {
            if db_changed {
                tenant_db.refresh(&slug).await;
            }
            match tenant_db.bootstrap(&slug, &cancel).await {
                Ok(report) => tracing::info!(
                    "Data-plane sync for '{}': {} migrations, {} fields",
                    slug,
                    report.migrations_applied.len(),
                    report.synced_fields.len()
                ),
                Err(e) => tracing::warn!("Data-plane sync failed for '{}': {}", slug, e),
            }
        });
    }
}

/// Merge a three-valued settings patch into the current settings.
fn apply_settings_patch(settings: &mut TenantSettings, patch: TenantSettingsPatch) {
    patch.issuer_mode.apply_to_required(&mut settings.issuer_mode);
    patch.issuer_override.apply_to(&mut settings.issuer_override);
    patch
        .session_ttl_seconds
        .apply_to_required(&mut settings.session_ttl_seconds);
    patch.mfa_enabled.apply_to_required(&mut settings.mfa_enabled);
    patch
        .social_login_enabled
        .apply_to_required(&mut settings.social_login_enabled);

    match patch.user_db {
        Patch::Absent => {}
        Patch::Null => settings.user_db = None,
        Patch::Value(db) => {
            // A new block without a plaintext DSN keeps the stored
            // ciphertext as long as the driver is unchanged.
            let kept_enc = settings
                .user_db
                .as_ref()
                .filter(|old| old.driver == db.driver && db.dsn.is_none())
                .and_then(|old| old.dsn_enc.clone());
            settings.user_db = Some(UserDbConfig {
                driver: db.driver,
                dsn: db.dsn,
                dsn_enc: kept_enc,
                schema: db.schema,
                max_connections: db.max_connections,
            });
        }
    }

    match patch.smtp {
        Patch::Absent => {}
        Patch::Null => settings.smtp = None,
        Patch::Value(smtp) => {
            let kept_enc = settings
                .smtp
                .as_ref()
                .filter(|_| smtp.password.is_none())
                .and_then(|old| old.password_enc.clone());
            settings.smtp = Some(hivejar_models::SmtpConfig {
                host: smtp.host,
                port: smtp.port,
                username: smtp.username,
                password: smtp.password,
                password_enc: kept_enc,
                sender_address: smtp.sender_address,
                sender_name: smtp.sender_name,
            });
        }
    }

    patch.cache.apply_to(&mut settings.cache);

    if let Patch::Value(security) = patch.security {
        if let Some(v) = security.password_min_length {
            settings.security.password_min_length = v;
        }
        if let Some(v) = security.max_login_attempts {
            settings.security.max_login_attempts = v;
        }
        if let Some(v) = security.lockout_duration_minutes {
            settings.security.lockout_duration_minutes = v;
        }
    }

    match patch.social_providers {
        Patch::Absent => {}
        Patch::Null => settings.social_providers = None,
        Patch::Value(incoming) => {
            // Per-provider merge: a provider sent without a new secret
            // keeps its stored ciphertext when the client id matches.
            let old = settings.social_providers.take().unwrap_or_default();
            let merge = |new: Option<hivejar_models::SocialProviderConfig>,
                         old: Option<hivejar_models::SocialProviderConfig>| {
                new.map(|mut p| {
                    if p.client_secret.is_none() && p.client_secret_enc.is_none() {
                        if let Some(old) = old.filter(|o| o.client_id == p.client_id) {
                            p.client_secret_enc = old.client_secret_enc;
                        }
                    }
                    p
                })
            };
            settings.social_providers = Some(hivejar_models::SocialProviders {
                google: merge(incoming.google, old.google),
                github: merge(incoming.github, old.github),
            });
        }
    }

    if let Patch::Value(fields) = patch.user_fields {
        settings.user_fields = fields;
    }
    if let Patch::Value(templates) = patch.mail_templates {
        settings.mail_templates = templates;
    }
    if let Patch::Value(consent) = patch.consent {
        settings.consent = consent;
    }
    if let Patch::Value(claims) = patch.claims {
        settings.claims = claims;
    }
}
