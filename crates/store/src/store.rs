use crate::error::{Result, StoreError};
use hivejar_crypto::canonicalize;
use hivejar_models::{ClaimDefinition, OAuthClient, Role, Scope, SigningKey, Tenant};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// Callback invoked when the store enters or leaves the degraded state.
pub type DegradedHook = Box<dyn Fn(bool) + Send + Sync>;

/// Which signing-key slot a blob occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    Active,
    Retiring,
}

impl KeySlot {
    fn file_name(&self) -> &'static str {
        match self {
            KeySlot::Active => "active.json",
            KeySlot::Retiring => "retiring.json",
        }
    }
}

/// Authoritative per-tenant configuration store.
///
/// Each tenant owns a subtree of typed blobs addressed by slug; every blob
/// is canonical JSON so replicas applying the same mutation log hold
/// byte-identical files. Updates are atomic per blob: stage to a temp
/// file, fsync, rename.
pub struct ConfigStore {
    root: PathBuf,
    version: AtomicU64,
    degraded: AtomicBool,
    degraded_hook: RwLock<Option<DegradedHook>>,
}

impl ConfigStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("tenants"))?;
        Ok(Self {
            root,
            version: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
            degraded_hook: RwLock::new(None),
        })
    }

    /// Register the degraded-state hook. Owned by the application
    /// container; replaces any previous hook.
    pub fn set_degraded_hook(&self, hook: DegradedHook) {
        *self.degraded_hook.write().expect("degraded hook lock") = Some(hook);
    }

    /// Monotonic counter bumped on every successful write; caches key
    /// their invalidation off it.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    // ---- tenant blobs ----

    pub fn put_tenant(&self, tenant: &Tenant) -> Result<()> {
        if tenant.settings.has_plaintext_secrets() {
            return Err(StoreError::PlaintextSecrets(tenant.slug.clone()));
        }
        self.write_json(&self.tenant_file(&tenant.slug), tenant)
    }

    pub fn get_tenant(&self, slug: &str) -> Result<Option<Tenant>> {
        self.read_json(&self.tenant_file(slug))
    }

    /// Scan for the tenant whose id matches; used for slug-or-UUID lookup.
    pub fn get_tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>> {
        for slug in self.list_tenant_slugs()? {
            if let Some(tenant) = self.get_tenant(&slug)? {
                if tenant.id == id {
                    return Ok(Some(tenant));
                }
            }
        }
        Ok(None)
    }

    /// All tenant slugs, sorted.
    pub fn list_tenant_slugs(&self) -> Result<Vec<String>> {
        let dir = self.root.join("tenants");
        let mut slugs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    // A directory without a tenant blob is a partially
                    // deleted subtree; skip it.
                    if self.tenant_file(name).exists() {
                        slugs.push(name.to_string());
                    }
                }
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    /// Remove the whole tenant subtree: tenant blob, clients, scopes,
    /// claims, roles, and keys.
    pub fn delete_tenant_tree(&self, slug: &str) -> Result<()> {
        let dir = self.tenant_dir(slug);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                self.mark_write_ok();
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                self.mark_write_failed(&e);
                Err(e.into())
            }
        }
    }

    // ---- client blobs ----

    pub fn put_client(&self, slug: &str, client: &OAuthClient) -> Result<()> {
        self.write_json(&self.client_file(slug, &client.client_id), client)
    }

    pub fn get_client(&self, slug: &str, client_id: &str) -> Result<Option<OAuthClient>> {
        self.read_json(&self.client_file(slug, client_id))
    }

    pub fn list_clients(&self, slug: &str) -> Result<Vec<OAuthClient>> {
        let mut clients: Vec<OAuthClient> = self.read_dir_json(&self.tenant_dir(slug).join("clients"))?;
        clients.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.client_id.cmp(&b.client_id)));
        Ok(clients)
    }

    pub fn delete_client(&self, slug: &str, client_id: &str) -> Result<()> {
        self.remove_file(&self.client_file(slug, client_id))
    }

    // ---- scope blobs ----

    pub fn put_scope(&self, slug: &str, scope: &Scope) -> Result<()> {
        self.write_json(&self.scope_file(slug, &scope.name), scope)
    }

    pub fn get_scope(&self, slug: &str, name: &str) -> Result<Option<Scope>> {
        self.read_json(&self.scope_file(slug, name))
    }

    pub fn list_scopes(&self, slug: &str) -> Result<Vec<Scope>> {
        let mut scopes: Vec<Scope> = self.read_dir_json(&self.tenant_dir(slug).join("scopes"))?;
        scopes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scopes)
    }

    pub fn delete_scope(&self, slug: &str, name: &str) -> Result<()> {
        self.remove_file(&self.scope_file(slug, name))
    }

    // ---- claim blobs ----

    pub fn put_claim(&self, slug: &str, claim: &ClaimDefinition) -> Result<()> {
        self.write_json(&self.claim_file(slug, claim.id), claim)
    }

    pub fn get_claim(&self, slug: &str, id: Uuid) -> Result<Option<ClaimDefinition>> {
        self.read_json(&self.claim_file(slug, id))
    }

    pub fn list_claims(&self, slug: &str) -> Result<Vec<ClaimDefinition>> {
        let mut claims: Vec<ClaimDefinition> = self.read_dir_json(&self.tenant_dir(slug).join("claims"))?;
        claims.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(claims)
    }

    pub fn delete_claim(&self, slug: &str, id: Uuid) -> Result<()> {
        self.remove_file(&self.claim_file(slug, id))
    }

    // ---- role blobs ----

    pub fn put_role(&self, slug: &str, role: &Role) -> Result<()> {
        self.write_json(&self.role_file(slug, &role.name), role)
    }

    pub fn get_role(&self, slug: &str, name: &str) -> Result<Option<Role>> {
        self.read_json(&self.role_file(slug, name))
    }

    pub fn list_roles(&self, slug: &str) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.read_dir_json(&self.tenant_dir(slug).join("roles"))?;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    pub fn delete_role(&self, slug: &str, name: &str) -> Result<()> {
        self.remove_file(&self.role_file(slug, name))
    }

    // ---- signing key blobs ----

    /// Write a key blob verbatim. Rotation payloads are pre-serialized on
    /// the leader so every replica persists identical bytes.
    pub fn put_key_raw(&self, slug: &str, slot: KeySlot, json: &[u8]) -> Result<()> {
        self.write_bytes(&self.key_file(slug, slot), json)
    }

    pub fn get_key(&self, slug: &str, slot: KeySlot) -> Result<Option<SigningKey>> {
        self.read_json(&self.key_file(slug, slot))
    }

    pub fn delete_key(&self, slug: &str, slot: KeySlot) -> Result<()> {
        self.remove_file(&self.key_file(slug, slot))
    }

    // ---- path layout ----

    fn tenant_dir(&self, slug: &str) -> PathBuf {
        self.root.join("tenants").join(slug)
    }

    fn tenant_file(&self, slug: &str) -> PathBuf {
        self.tenant_dir(slug).join("tenant.json")
    }

    fn client_file(&self, slug: &str, client_id: &str) -> PathBuf {
        self.tenant_dir(slug).join("clients").join(format!("{}.json", client_id))
    }

    fn scope_file(&self, slug: &str, name: &str) -> PathBuf {
        self.tenant_dir(slug).join("scopes").join(format!("{}.json", name))
    }

    fn claim_file(&self, slug: &str, id: Uuid) -> PathBuf {
        self.tenant_dir(slug).join("claims").join(format!("{}.json", id))
    }

    fn role_file(&self, slug: &str, name: &str) -> PathBuf {
        self.tenant_dir(slug).join("roles").join(format!("{}.json", name))
    }

    fn key_file(&self, slug: &str, slot: KeySlot) -> PathBuf {
        self.tenant_dir(slug).join("keys").join(slot.file_name())
    }

    // ---- blob primitives ----

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = canonicalize(value)?;
        self.write_bytes(path, &bytes)
    }

    /// Atomic single-blob swap: temp file in the target directory, fsync,
    /// rename over the final name. On rename failure, remove the target
    /// and retry the rename once.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let result = self.write_bytes_inner(path, bytes);
        match &result {
            Ok(()) => self.mark_write_ok(),
            Err(StoreError::Io(e)) => self.mark_write_failed(e),
            Err(_) => {}
        }
        result
    }

    fn write_bytes_inner(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path.parent().expect("blob path has a parent");
        fs::create_dir_all(parent)?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        if let Err(rename_err) = fs::rename(&tmp, path) {
            // Some filesystems refuse to rename over an existing file.
            fs::remove_file(path).ok();
            if let Err(retry_err) = fs::rename(&tmp, path) {
                fs::remove_file(&tmp).ok();
                tracing::error!(
                    "Atomic rename failed for {}: {} (first attempt: {})",
                    path.display(),
                    retry_err,
                    rename_err
                );
                return Err(retry_err.into());
            }
        }
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_dir_json<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let bytes = fs::read(&path)?;
                values.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(values)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                self.mark_write_ok();
                Ok(())
            }
            // Deletes tolerate missing targets so log replay stays
            // idempotent.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                self.mark_write_failed(&e);
                Err(e.into())
            }
        }
    }

    fn mark_write_ok(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        if self.degraded.swap(false, Ordering::AcqRel) {
            tracing::info!("Config store recovered from degraded state");
            self.notify_degraded(false);
        }
    }

    fn mark_write_failed(&self, err: &std::io::Error) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::error!("Config store entering degraded state: {}", err);
            self.notify_degraded(true);
        }
    }

    fn notify_degraded(&self, degraded: bool) {
        if let Some(hook) = self.degraded_hook.read().expect("degraded hook lock").as_ref() {
            hook(degraded);
        }
    }
}
