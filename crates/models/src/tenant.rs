use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

pub const SLUG_MAX_LEN: usize = 32;

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9-]+$").unwrap();
}

/// Validate a tenant slug: lowercase kebab, at most 32 characters.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("slug must not be empty".to_string());
    }
    if slug.len() > SLUG_MAX_LEN {
        return Err(format!("slug must be at most {} characters", SLUG_MAX_LEN));
    }
    if !SLUG_RE.is_match(slug) {
        return Err("slug may only contain lowercase letters, digits, and hyphens".to_string());
    }
    Ok(())
}

/// Tenant: the isolation boundary owning configuration, users, and keys.
///
/// `id` and `slug` are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub language: String,
    pub settings: TenantSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create tenant request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenant {
    pub slug: String,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Defaults to "en" when empty or absent.
    #[serde(default)]
    pub language: Option<String>,

    pub settings: Option<TenantSettings>,
}

/// Update tenant request (slug and id are immutable)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenant {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub display_name: Option<String>,

    pub language: Option<String>,
}

/// How the OIDC issuer URL is derived for a tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssuerMode {
    Global,
    Path,
    Subdomain,
}

impl Default for IssuerMode {
    fn default() -> Self {
        IssuerMode::Global
    }
}

/// Per-tenant settings blob, embedded in the tenant record.
///
/// Secret-bearing fields come in plain/encrypted pairs; only the `*Enc`
/// form is ever persisted. The store encrypts and zeros the plain field
/// before writing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantSettings {
    #[serde(default)]
    pub issuer_mode: IssuerMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_override: Option<String>,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    #[serde(default)]
    pub mfa_enabled: bool,

    #[serde(default)]
    pub social_login_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_db: Option<UserDbConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSettings>,

    #[serde(default)]
    pub security: SecurityPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_providers: Option<SocialProviders>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_fields: Vec<UserField>,

    /// Keyed by template name; BTreeMap keeps persisted blobs key-sorted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mail_templates: BTreeMap<String, MailTemplate>,

    #[serde(default)]
    pub consent: ConsentPolicy,

    /// Standard-claim toggles and scope/claim bindings.
    #[serde(default)]
    pub claims: crate::claims::ClaimsSettings,
}

impl TenantSettings {
    /// True when any secret-bearing field still carries plaintext.
    pub fn has_plaintext_secrets(&self) -> bool {
        self.user_db.as_ref().is_some_and(|db| db.dsn.is_some())
            || self.smtp.as_ref().is_some_and(|s| s.password.is_some())
            || self.social_providers.as_ref().is_some_and(|sp| {
                sp.google.as_ref().is_some_and(|p| p.client_secret.is_some())
                    || sp.github.as_ref().is_some_and(|p| p.client_secret.is_some())
            })
    }
}

fn default_session_ttl() -> u64 {
    3600
}

/// Data-plane database driver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserDbDriver {
    Postgres,
    Mysql,
    Mongo,
}

/// Per-tenant data-plane database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDbConfig {
    pub driver: UserDbDriver,

    /// Plaintext DSN, accepted on writes only; never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    /// Envelope-encrypted DSN, the only form at rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn_enc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

/// Custom user column synced into the data-plane schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: UserFieldType,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserFieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
    Json,
}

/// Outbound SMTP configuration for the (external) email sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_enc: Option<String>,

    pub sender_address: String,

    #[serde(default)]
    pub sender_name: String,
}

/// Per-tenant cache configuration consumed by the data-plane facade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    pub url: String,
    #[serde(default)]
    pub key_prefix: String,
}

/// Password and lockout policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,

    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,

    #[serde(default = "default_lockout_duration_minutes")]
    pub lockout_duration_minutes: u32,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            password_min_length: 8,
            max_login_attempts: 5,
            lockout_duration_minutes: 15,
        }
    }
}

fn default_password_min_length() -> usize {
    8
}

fn default_max_login_attempts() -> u32 {
    5
}

fn default_lockout_duration_minutes() -> u32 {
    15
}

/// Social login provider configuration (providers themselves are external).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialProviders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<SocialProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<SocialProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialProviderConfig {
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_enc: Option<String>,

    #[serde(default)]
    pub enabled: bool,
}

/// Mailing template reference; rendering happens in the external sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailTemplate {
    pub subject: String,
    pub body: String,
}

/// Consent prompt policy for the OAuth surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPolicy {
    #[serde(default)]
    pub skip_for_trusted_clients: bool,

    #[serde(default = "default_consent_ttl_days")]
    pub remember_days: u32,
}

impl Default for ConsentPolicy {
    fn default() -> Self {
        Self {
            skip_for_trusted_clients: false,
            remember_days: 365,
        }
    }
}

fn default_consent_ttl_days() -> u32 {
    365
}
