use crate::claims::ClaimDefinition;
use crate::client::OAuthClient;
use crate::role::Role;
use crate::scope::Scope;
use crate::tenant::Tenant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full configuration export of one tenant.
///
/// System scopes and system roles are never exported; user password
/// hashes never leave the data plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantExport {
    pub tenant: Tenant,

    #[serde(default)]
    pub clients: Vec<OAuthClient>,

    #[serde(default)]
    pub scopes: Vec<Scope>,

    #[serde(default)]
    pub claims: Vec<ClaimDefinition>,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub users: Vec<ExportedUser>,
}

/// Data-plane user as it appears in exports: no password hash, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedUser {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// What to include in an export beyond the base configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    pub include_roles: bool,
    pub include_users: bool,
}

/// Import application mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert entities from the payload, keep everything else.
    Merge,
    /// Replace the tenant's configuration with the payload.
    Replace,
}

impl Default for ImportMode {
    fn default() -> Self {
        ImportMode::Merge
    }
}

/// Outcome of a dry-run or applied import.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub clients: usize,
    pub scopes: usize,
    pub claims: usize,
    pub roles: usize,
    pub users: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
