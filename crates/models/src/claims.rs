use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Custom claim definition. The `name` is immutable after create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDefinition {
    pub id: Uuid,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Free-form source expression evaluated by the token issuer.
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create claim request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClaim {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub source: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Update claim request (`name` is immutable)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaim {
    pub description: Option<String>,
    pub source: Option<String>,
    pub enabled: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Built-in OIDC claim that can only be toggled on or off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardClaim {
    pub name: String,
    pub enabled: bool,
}

/// Binding of claims to a scope beyond the scope's own claim list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMapping {
    pub scope: String,
    pub claims: Vec<String>,
}

/// Claims configuration embedded in the tenant subtree.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsSettings {
    /// Keyed by claim name; BTreeMap keeps persisted blobs key-sorted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub standard: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_mappings: Vec<ScopeMapping>,
}
