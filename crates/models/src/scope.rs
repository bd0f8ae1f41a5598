use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// OAuth2 scope definition, unique by name within a tenant.
///
/// System scopes (openid, profile, email, ...) are immutable and
/// undeletable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub claims: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,

    #[serde(default)]
    pub system: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create scope request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScope {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub claims: Vec<String>,

    #[serde(default)]
    pub depends_on: Option<String>,
}

/// Update scope request (name is the key; system scopes reject updates)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScope {
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub claims: Option<Vec<String>>,
    pub depends_on: Option<Option<String>>,
}
