use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

pub const ROLE_NAME_MAX_LEN: usize = 100;

lazy_static! {
    static ref ROLE_NAME_RE: Regex = Regex::new(r"^[a-z][a-z0-9-]*$").unwrap();
}

/// Validate a role name: lowercase, starts with a letter, at most 100
/// characters.
pub fn validate_role_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("role name must not be empty".to_string());
    }
    if name.len() > ROLE_NAME_MAX_LEN {
        return Err(format!("role name must be at most {} characters", ROLE_NAME_MAX_LEN));
    }
    if !ROLE_NAME_RE.is_match(name) {
        return Err(
            "role name must start with a letter and contain only lowercase letters, digits, and hyphens"
                .to_string(),
        );
    }
    Ok(())
}

/// RBAC role, unique by name within a tenant.
///
/// System roles cannot change properties or be deleted. `inherits_from`
/// must reference an existing role and the inheritance graph stays acyclic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    #[serde(default)]
    pub system: bool,

    /// BTreeSet keeps the persisted permission list sorted and deduplicated.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub permissions: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create role request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub inherits_from: Option<String>,

    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// Update role request (name is the key; system roles reject updates)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRole {
    pub description: Option<String>,
    pub inherits_from: Option<Option<String>>,
    pub permissions: Option<BTreeSet<String>>,
}
