use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// OAuth2 client registered under a tenant.
///
/// Public clients never carry a secret; confidential clients always carry
/// one (generated at creation when not supplied, replaced on rotation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClient {
    pub id: Uuid,
    pub client_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Envelope-encrypted client secret; present iff confidential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_enc: Option<String>,

    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_seconds: u64,

    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_seconds: u64,

    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,

    #[serde(default)]
    pub require_email_verification: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Public,
    Confidential,
}

fn default_access_token_ttl() -> u64 {
    3600
}

fn default_refresh_token_ttl() -> u64 {
    2_592_000
}

/// Create client request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClient {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(rename = "type")]
    pub client_type: ClientType,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Optional caller-chosen secret for confidential clients; one is
    /// generated when absent.
    #[serde(default)]
    pub secret: Option<String>,

    pub access_token_ttl_seconds: Option<u64>,
    pub refresh_token_ttl_seconds: Option<u64>,

    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,

    #[serde(default)]
    pub require_email_verification: bool,
}

/// Update client request (client_id and type are immutable)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClient {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub redirect_uris: Option<Vec<String>>,
    pub allowed_origins: Option<Vec<String>>,
    pub providers: Option<Vec<String>>,
    pub scopes: Option<Vec<String>>,
    pub access_token_ttl_seconds: Option<u64>,
    pub refresh_token_ttl_seconds: Option<u64>,
    pub post_logout_redirect_uris: Option<Vec<String>>,
    pub require_email_verification: Option<bool>,
}

/// Client plus the one-time plaintext secret, returned only from create
/// and rotate responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWithSecret {
    #[serde(flatten)]
    pub client: OAuthClient,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}
