use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a tenant signing key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Retiring,
    Revoked,
}

/// Signing algorithm; the manager is agnostic as long as the public
/// projection stays JWK-shaped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyAlgorithm {
    RS256,
    RS384,
    RS512,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::RS256 => "RS256",
            KeyAlgorithm::RS384 => "RS384",
            KeyAlgorithm::RS512 => "RS512",
        }
    }
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::RS256
    }
}

/// Per-tenant asymmetric signing key.
///
/// Exactly one `active` key exists per tenant at any moment; at most one
/// `retiring` key, which still verifies until `retired_at + grace_seconds`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SigningKey {
    pub kid: String,
    pub tenant_id: Uuid,
    pub algorithm: KeyAlgorithm,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub grace_seconds: u64,

    /// PKCS#8 PEM private key material.
    pub private_pem: String,

    /// Public projection served from the JWKS endpoint.
    pub public_jwk: Jwk,
}

impl SigningKey {
    /// A retiring key verifies strictly within `[retired_at, retired_at +
    /// grace_seconds)`.
    pub fn verifies_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            KeyStatus::Active => true,
            KeyStatus::Revoked => false,
            KeyStatus::Retiring => match self.retired_at {
                Some(retired_at) => {
                    let deadline = retired_at + chrono::Duration::seconds(self.grace_seconds as i64);
                    now >= retired_at && now < deadline
                }
                None => false,
            },
        }
    }
}

/// RFC 7517 JSON Web Key (public projection only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,

    #[serde(rename = "use")]
    pub key_use: String,

    pub alg: String,

    /// RSA modulus, Base64URL encoded.
    pub n: String,

    /// RSA exponent, Base64URL encoded.
    pub e: String,
}

/// Published JWKS document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key_with_status(status: KeyStatus, retired_at: Option<DateTime<Utc>>, grace: u64) -> SigningKey {
        SigningKey {
            kid: "k1".to_string(),
            tenant_id: Uuid::new_v4(),
            algorithm: KeyAlgorithm::RS256,
            status,
            created_at: Utc::now(),
            retired_at,
            grace_seconds: grace,
            private_pem: String::new(),
            public_jwk: Jwk {
                kty: "RSA".to_string(),
                kid: "k1".to_string(),
                key_use: "sig".to_string(),
                alg: "RS256".to_string(),
                n: String::new(),
                e: String::new(),
            },
        }
    }

    #[test]
    fn test_active_key_always_verifies() {
        let key = key_with_status(KeyStatus::Active, None, 0);
        assert!(key.verifies_at(Utc::now()));
    }

    #[test]
    fn test_retiring_key_verifies_inside_grace_window() {
        let retired_at = Utc::now();
        let key = key_with_status(KeyStatus::Retiring, Some(retired_at), 60);
        assert!(key.verifies_at(retired_at + Duration::seconds(30)));
        assert!(!key.verifies_at(retired_at + Duration::seconds(60)));
        assert!(!key.verifies_at(retired_at - Duration::seconds(1)));
    }

    #[test]
    fn test_zero_grace_revokes_immediately() {
        let retired_at = Utc::now();
        let key = key_with_status(KeyStatus::Retiring, Some(retired_at), 0);
        assert!(!key.verifies_at(retired_at));
        assert!(!key.verifies_at(retired_at + Duration::seconds(1)));
    }

    #[test]
    fn test_revoked_key_never_verifies() {
        let key = key_with_status(KeyStatus::Revoked, Some(Utc::now()), 3600);
        assert!(!key.verifies_at(Utc::now()));
    }
}
