use crate::tenant::{
    CacheSettings, IssuerMode, SocialProviders, UserDbDriver, UserField,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Three-valued presence for PATCH bodies.
///
/// JSON distinguishes a field that is absent from one that is explicitly
/// `null`; both collapse to `None` under a plain `Option`. Update DTOs
/// wrap optional scalars in `Patch` so "leave unchanged", "clear", and
/// "set" survive deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    /// Field absent from the request: leave the current value unchanged.
    #[default]
    Absent,
    /// Field present as `null`: clear the current value.
    Null,
    /// Field present with a value: replace the current value.
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    /// Apply this patch to an optional target field.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Null => *target = None,
            Patch::Value(v) => *target = Some(v),
        }
    }

    /// Apply this patch to a required target field; `null` is ignored.
    pub fn apply_to_required(self, target: &mut T) {
        if let Patch::Value(v) = self {
            *target = v;
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Reached only when the field is present; #[serde(default)] on the
        // containing struct yields Absent for missing fields.
        let value = Option::<T>::deserialize(deserializer)?;
        Ok(match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        })
    }
}

/// Partial update for tenant settings; every field is three-valued.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantSettingsPatch {
    pub issuer_mode: Patch<IssuerMode>,
    pub issuer_override: Patch<String>,
    pub session_ttl_seconds: Patch<u64>,
    pub mfa_enabled: Patch<bool>,
    pub social_login_enabled: Patch<bool>,
    pub user_db: Patch<UserDbPatch>,
    pub smtp: Patch<SmtpPatch>,
    pub cache: Patch<CacheSettings>,
    pub security: Patch<SecurityPolicyPatch>,
    pub social_providers: Patch<SocialProviders>,
    pub user_fields: Patch<Vec<UserField>>,
    pub mail_templates: Patch<BTreeMap<String, crate::tenant::MailTemplate>>,
    pub consent: Patch<crate::tenant::ConsentPolicy>,
    pub claims: Patch<crate::claims::ClaimsSettings>,
}

/// Partial update of the data-plane database block.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDbPatch {
    pub driver: UserDbDriver,

    #[serde(default)]
    pub dsn: Option<String>,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub max_connections: Option<u32>,
}

/// Partial update of the SMTP block.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmtpPatch {
    pub host: String,
    pub port: u16,
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    pub sender_address: String,

    #[serde(default)]
    pub sender_name: String,
}

/// Partial update of the security policy; plain options suffice because
/// none of these fields is clearable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicyPatch {
    pub password_min_length: Option<usize>,
    pub max_login_attempts: Option<u32>,
    pub lockout_duration_minutes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct Probe {
        field: Patch<String>,
    }

    #[test]
    fn test_absent_field() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.field, Patch::Absent);
    }

    #[test]
    fn test_null_field() {
        let probe: Probe = serde_json::from_str(r#"{"field":null}"#).unwrap();
        assert_eq!(probe.field, Patch::Null);
    }

    #[test]
    fn test_present_field() {
        let probe: Probe = serde_json::from_str(r#"{"field":"x"}"#).unwrap();
        assert_eq!(probe.field, Patch::Value("x".to_string()));
    }

    #[test]
    fn test_apply_semantics() {
        let mut target = Some("old".to_string());
        Patch::Absent.apply_to(&mut target);
        assert_eq!(target.as_deref(), Some("old"));

        Patch::Value("new".to_string()).apply_to(&mut target);
        assert_eq!(target.as_deref(), Some("new"));

        Patch::<String>::Null.apply_to(&mut target);
        assert_eq!(target, None);
    }

    #[test]
    fn test_settings_patch_distinguishes_mfa_presence() {
        let patch: TenantSettingsPatch = serde_json::from_str(r#"{"mfaEnabled":true}"#).unwrap();
        assert_eq!(patch.mfa_enabled, Patch::Value(true));
        assert!(patch.session_ttl_seconds.is_absent());
        assert!(patch.user_db.is_absent());
    }
}
