// Core modules
pub mod tenant;
pub mod client;
pub mod scope;
pub mod claims;
pub mod role;
pub mod key;
pub mod mutation;
pub mod patch;
pub mod export;
pub mod secrets;

// Re-export commonly used types
pub use tenant::{
    Tenant, CreateTenant, UpdateTenant, TenantSettings, IssuerMode,
    UserDbConfig, UserDbDriver, UserField, UserFieldType, SmtpConfig,
    CacheSettings, SecurityPolicy, SocialProviders, SocialProviderConfig,
    MailTemplate, ConsentPolicy, validate_slug, SLUG_MAX_LEN,
};
pub use client::{OAuthClient, ClientType, CreateClient, UpdateClient, ClientWithSecret};
pub use scope::{Scope, CreateScope, UpdateScope};
pub use claims::{ClaimDefinition, CreateClaim, UpdateClaim, StandardClaim, ScopeMapping, ClaimsSettings};
pub use role::{Role, CreateRole, UpdateRole, validate_role_name, ROLE_NAME_MAX_LEN};
pub use key::{SigningKey, KeyStatus, KeyAlgorithm, Jwk, JwkSet};
pub use mutation::{Mutation, MutationType, RotateKeyPayload};
pub use patch::{Patch, TenantSettingsPatch, UserDbPatch, SmtpPatch, SecurityPolicyPatch};
pub use export::{TenantExport, ExportedUser, ExportOptions, ImportMode, ImportReport};
