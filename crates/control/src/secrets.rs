use crate::error::Result;
use hivejar_crypto::Envelope;
use hivejar_models::{secrets, TenantSettings};

/// Envelope-encrypt every plaintext secret in a settings blob and zero
/// the plain fields.
///
/// Runs on the leader before a mutation is emitted, so the replicated
/// payload carries ciphertext only and every replica persists identical
/// bytes. Fields already in `*_enc` form are left untouched.
pub fn seal_settings(settings: &mut TenantSettings, envelope: &Envelope, slug: &str) -> Result<()> {
    if let Some(db) = settings.user_db.as_mut() {
        if let Some(dsn) = db.dsn.take() {
            db.dsn_enc = Some(envelope.seal_string(&dsn, &secrets::dsn_aad(slug))?);
        }
    }

    if let Some(smtp) = settings.smtp.as_mut() {
        if let Some(password) = smtp.password.take() {
            smtp.password_enc =
                Some(envelope.seal_string(&password, &secrets::smtp_password_aad(slug))?);
        }
    }

    if let Some(providers) = settings.social_providers.as_mut() {
        for (name, provider) in [
            ("google", providers.google.as_mut()),
            ("github", providers.github.as_mut()),
        ] {
            if let Some(provider) = provider {
                if let Some(secret) = provider.client_secret.take() {
                    provider.client_secret_enc =
                        Some(envelope.seal_string(&secret, &secrets::social_secret_aad(slug, name))?);
                }
            }
        }
    }

    debug_assert!(!settings.has_plaintext_secrets());
    Ok(())
}
