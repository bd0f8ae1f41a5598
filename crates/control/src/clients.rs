use crate::error::{ControlError, Result};
use crate::service::ControlPlane;
use chrono::Utc;
use hivejar_models::{
    secrets, ClientType, ClientWithSecret, CreateClient, MutationType, OAuthClient, UpdateClient,
};
use hivejar_models::mutation::DeleteByKey;
use rand::RngCore;
use uuid::Uuid;

impl ControlPlane {
    /// Register an OAuth client under a tenant.
    ///
    /// Confidential clients always end up with a secret: the caller's, or
    /// a generated one. The plaintext is returned from this call only.
    pub async fn create_client(
        &self,
        slug_or_id: &str,
        input: CreateClient,
    ) -> Result<ClientWithSecret> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        if input.name.trim().is_empty() || input.name.len() > 255 {
            return Err(ControlError::InvalidInput(
                "client name must be between 1 and 255 characters".to_string(),
            ));
        }
        if input.client_type == ClientType::Public && input.secret.is_some() {
            return Err(ControlError::InvalidInput(
                "public clients must not carry a secret".to_string(),
            ));
        }

        let client_id = generate_client_id();
        let now = Utc::now();

        let (plain_secret, secret_enc) = match input.client_type {
            ClientType::Confidential => {
                let secret = input.secret.unwrap_or_else(generate_client_secret);
                let sealed = self.envelope().seal_string(
                    &secret,
                    &secrets::client_secret_aad(&tenant.slug, &client_id),
                )?;
                (Some(secret), Some(sealed))
            }
            ClientType::Public => (None, None),
        };

        let client = OAuthClient {
            id: Uuid::new_v4(),
            client_id: client_id.clone(),
            name: input.name,
            client_type: input.client_type,
            redirect_uris: input.redirect_uris,
            allowed_origins: input.allowed_origins,
            providers: input.providers,
            scopes: input.scopes,
            secret_enc,
            access_token_ttl_seconds: input.access_token_ttl_seconds.unwrap_or(3600),
            refresh_token_ttl_seconds: input.refresh_token_ttl_seconds.unwrap_or(2_592_000),
            post_logout_redirect_uris: input.post_logout_redirect_uris,
            require_email_verification: input.require_email_verification,
            created_at: now,
            updated_at: now,
        };

        self.submit(MutationType::UpsertClient, &tenant.slug, &client)
            .await?;
        tracing::info!("Client created: tenant={} client_id={}", tenant.slug, client_id);

        let client = self
            .store()
            .get_client(&tenant.slug, &client_id)?
            .ok_or_else(|| ControlError::Internal("client vanished after apply".to_string()))?;

        Ok(ClientWithSecret {
            client,
            secret: plain_secret,
        })
    }

    pub fn get_client(&self, slug_or_id: &str, client_id: &str) -> Result<OAuthClient> {
        let tenant = self.get_tenant(slug_or_id)?;
        self.store()
            .get_client(&tenant.slug, client_id)?
            .ok_or_else(|| ControlError::NotFound(format!("client '{}'", client_id)))
    }

    pub fn list_clients(&self, slug_or_id: &str) -> Result<Vec<OAuthClient>> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.store().list_clients(&tenant.slug)?)
    }

    pub async fn update_client(
        &self,
        slug_or_id: &str,
        client_id: &str,
        input: UpdateClient,
    ) -> Result<OAuthClient> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let mut client = self
            .store()
            .get_client(&tenant.slug, client_id)?
            .ok_or_else(|| ControlError::NotFound(format!("client '{}'", client_id)))?;

        if let Some(name) = input.name {
            if name.trim().is_empty() || name.len() > 255 {
                return Err(ControlError::InvalidInput(
                    "client name must be between 1 and 255 characters".to_string(),
                ));
            }
            client.name = name;
        }
        if let Some(redirect_uris) = input.redirect_uris {
            client.redirect_uris = redirect_uris;
        }
        if let Some(allowed_origins) = input.allowed_origins {
            client.allowed_origins = allowed_origins;
        }
        if let Some(providers) = input.providers {
            client.providers = providers;
        }
        if let Some(scopes) = input.scopes {
            client.scopes = scopes;
        }
        if let Some(ttl) = input.access_token_ttl_seconds {
            client.access_token_ttl_seconds = ttl;
        }
        if let Some(ttl) = input.refresh_token_ttl_seconds {
            client.refresh_token_ttl_seconds = ttl;
        }
        if let Some(uris) = input.post_logout_redirect_uris {
            client.post_logout_redirect_uris = uris;
        }
        if let Some(require) = input.require_email_verification {
            client.require_email_verification = require;
        }
        client.updated_at = Utc::now();

        self.submit(MutationType::UpsertClient, &tenant.slug, &client)
            .await?;
        Ok(self.get_client(&tenant.slug, client_id)?)
    }

    /// Rotate a confidential client's secret. The new plaintext is
    /// returned from this call exactly once; reads only ever see the
    /// encrypted form.
    pub async fn rotate_client_secret(
        &self,
        slug_or_id: &str,
        client_id: &str,
    ) -> Result<ClientWithSecret> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let mut client = self
            .store()
            .get_client(&tenant.slug, client_id)?
            .ok_or_else(|| ControlError::NotFound(format!("client '{}'", client_id)))?;

        if client.client_type != ClientType::Confidential {
            return Err(ControlError::InvalidInput(
                "public clients have no secret to rotate".to_string(),
            ));
        }

        let secret = generate_client_secret();
        client.secret_enc = Some(self.envelope().seal_string(
            &secret,
            &secrets::client_secret_aad(&tenant.slug, client_id),
        )?);
        client.updated_at = Utc::now();

        self.submit(MutationType::UpsertClient, &tenant.slug, &client)
            .await?;
        tracing::info!(
            "Client secret rotated: tenant={} client_id={}",
            tenant.slug,
            client_id
        );

        let client = self
            .store()
            .get_client(&tenant.slug, client_id)?
            .ok_or_else(|| ControlError::Internal("client vanished after apply".to_string()))?;
        Ok(ClientWithSecret {
            client,
            secret: Some(secret),
        })
    }

    pub async fn delete_client(&self, slug_or_id: &str, client_id: &str) -> Result<()> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        if self.store().get_client(&tenant.slug, client_id)?.is_none() {
            return Err(ControlError::NotFound(format!("client '{}'", client_id)));
        }

        self.submit(
            MutationType::DeleteClient,
            &tenant.slug,
            &DeleteByKey {
                key: client_id.to_string(),
            },
        )
        .await?;
        Ok(())
    }
}

fn generate_client_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn generate_client_secret() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
