use crate::error::{ControlError, Result};
use crate::service::ControlPlane;
use chrono::Utc;
use hivejar_models::mutation::DeleteByKey;
use hivejar_models::{ClaimDefinition, CreateClaim, MutationType, UpdateClaim};
use uuid::Uuid;

impl ControlPlane {
    pub async fn create_claim(
        &self,
        slug_or_id: &str,
        input: CreateClaim,
    ) -> Result<ClaimDefinition> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        if input.name.trim().is_empty() || input.name.len() > 128 {
            return Err(ControlError::InvalidInput(
                "claim name must be between 1 and 128 characters".to_string(),
            ));
        }
        let existing = self.store().list_claims(&tenant.slug)?;
        if existing.iter().any(|c| c.name == input.name) {
            return Err(ControlError::AlreadyExists(format!(
                "claim '{}' already exists",
                input.name
            )));
        }

        let now = Utc::now();
        let claim = ClaimDefinition {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            source: input.source,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        };

        self.submit(MutationType::UpsertClaim, &tenant.slug, &claim)
            .await?;
        self.get_claim(&tenant.slug, claim.id)
    }

    pub fn get_claim(&self, slug_or_id: &str, id: Uuid) -> Result<ClaimDefinition> {
        let tenant = self.get_tenant(slug_or_id)?;
        self.store()
            .get_claim(&tenant.slug, id)?
            .ok_or_else(|| ControlError::NotFound(format!("claim '{}'", id)))
    }

    pub fn list_claims(&self, slug_or_id: &str) -> Result<Vec<ClaimDefinition>> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.store().list_claims(&tenant.slug)?)
    }

    /// Update a claim; the name is immutable after create.
    pub async fn update_claim(
        &self,
        slug_or_id: &str,
        id: Uuid,
        input: UpdateClaim,
    ) -> Result<ClaimDefinition> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let mut claim = self
            .store()
            .get_claim(&tenant.slug, id)?
            .ok_or_else(|| ControlError::NotFound(format!("claim '{}'", id)))?;

        if let Some(description) = input.description {
            claim.description = description;
        }
        if let Some(source) = input.source {
            claim.source = source;
        }
        if let Some(enabled) = input.enabled {
            claim.enabled = enabled;
        }
        claim.updated_at = Utc::now();

        self.submit(MutationType::UpsertClaim, &tenant.slug, &claim)
            .await?;
        self.get_claim(&tenant.slug, id)
    }

    pub async fn delete_claim(&self, slug_or_id: &str, id: Uuid) -> Result<()> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        if self.store().get_claim(&tenant.slug, id)?.is_none() {
            return Err(ControlError::NotFound(format!("claim '{}'", id)));
        }

        self.submit(
            MutationType::DeleteClaim,
            &tenant.slug,
            &DeleteByKey { key: id.to_string() },
        )
        .await?;
        Ok(())
    }
}
