use crate::error::{ControlError, Result};
use crate::service::ControlPlane;
use chrono::Utc;
use hivejar_models::mutation::DeleteByKey;
use hivejar_models::{CreateScope, MutationType, Scope, UpdateScope};

/// Scope names end up as store file names, so the charset is strict.
pub(crate) fn validate_scope_name(name: &str) -> crate::error::Result<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(ControlError::InvalidInput(
            "scope name must be between 1 and 128 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-'))
    {
        return Err(ControlError::InvalidInput(
            "scope name may only contain letters, digits, ':', '.', '_', and '-'".to_string(),
        ));
    }
    Ok(())
}

impl ControlPlane {
    pub async fn create_scope(&self, slug_or_id: &str, input: CreateScope) -> Result<Scope> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        validate_scope_name(&input.name)?;
        if self.store().get_scope(&tenant.slug, &input.name)?.is_some() {
            return Err(ControlError::AlreadyExists(format!(
                "scope '{}' already exists",
                input.name
            )));
        }
        if let Some(depends_on) = &input.depends_on {
            if self.store().get_scope(&tenant.slug, depends_on)?.is_none() {
                return Err(ControlError::InvalidInput(format!(
                    "dependency scope '{}' does not exist",
                    depends_on
                )));
            }
        }

        let now = Utc::now();
        let scope = Scope {
            name: input.name.clone(),
            description: input.description,
            display_name: input.display_name,
            claims: input.claims,
            depends_on: input.depends_on,
            system: false,
            created_at: now,
            updated_at: now,
        };

        self.submit(MutationType::UpsertScope, &tenant.slug, &scope)
            .await?;
        self.get_scope(&tenant.slug, &input.name)
    }

    pub fn get_scope(&self, slug_or_id: &str, name: &str) -> Result<Scope> {
        let tenant = self.get_tenant(slug_or_id)?;
        self.store()
            .get_scope(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("scope '{}'", name)))
    }

    pub fn list_scopes(&self, slug_or_id: &str) -> Result<Vec<Scope>> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.store().list_scopes(&tenant.slug)?)
    }

    pub async fn update_scope(
        &self,
        slug_or_id: &str,
        name: &str,
        input: UpdateScope,
    ) -> Result<Scope> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let mut scope = self
            .store()
            .get_scope(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("scope '{}'", name)))?;

        if scope.system {
            return Err(ControlError::Conflict(format!(
                "system scope '{}' is immutable",
                name
            )));
        }

        if let Some(description) = input.description {
            scope.description = description;
        }
        if let Some(display_name) = input.display_name {
            scope.display_name = display_name;
        }
        if let Some(claims) = input.claims {
            scope.claims = claims;
        }
        if let Some(depends_on) = input.depends_on {
            if let Some(target) = &depends_on {
                if self.store().get_scope(&tenant.slug, target)?.is_none() {
                    return Err(ControlError::InvalidInput(format!(
                        "dependency scope '{}' does not exist",
                        target
                    )));
                }
            }
            scope.depends_on = depends_on;
        }
        scope.updated_at = Utc::now();

        self.submit(MutationType::UpsertScope, &tenant.slug, &scope)
            .await?;
        self.get_scope(&tenant.slug, name)
    }

    pub async fn delete_scope(&self, slug_or_id: &str, name: &str) -> Result<()> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let scope = self
            .store()
            .get_scope(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("scope '{}'", name)))?;

        if scope.system {
            return Err(ControlError::Conflict(format!(
                "system scope '{}' cannot be deleted",
                name
            )));
        }

        self.submit(
            MutationType::DeleteScope,
            &tenant.slug,
            &DeleteByKey {
                key: name.to_string(),
            },
        )
        .await?;
        Ok(())
    }
}
