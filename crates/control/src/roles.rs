use crate::error::{ControlError, Result};
use crate::service::ControlPlane;
use chrono::Utc;
use hivejar_models::mutation::DeleteByKey;
use hivejar_models::{validate_role_name, CreateRole, MutationType, Role, UpdateRole};
use std::collections::HashSet;

impl ControlPlane {
    pub async fn create_role(&self, slug_or_id: &str, input: CreateRole) -> Result<Role> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        validate_role_name(&input.name).map_err(ControlError::InvalidInput)?;
        if self.store().get_role(&tenant.slug, &input.name)?.is_some() {
            return Err(ControlError::AlreadyExists(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        if let Some(parent) = &input.inherits_from {
            self.check_inheritance(&tenant.slug, &input.name, parent)?;
        }

        let now = Utc::now();
        let role = Role {
            name: input.name.clone(),
            description: input.description,
            inherits_from: input.inherits_from,
            system: false,
            permissions: input.permissions,
            created_at: now,
            updated_at: now,
        };

        self.submit(MutationType::UpsertRole, &tenant.slug, &role)
            .await?;
        self.get_role(&tenant.slug, &input.name)
    }

    pub fn get_role(&self, slug_or_id: &str, name: &str) -> Result<Role> {
        let tenant = self.get_tenant(slug_or_id)?;
        self.store()
            .get_role(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("role '{}'", name)))
    }

    pub fn list_roles(&self, slug_or_id: &str) -> Result<Vec<Role>> {
        let tenant = self.get_tenant(slug_or_id)?;
        Ok(self.store().list_roles(&tenant.slug)?)
    }

    pub async fn update_role(
        &self,
        slug_or_id: &str,
        name: &str,
        input: UpdateRole,
    ) -> Result<Role> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let mut role = self
            .store()
            .get_role(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("role '{}'", name)))?;

        if role.system {
            return Err(ControlError::Conflict(format!(
                "system role '{}' is immutable",
                name
            )));
        }

        if let Some(description) = input.description {
            role.description = description;
        }
        if let Some(inherits_from) = input.inherits_from {
            if let Some(parent) = &inherits_from {
                self.check_inheritance(&tenant.slug, name, parent)?;
            }
            role.inherits_from = inherits_from;
        }
        if let Some(permissions) = input.permissions {
            role.permissions = permissions;
        }
        role.updated_at = Utc::now();

        self.submit(MutationType::UpsertRole, &tenant.slug, &role)
            .await?;
        self.get_role(&tenant.slug, name)
    }

    pub async fn delete_role(&self, slug_or_id: &str, name: &str) -> Result<()> {
        let _serial = self.write_lock().await;
        self.check_writable()?;

        let tenant = self.get_tenant(slug_or_id)?;
        let role = self
            .store()
            .get_role(&tenant.slug, name)?
            .ok_or_else(|| ControlError::NotFound(format!("role '{}'", name)))?;

        if role.system {
            return Err(ControlError::Conflict(format!(
                "system role '{}' cannot be deleted",
                name
            )));
        }

        self.submit(
            MutationType::DeleteRole,
            &tenant.slug,
            &DeleteByKey {
                key: name.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    /// Effective permissions of a role including everything it inherits.
    pub fn resolve_permissions(&self, slug_or_id: &str, name: &str) -> Result<Vec<String>> {
        let tenant = self.get_tenant(slug_or_id)?;
        let mut permissions = std::collections::BTreeSet::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(name.to_string());

        while let Some(current) = cursor {
            if !visited.insert(current.clone()) {
                // Cycles are rejected on write; stop defensively on read.
                break;
            }
            let role = self
                .store()
                .get_role(&tenant.slug, &current)?
                .ok_or_else(|| ControlError::NotFound(format!("role '{}'", current)))?;
            permissions.extend(role.permissions.iter().cloned());
            cursor = role.inherits_from;
        }

        Ok(permissions.into_iter().collect())
    }

    /// The parent must exist, and linking to it must keep the membership
    /// graph acyclic (depth-first walk from the parent).
    fn check_inheritance(&self, slug: &str, child: &str, parent: &str) -> Result<()> {
        if parent == child {
            return Err(ControlError::InvalidInput(format!(
                "role '{}' cannot inherit from itself",
                child
            )));
        }
        if self.store().get_role(slug, parent)?.is_none() {
            return Err(ControlError::InvalidInput(format!(
                "parent role '{}' does not exist",
                parent
            )));
        }

        let mut visited = HashSet::new();
        let mut cursor = Some(parent.to_string());
        while let Some(current) = cursor {
            if current == child {
                return Err(ControlError::InvalidInput(format!(
                    "role inheritance cycle through '{}'",
                    child
                )));
            }
            if !visited.insert(current.clone()) {
                break;
            }
            cursor = self
                .store()
                .get_role(slug, &current)?
                .and_then(|role| role.inherits_from);
        }
        Ok(())
    }
}
