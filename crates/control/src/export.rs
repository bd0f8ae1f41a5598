use crate::error::{ControlError, Result};
use crate::service::ControlPlane;
use hivejar_models::mutation::DeleteByKey;
use hivejar_models::{
    validate_role_name, validate_slug, ExportOptions, ExportedUser, ImportMode, ImportReport,
    MutationType, TenantExport,
};
use hivejar_tenantdb::repositories::NewUser;
use tokio_util::sync::CancellationToken;

impl ControlPlane {
    /// Export one tenant's configuration. System scopes and system roles
    /// stay behind; roles and users are opt-in, and users leave without
    /// their password hashes.
    pub async fn export_tenant(
        &self,
        slug_or_id: &str,
        options: ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<TenantExport> {
        let tenant = self.get_tenant(slug_or_id)?;

        let clients = self.store().list_clients(&tenant.slug)?;
        let scopes = self
            .store()
            .list_scopes(&tenant.slug)?
            .into_iter()
            .filter(|s| !s.system)
            .collect();
        let claims = self.store().list_claims(&tenant.slug)?;
        let roles = if options.include_roles {
            self.store()
                .list_roles(&tenant.slug)?
                .into_iter()
                .filter(|r| !r.system)
                .collect()
        } else {
            Vec::new()
        };

        let users = if options.include_users {
            self.export_users(&tenant.slug, cancel).await?
        } else {
            Vec::new()
        };

        Ok(TenantExport {
            tenant,
            clients,
            scopes,
            claims,
            roles,
            users,
        })
    }

    async fn export_users(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExportedUser>> {
        let access = self.tenant_db().access(slug, cancel).await;
        access.require_db().map_err(ControlError::from)?;
        let repo = access
            .users()
            .ok_or_else(|| ControlError::NotSupported("user export".to_string()))?;

        let mut users = Vec::new();
        let mut offset = 0i64;
        const PAGE: i64 = 500;
        loop {
            let page = repo.list(PAGE, offset).await.map_err(ControlError::from)?;
            let fetched = page.len();
            for user in page {
                users.push(ExportedUser {
                    id: user.id,
                    email: user.email,
                    email_verified: user.email_verified,
                    is_active: user.is_active,
                    metadata: user.metadata,
                    created_at: user.created_at,
                });
            }
            if fetched < PAGE as usize {
                break;
            }
            offset += PAGE;
        }
        Ok(users)
    }

    /// Dry-run an import: validate without emitting mutations.
    pub fn validate_import(&self, slug_or_id: &str, export: &TenantExport) -> Result<ImportReport> {
        let tenant = self.get_tenant(slug_or_id)?;
        let mut report = ImportReport::default();

        validate_slug(&export.tenant.slug).map_err(ControlError::InvalidInput)?;
        if export.tenant.slug != tenant.slug {
            report.warnings.push(format!(
                "payload was exported from tenant '{}'; entities import into '{}'",
                export.tenant.slug, tenant.slug
            ));
        }

        for client in &export.clients {
            // Client ids key store file names; imports must not smuggle
            // path separators in.
            if client.client_id.is_empty()
                || !client
                    .client_id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
            {
                return Err(ControlError::InvalidInput(format!(
                    "invalid clientId '{}'",
                    client.client_id
                )));
            }
            if client.client_type == hivejar_models::ClientType::Confidential
                && client.secret_enc.is_none()
            {
                report.warnings.push(format!(
                    "confidential client '{}' has no secret; one must be rotated after import",
                    client.client_id
                ));
            }
            report.clients += 1;
        }

        for scope in &export.scopes {
            if scope.system {
                report
                    .warnings
                    .push(format!("system scope '{}' is skipped on import", scope.name));
                continue;
            }
            crate::scopes::validate_scope_name(&scope.name)?;
            report.scopes += 1;
        }

        for claim in &export.claims {
            if claim.name.is_empty() {
                return Err(ControlError::InvalidInput("claim with empty name".to_string()));
            }
            report.claims += 1;
        }

        for role in &export.roles {
            if role.system {
                report
                    .warnings
                    .push(format!("system role '{}' is skipped on import", role.name));
                continue;
            }
            validate_role_name(&role.name).map_err(ControlError::InvalidInput)?;
            report.roles += 1;
        }

        Ok(report)
    }

    /// Apply an import. `Merge` upserts payload entities and keeps the
    /// rest; `Replace` also removes non-system entities absent from the
    /// payload.
    pub async fn import_tenant(
        &self,
        slug_or_id: &str,
        export: &TenantExport,
        mode: ImportMode,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        let mut report = self.validate_import(slug_or_id, export)?;

        let _serial = self.write_lock().await;
        self.check_writable()?;
        let tenant = self.get_tenant(slug_or_id)?;
        let slug = tenant.slug.clone();

        if mode == ImportMode::Replace {
            for client in self.store().list_clients(&slug)? {
                if !export.clients.iter().any(|c| c.client_id == client.client_id) {
                    self.submit(
                        MutationType::DeleteClient,
                        &slug,
                        &DeleteByKey {
                            key: client.client_id,
                        },
                    )
                    .await?;
                }
            }
            for scope in self.store().list_scopes(&slug)? {
                if !scope.system && !export.scopes.iter().any(|s| s.name == scope.name) {
                    self.submit(
                        MutationType::DeleteScope,
                        &slug,
                        &DeleteByKey { key: scope.name },
                    )
                    .await?;
                }
            }
            for claim in self.store().list_claims(&slug)? {
                if !export.claims.iter().any(|c| c.name == claim.name) {
                    self.submit(
                        MutationType::DeleteClaim,
                        &slug,
                        &DeleteByKey {
                            key: claim.id.to_string(),
                        },
                    )
                    .await?;
                }
            }
            for role in self.store().list_roles(&slug)? {
                if !role.system && !export.roles.iter().any(|r| r.name == role.name) {
                    self.submit(
                        MutationType::DeleteRole,
                        &slug,
                        &DeleteByKey { key: role.name },
                    )
                    .await?;
                }
            }
        }

        for client in &export.clients {
            self.submit(MutationType::UpsertClient, &slug, client).await?;
        }
        for scope in export.scopes.iter().filter(|s| !s.system) {
            self.submit(MutationType::UpsertScope, &slug, scope).await?;
        }
        for claim in &export.claims {
            self.submit(MutationType::UpsertClaim, &slug, claim).await?;
        }
        for role in export.roles.iter().filter(|r| !r.system) {
            self.submit(MutationType::UpsertRole, &slug, role).await?;
        }

        // User import hits the data plane; release the write serial first.
        drop(_serial);

        if !export.users.is_empty() {
            match self.import_users(&slug, &export.users, cancel).await {
                Ok(count) => report.users = count,
                // User import is data-plane work; a missing database must
                // not fail the configuration import.
                Err(e) => report
                    .warnings
                    .push(format!("users not imported: {}", e)),
            }
        }

        tracing::info!(
            "Import applied: tenant={} mode={:?} clients={} scopes={} claims={} roles={} users={}",
            slug,
            mode,
            report.clients,
            report.scopes,
            report.claims,
            report.roles,
            report.users
        );
        Ok(report)
    }

    async fn import_users(
        &self,
        slug: &str,
        users: &[ExportedUser],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let access = self.tenant_db().access(slug, cancel).await;
        access.require_db().map_err(ControlError::from)?;
        let repo = access
            .users()
            .ok_or_else(|| ControlError::NotSupported("user import".to_string()))?;

        let mut imported = 0;
        for user in users {
            if repo
                .find_by_email(&user.email)
                .await
                .map_err(ControlError::from)?
                .is_some()
            {
                continue;
            }
            repo.create(&NewUser {
                email: user.email.clone(),
                // Imported accounts have no credential; a reset flow
                // issues one.
                password_hash: None,
                email_verified: user.email_verified,
                metadata: user.metadata.clone(),
            })
            .await
            .map_err(ControlError::from)?;
            imported += 1;
        }
        Ok(imported)
    }
}
