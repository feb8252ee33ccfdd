//! PostgreSQL store over the `promptline-db` repositories.
//!
//! Multi-row writes run in one transaction that first locks the family's
//! rows with `SELECT ... FOR UPDATE`, so concurrent writers on the same name
//! serialize. The partial unique index on active rows is the backstop for
//! families that have no rows to lock yet.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use promptline_core::error::CoreError;
use promptline_core::parameter::ParameterDef;
use promptline_core::types::DbId;
use promptline_core::version_log::{
    activated_metadata, deactivated_metadata, VersionAction, VersionRef,
};
use promptline_db::models::component::{Component, CreateComponent};
use promptline_db::models::parameter::TemplateParameter;
use promptline_db::models::template::{CreateTemplateVersion, Template};
use promptline_db::models::version_log::{CreateVersionLogEntry, VersionLogEntry};
use promptline_db::repositories::{
    ComponentRepo, ParameterRepo, TemplateRepo, TemplateUsageRepo, VersionLogRepo,
};
use promptline_db::DbPool;

use super::{check_component_cycle, check_sequence, prepare_component, ComponentStore, TemplateStore};
use crate::error::{classify_sqlx_error, unique_violation, EngineError, EngineResult};

const TEMPLATE_VERSION_CONSTRAINT: &str = "uq_templates_name_version";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_parameters(&self, template: Template) -> EngineResult<Template> {
        let rows = ParameterRepo::list_for_template(&self.pool, template.id).await?;
        Ok(template.with_parameters(to_defs(&rows)?))
    }
}

fn to_defs(rows: &[TemplateParameter]) -> Result<Vec<ParameterDef>, CoreError> {
    rows.iter().map(TemplateParameter::to_def).collect()
}

/// Map a failed version insert onto the sequence errors the contract names.
fn map_insert_error(err: sqlx::Error, new: &CreateTemplateVersion) -> EngineError {
    if unique_violation(&err) == Some(TEMPLATE_VERSION_CONSTRAINT) {
        let core = if new.version == 1 {
            CoreError::DuplicateName(new.name.clone())
        } else {
            CoreError::InvalidVersionSequence {
                name: new.name.clone(),
                expected: new.version,
                actual: new.version + 1,
            }
        };
        return core.into();
    }
    classify_sqlx_error(err, "Template", &new.name)
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn get_template(&self, id: DbId) -> EngineResult<Template> {
        let template = TemplateRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Template", id))?;
        self.with_parameters(template).await
    }

    async fn get_version(&self, name: &str, version: i32) -> EngineResult<Template> {
        let template = TemplateRepo::find_by_name_and_version(&self.pool, name, version)
            .await?
            .ok_or_else(|| CoreError::not_found("Template", format!("{name}@{version}")))?;
        self.with_parameters(template).await
    }

    async fn get_active(&self, name: &str) -> EngineResult<Template> {
        let template = TemplateRepo::find_active(&self.pool, name)
            .await?
            .ok_or_else(|| CoreError::not_found("Active template", name))?;
        self.with_parameters(template).await
    }

    async fn list_versions(&self, name: &str) -> EngineResult<Vec<Template>> {
        let versions = TemplateRepo::list_by_name(&self.pool, name).await?;
        if versions.is_empty() {
            return Ok(versions);
        }

        let ids: Vec<DbId> = versions.iter().map(|t| t.id).collect();
        let mut grouped: HashMap<DbId, Vec<TemplateParameter>> = HashMap::new();
        for row in ParameterRepo::list_for_templates(&self.pool, &ids).await? {
            grouped.entry(row.template_id).or_default().push(row);
        }

        versions
            .into_iter()
            .map(|t| -> EngineResult<Template> {
                let rows = grouped.remove(&t.id).unwrap_or_default();
                Ok(t.with_parameters(to_defs(&rows)?))
            })
            .collect()
    }

    async fn max_version(&self, name: &str) -> EngineResult<i32> {
        Ok(TemplateRepo::max_version(&self.pool, name).await?)
    }

    async fn list_parameters(&self, template_id: DbId) -> EngineResult<Vec<ParameterDef>> {
        if TemplateRepo::find_by_id(&self.pool, template_id).await?.is_none() {
            return Err(CoreError::not_found("Template", template_id).into());
        }
        let rows = ParameterRepo::list_for_template(&self.pool, template_id).await?;
        Ok(to_defs(&rows)?)
    }

    async fn list_log(&self, name: &str) -> EngineResult<Vec<VersionLogEntry>> {
        Ok(VersionLogRepo::list_for_name(&self.pool, name).await?)
    }

    async fn insert_version(
        &self,
        new: &CreateTemplateVersion,
        log_entry: &CreateVersionLogEntry,
    ) -> EngineResult<Template> {
        let mut tx = self.pool.begin().await?;

        let family = TemplateRepo::lock_family(&mut *tx, &new.name).await?;
        let current_max = family.iter().map(|t| t.version).max().unwrap_or(0);
        check_sequence(&new.name, current_max, new.version)?;
        if new.is_active {
            if let Some(active) = family.iter().find(|t| t.is_active) {
                return Err(CoreError::ConcurrencyConflict(format!(
                    "Template '{}' already has active version {}",
                    new.name, active.version
                ))
                .into());
            }
        }

        let row = TemplateRepo::insert(&mut *tx, new)
            .await
            .map_err(|e| map_insert_error(e, new))?;
        ParameterRepo::insert_all(&mut *tx, row.id, &new.fields.parameters).await?;
        VersionLogRepo::insert(&mut *tx, log_entry).await?;

        tx.commit()
            .await
            .map_err(|e| map_insert_error(e, new))?;

        tracing::debug!(
            template_id = row.id,
            name = %row.name,
            version = row.version,
            "Inserted template version"
        );
        Ok(row.with_parameters(new.fields.parameters.clone()))
    }

    async fn swap_active(
        &self,
        target_id: DbId,
        author: &str,
        notes: Option<&str>,
    ) -> EngineResult<Template> {
        let mut tx = self.pool.begin().await?;

        let name = TemplateRepo::find_by_id(&mut *tx, target_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Template", target_id))?
            .name;
        let family = TemplateRepo::lock_family(&mut *tx, &name).await?;
        // Re-read under the lock: the family may have been deleted meanwhile.
        let target = family
            .iter()
            .find(|t| t.id == target_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Template", target_id))?;
        if target.is_active {
            tx.commit().await?;
            return self.with_parameters(target).await;
        }

        let previous = family
            .iter()
            .find(|t| t.is_active && t.id != target_id)
            .map(|t| VersionRef {
                id: t.id,
                version: t.version,
            });
        let target_ref = VersionRef {
            id: target.id,
            version: target.version,
        };
        let notes = notes.map(str::to_string);

        if let Some(old) = previous {
            TemplateRepo::set_active(&mut *tx, old.id, false).await?;
            let entry = CreateVersionLogEntry::new(&name, old.version, VersionAction::Deactivated, author)
                .with_notes(notes.clone())
                .with_metadata(deactivated_metadata(target_ref));
            VersionLogRepo::insert(&mut *tx, &entry).await?;
        }

        let activated = TemplateRepo::set_active(&mut *tx, target_id, true)
            .await
            .map_err(|e| classify_sqlx_error(e, "Template", &name))?
            .ok_or_else(|| CoreError::not_found("Template", target_id))?;
        let entry = CreateVersionLogEntry::new(&name, target.version, VersionAction::Activated, author)
            .with_notes(notes)
            .with_metadata(activated_metadata(previous));
        VersionLogRepo::insert(&mut *tx, &entry).await?;

        tx.commit()
            .await
            .map_err(|e| classify_sqlx_error(e, "Template", &name))?;

        self.with_parameters(activated).await
    }

    async fn delete_family(&self, name: &str) -> EngineResult<u64> {
        let mut tx = self.pool.begin().await?;

        let family = TemplateRepo::lock_family(&mut *tx, name).await?;
        if family.is_empty() {
            return Err(CoreError::not_found("Template", name).into());
        }
        VersionLogRepo::delete_for_name(&mut *tx, name).await?;
        // Parameters and usage rows cascade from the version rows.
        let deleted = TemplateRepo::delete_by_name(&mut *tx, name).await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn record_template_usage(
        &self,
        template_id: DbId,
        unresolved_count: i32,
    ) -> EngineResult<()> {
        if TemplateRepo::find_by_id(&self.pool, template_id).await?.is_none() {
            return Err(CoreError::not_found("Template", template_id).into());
        }
        TemplateUsageRepo::record(&self.pool, template_id, unresolved_count).await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentStore for PgStore {
    async fn get_active_component(&self, name: &str) -> EngineResult<Component> {
        ComponentRepo::find_active(&self.pool, name)
            .await?
            .ok_or_else(|| CoreError::not_found("Component", name).into())
    }

    async fn get_component_version(&self, name: &str, version: i32) -> EngineResult<Component> {
        ComponentRepo::find_by_name_and_version(&self.pool, name, version)
            .await?
            .ok_or_else(|| CoreError::not_found("Component", format!("{name}@{version}")).into())
    }

    async fn list_active_components(&self) -> EngineResult<Vec<Component>> {
        Ok(ComponentRepo::list_active(&self.pool).await?)
    }

    async fn put_component(&self, new: &CreateComponent) -> EngineResult<Component> {
        let new = prepare_component(new)?;
        let mut tx = self.pool.begin().await?;

        let family = ComponentRepo::lock_family(&mut *tx, &new.name).await?;
        let active: BTreeMap<String, String> = ComponentRepo::list_active(&mut *tx)
            .await?
            .into_iter()
            .map(|c| (c.name, c.content))
            .collect();
        check_component_cycle(&new.name, &new.content, &active)?;

        let version = family.iter().map(|c| c.version).max().unwrap_or(0) + 1;
        if let Some(previous) = family.iter().find(|c| c.is_active) {
            ComponentRepo::deactivate(&mut *tx, previous.id).await?;
        }
        let component = ComponentRepo::insert(&mut *tx, &new, version)
            .await
            .map_err(|e| classify_sqlx_error(e, "Component", &new.name))?;

        tx.commit()
            .await
            .map_err(|e| classify_sqlx_error(e, "Component", &new.name))?;
        Ok(component)
    }

    async fn deactivate_component(&self, name: &str) -> EngineResult<Component> {
        let mut tx = self.pool.begin().await?;

        let family = ComponentRepo::lock_family(&mut *tx, name).await?;
        let active = family
            .into_iter()
            .find(|c| c.is_active)
            .ok_or_else(|| CoreError::not_found("Component", name))?;
        if active.usage_count > 0 {
            return Err(CoreError::Conflict(format!(
                "Component '{name}' has been used {} times and cannot be deleted",
                active.usage_count
            ))
            .into());
        }
        ComponentRepo::deactivate(&mut *tx, active.id).await?;
        let component = ComponentRepo::find_by_id(&mut *tx, active.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Component", name))?;

        tx.commit().await?;
        Ok(component)
    }

    async fn increment_component_usage(&self, id: DbId) -> EngineResult<()> {
        if !ComponentRepo::increment_usage(&self.pool, id).await? {
            return Err(CoreError::not_found("Component", id).into());
        }
        Ok(())
    }
}
