//! In-process store used by tests and embedders without a database.
//!
//! One mutex guards the whole state, so every operation is atomic and the
//! single-active invariant holds without further locking.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use promptline_core::error::CoreError;
use promptline_core::parameter::ParameterDef;
use promptline_core::types::DbId;
use promptline_core::version_log::{
    activated_metadata, deactivated_metadata, VersionAction, VersionRef,
};
use promptline_db::models::component::{Component, CreateComponent};
use promptline_db::models::template::{CreateTemplateVersion, Template};
use promptline_db::models::template_usage::TemplateUsage;
use promptline_db::models::version_log::{CreateVersionLogEntry, VersionLogEntry};
use sqlx::types::Json;
use tokio::sync::Mutex;

use super::{check_component_cycle, check_sequence, prepare_component, ComponentStore, TemplateStore};
use crate::error::EngineResult;

#[derive(Debug, Default)]
struct State {
    last_id: DbId,
    /// Keyed by id; parameters are stored on the row.
    templates: BTreeMap<DbId, Template>,
    log: Vec<VersionLogEntry>,
    components: BTreeMap<DbId, Component>,
    usage: Vec<TemplateUsage>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn family(&self, name: &str) -> impl Iterator<Item = &Template> {
        let name = name.to_string();
        self.templates.values().filter(move |t| t.name == name)
    }

    fn max_version(&self, name: &str) -> i32 {
        self.family(name).map(|t| t.version).max().unwrap_or(0)
    }

    fn append_log(&mut self, entry: &CreateVersionLogEntry) {
        let id = self.next_id();
        self.log.push(VersionLogEntry {
            id,
            template_name: entry.template_name.clone(),
            version: entry.version,
            action: entry.action.as_str().to_string(),
            author: entry.author.clone(),
            notes: entry.notes.clone(),
            metadata: Json(entry.metadata.clone()),
            timestamp: Utc::now(),
        });
    }

    fn active_component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components
            .values_mut()
            .find(|c| c.name == name && c.is_active)
    }
}

/// Row counts for one template family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyCounts {
    pub versions: usize,
    pub parameters: usize,
    pub log_entries: usize,
    pub usage_records: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything still stored for a template name.
    pub async fn family_counts(&self, name: &str) -> FamilyCounts {
        let state = self.state.lock().await;
        let ids: Vec<DbId> = state.family(name).map(|t| t.id).collect();
        FamilyCounts {
            versions: ids.len(),
            parameters: state.family(name).map(|t| t.parameters.len()).sum(),
            log_entries: state.log.iter().filter(|e| e.template_name == name).count(),
            usage_records: state
                .usage
                .iter()
                .filter(|u| ids.contains(&u.template_id))
                .count(),
        }
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, id: DbId) -> EngineResult<Template> {
        let state = self.state.lock().await;
        state
            .templates
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Template", id).into())
    }

    async fn get_version(&self, name: &str, version: i32) -> EngineResult<Template> {
        let state = self.state.lock().await;
        let found = state.family(name).find(|t| t.version == version).cloned();
        found.ok_or_else(|| CoreError::not_found("Template", format!("{name}@{version}")).into())
    }

    async fn get_active(&self, name: &str) -> EngineResult<Template> {
        let state = self.state.lock().await;
        let found = state.family(name).find(|t| t.is_active).cloned();
        found.ok_or_else(|| CoreError::not_found("Active template", name).into())
    }

    async fn list_versions(&self, name: &str) -> EngineResult<Vec<Template>> {
        let state = self.state.lock().await;
        let mut versions: Vec<Template> = state.family(name).cloned().collect();
        versions.sort_by_key(|t| t.version);
        Ok(versions)
    }

    async fn max_version(&self, name: &str) -> EngineResult<i32> {
        Ok(self.state.lock().await.max_version(name))
    }

    async fn list_parameters(&self, template_id: DbId) -> EngineResult<Vec<ParameterDef>> {
        let state = self.state.lock().await;
        state
            .templates
            .get(&template_id)
            .map(|t| t.parameters.clone())
            .ok_or_else(|| CoreError::not_found("Template", template_id).into())
    }

    async fn list_log(&self, name: &str) -> EngineResult<Vec<VersionLogEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<VersionLogEntry> = state
            .log
            .iter()
            .filter(|e| e.template_name == name)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    async fn insert_version(
        &self,
        new: &CreateTemplateVersion,
        log_entry: &CreateVersionLogEntry,
    ) -> EngineResult<Template> {
        let mut state = self.state.lock().await;
        check_sequence(&new.name, state.max_version(&new.name), new.version)?;

        if new.is_active {
            if let Some(active) = state.family(&new.name).find(|t| t.is_active) {
                return Err(CoreError::ConcurrencyConflict(format!(
                    "Template '{}' already has active version {}",
                    new.name, active.version
                ))
                .into());
            }
        }

        let now = Utc::now();
        let template = Template {
            id: state.next_id(),
            name: new.name.clone(),
            version: new.version,
            content: new.fields.content.clone(),
            category: new.fields.category.clone(),
            tags: new.fields.tags.clone(),
            is_active: new.is_active,
            created_by: new.created_by.clone(),
            previous_version_id: new.previous_version_id,
            created_at: now,
            updated_at: now,
            parameters: new.fields.parameters.clone(),
        };
        state.templates.insert(template.id, template.clone());
        state.append_log(log_entry);
        Ok(template)
    }

    async fn swap_active(
        &self,
        target_id: DbId,
        author: &str,
        notes: Option<&str>,
    ) -> EngineResult<Template> {
        let mut state = self.state.lock().await;
        let target = state
            .templates
            .get(&target_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Template", target_id))?;
        if target.is_active {
            return Ok(target);
        }

        let previous = state
            .family(&target.name)
            .find(|t| t.is_active && t.id != target_id)
            .map(|t| VersionRef {
                id: t.id,
                version: t.version,
            });
        let target_ref = VersionRef {
            id: target.id,
            version: target.version,
        };
        let now = Utc::now();
        let notes = notes.map(str::to_string);

        if let Some(old) = previous {
            if let Some(row) = state.templates.get_mut(&old.id) {
                row.is_active = false;
                row.updated_at = now;
            }
            let entry =
                CreateVersionLogEntry::new(&target.name, old.version, VersionAction::Deactivated, author)
                    .with_notes(notes.clone())
                    .with_metadata(deactivated_metadata(target_ref));
            state.append_log(&entry);
        }

        let activated = match state.templates.get_mut(&target_id) {
            Some(row) => {
                row.is_active = true;
                row.updated_at = now;
                row.clone()
            }
            None => return Err(CoreError::not_found("Template", target_id).into()),
        };
        let entry =
            CreateVersionLogEntry::new(&target.name, target.version, VersionAction::Activated, author)
                .with_notes(notes)
                .with_metadata(activated_metadata(previous));
        state.append_log(&entry);

        Ok(activated)
    }

    async fn delete_family(&self, name: &str) -> EngineResult<u64> {
        let mut state = self.state.lock().await;
        let ids: Vec<DbId> = state.family(name).map(|t| t.id).collect();
        if ids.is_empty() {
            return Err(CoreError::not_found("Template", name).into());
        }
        state.templates.retain(|id, _| !ids.contains(id));
        state.usage.retain(|u| !ids.contains(&u.template_id));
        state.log.retain(|e| e.template_name != name);
        Ok(ids.len() as u64)
    }

    async fn record_template_usage(
        &self,
        template_id: DbId,
        unresolved_count: i32,
    ) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        if !state.templates.contains_key(&template_id) {
            return Err(CoreError::not_found("Template", template_id).into());
        }
        let id = state.next_id();
        state.usage.push(TemplateUsage {
            id,
            template_id,
            unresolved_count,
            rendered_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn get_active_component(&self, name: &str) -> EngineResult<Component> {
        let state = self.state.lock().await;
        state
            .components
            .values()
            .find(|c| c.name == name && c.is_active)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Component", name).into())
    }

    async fn get_component_version(&self, name: &str, version: i32) -> EngineResult<Component> {
        let state = self.state.lock().await;
        state
            .components
            .values()
            .find(|c| c.name == name && c.version == version)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Component", format!("{name}@{version}")).into())
    }

    async fn list_active_components(&self) -> EngineResult<Vec<Component>> {
        let state = self.state.lock().await;
        let mut active: Vec<Component> = state
            .components
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn put_component(&self, new: &CreateComponent) -> EngineResult<Component> {
        let new = prepare_component(new)?;
        let mut state = self.state.lock().await;

        let active: BTreeMap<String, String> = state
            .components
            .values()
            .filter(|c| c.is_active)
            .map(|c| (c.name.clone(), c.content.clone()))
            .collect();
        check_component_cycle(&new.name, &new.content, &active)?;

        let version = state
            .components
            .values()
            .filter(|c| c.name == new.name)
            .map(|c| c.version)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        if let Some(previous) = state.active_component_mut(&new.name) {
            previous.is_active = false;
            previous.updated_at = now;
        }

        let component = Component {
            id: state.next_id(),
            name: new.name,
            version,
            content: new.content,
            category: new.category,
            tags: new.tags,
            is_active: true,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.components.insert(component.id, component.clone());
        Ok(component)
    }

    async fn deactivate_component(&self, name: &str) -> EngineResult<Component> {
        let mut state = self.state.lock().await;
        let component = state
            .active_component_mut(name)
            .ok_or_else(|| CoreError::not_found("Component", name))?;
        if component.usage_count > 0 {
            return Err(CoreError::Conflict(format!(
                "Component '{name}' has been used {} times and cannot be deleted",
                component.usage_count
            ))
            .into());
        }
        component.is_active = false;
        component.updated_at = Utc::now();
        Ok(component.clone())
    }

    async fn increment_component_usage(&self, id: DbId) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        let component = state
            .components
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Component", id))?;
        component.usage_count += 1;
        Ok(())
    }
}
