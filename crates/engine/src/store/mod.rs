//! The Template/Component store contract and its implementations.
//!
//! Every method returns `NotFound` when the addressed entity is absent,
//! except `list_versions`, which returns an empty list for an unknown name.
//! Writes are atomic: either every row of the operation is visible
//! afterwards or none is.

mod cached;
mod memory;
mod pg;

use std::collections::BTreeMap;

use async_trait::async_trait;
use promptline_core::error::CoreError;
use promptline_core::parameter::ParameterDef;
use promptline_core::render::TemplateRenderer;
use promptline_core::template::{self, DEFAULT_CATEGORY};
use promptline_core::types::DbId;
use promptline_db::models::component::{Component, CreateComponent};
use promptline_db::models::template::{CreateTemplateVersion, Template};
use promptline_db::models::version_log::{CreateVersionLogEntry, VersionLogEntry};

use crate::error::EngineResult;

pub use cached::CachedStore;
pub use memory::{FamilyCounts, MemoryStore};
pub use pg::PgStore;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// A version by id, parameters included.
    async fn get_template(&self, id: DbId) -> EngineResult<Template>;

    async fn get_version(&self, name: &str, version: i32) -> EngineResult<Template>;

    /// The active version of a name.
    async fn get_active(&self, name: &str) -> EngineResult<Template>;

    /// Every version of a name, oldest first.
    async fn list_versions(&self, name: &str) -> EngineResult<Vec<Template>>;

    /// Highest version number of a name, `0` for an unknown name.
    async fn max_version(&self, name: &str) -> EngineResult<i32>;

    async fn list_parameters(&self, template_id: DbId) -> EngineResult<Vec<ParameterDef>>;

    /// Log entries of a name, newest first.
    async fn list_log(&self, name: &str) -> EngineResult<Vec<VersionLogEntry>>;

    /// Insert `new` with its parameters and `log_entry` in one write.
    ///
    /// `new.version` is the expected next version: the write re-checks that
    /// it equals the current maximum plus one and fails with
    /// `InvalidVersionSequence` otherwise (`DuplicateName` when version 1 was
    /// expected but the family exists).
    async fn insert_version(
        &self,
        new: &CreateTemplateVersion,
        log_entry: &CreateVersionLogEntry,
    ) -> EngineResult<Template>;

    /// Make `target_id` the single active version of its family.
    ///
    /// Deactivates the current active version, activates the target, and
    /// writes both log entries in one write. Returns the target unchanged if
    /// it is already active. A lost race surfaces as `ConcurrencyConflict`.
    async fn swap_active(
        &self,
        target_id: DbId,
        author: &str,
        notes: Option<&str>,
    ) -> EngineResult<Template>;

    /// Remove every version, parameter, usage record, and log entry of a name.
    /// Returns the number of versions removed.
    async fn delete_family(&self, name: &str) -> EngineResult<u64>;

    async fn record_template_usage(&self, template_id: DbId, unresolved_count: i32)
        -> EngineResult<()>;
}

#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn get_active_component(&self, name: &str) -> EngineResult<Component>;

    async fn get_component_version(&self, name: &str, version: i32) -> EngineResult<Component>;

    async fn list_active_components(&self) -> EngineResult<Vec<Component>>;

    /// Write the next version of a component and make it the active one.
    /// Fails with `ComponentCycle` if the content would close an include loop.
    async fn put_component(&self, new: &CreateComponent) -> EngineResult<Component>;

    /// Soft-delete the active entry of a name. Refused with `Conflict` while
    /// its usage count is non-zero.
    async fn deactivate_component(&self, name: &str) -> EngineResult<Component>;

    async fn increment_component_usage(&self, id: DbId) -> EngineResult<()>;
}

/// Both halves of the store contract.
pub trait Store: TemplateStore + ComponentStore {}

impl<T: TemplateStore + ComponentStore + ?Sized> Store for T {}

// ---------------------------------------------------------------------------
// Shared write checks
// ---------------------------------------------------------------------------

/// Compare the expected next version against the family's current maximum.
pub(crate) fn check_sequence(name: &str, current_max: i32, expected: i32) -> Result<(), CoreError> {
    if current_max + 1 == expected {
        return Ok(());
    }
    if expected == 1 {
        return Err(CoreError::DuplicateName(name.to_string()));
    }
    Err(CoreError::InvalidVersionSequence {
        name: name.to_string(),
        expected,
        actual: current_max + 1,
    })
}

/// Validate and normalize a component write.
pub(crate) fn prepare_component(new: &CreateComponent) -> Result<CreateComponent, CoreError> {
    template::validate_name(&new.name)?;
    template::validate_content(&new.content)?;
    let category = if new.category.trim().is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        new.category.trim().to_string()
    };
    template::validate_category(&category)?;
    template::validate_tags(&new.tags)?;

    Ok(CreateComponent {
        name: new.name.clone(),
        content: new.content.clone(),
        category,
        tags: template::normalize_tags(&new.tags),
    })
}

/// Reject `content` for component `name` if it would close an include cycle
/// among the active components.
pub(crate) fn check_component_cycle(
    name: &str,
    content: &str,
    active: &BTreeMap<String, String>,
) -> Result<(), CoreError> {
    // Depth is irrelevant for cycle detection; any finite chain terminates.
    let renderer = TemplateRenderer::new(active.len() + 2);
    match renderer.find_include_cycle(name, content, active) {
        Some(path) => Err(CoreError::ComponentCycle { path }),
        None => Ok(()),
    }
}
