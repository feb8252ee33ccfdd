//! Template lifecycle: creation, new versions, activation, rollback, and
//! family deletion.
//!
//! Inputs are validated before any store call. Every write goes through a
//! single atomic store operation; cache invalidation is handled by the store
//! decorator.

use std::sync::Arc;
use std::time::Duration;

use promptline_core::error::CoreError;
use promptline_core::template::{validate_name, validate_notes, TemplateFields};
use promptline_core::types::DbId;
use promptline_core::version_log::{
    created_metadata, deleted_metadata, rollback_metadata, VersionAction,
};
use promptline_db::models::template::{CreateTemplateVersion, Template};
use promptline_db::models::version_log::{CreateVersionLogEntry, VersionLogEntry};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{with_timeout, EngineResult};
use crate::store::Store;

/// Input for creating a brand-new template family.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateInput {
    pub name: String,
    pub fields: TemplateFields,
    pub author: String,
}

/// Input for appending a version to an existing family.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVersionInput {
    pub template_name: String,
    pub fields: TemplateFields,
    pub author: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// When set, the write fails unless this is exactly the next version.
    #[serde(default)]
    pub expected_version: Option<i32>,
}

/// Result of deleting a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedFamily {
    pub name: String,
    pub deleted_versions: u64,
}

#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn Store>,
    timeout: Duration,
    activation_max_retries: u32,
}

fn validate_author(author: &str) -> Result<(), CoreError> {
    if author.trim().is_empty() {
        return Err(CoreError::validation("author", "Author must not be empty"));
    }
    Ok(())
}

fn validate_optional_notes(notes: Option<&str>) -> Result<(), CoreError> {
    notes.map_or(Ok(()), validate_notes)
}

impl VersionManager {
    pub fn new(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout,
            activation_max_retries: config.activation_max_retries,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_template(&self, id: DbId) -> EngineResult<Template> {
        with_timeout("get_template", self.timeout, self.store.get_template(id)).await
    }

    pub async fn get_active(&self, name: &str) -> EngineResult<Template> {
        with_timeout("get_active", self.timeout, self.store.get_active(name)).await
    }

    pub async fn list_versions(&self, name: &str) -> EngineResult<Vec<Template>> {
        with_timeout("list_versions", self.timeout, self.store.list_versions(name)).await
    }

    /// Version log of a name, newest first.
    pub async fn history(&self, name: &str) -> EngineResult<Vec<VersionLogEntry>> {
        with_timeout("list_log", self.timeout, self.store.list_log(name)).await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create version 1 of a new template, active immediately.
    pub async fn create_template(&self, input: CreateTemplateInput) -> EngineResult<Template> {
        validate_name(&input.name)?;
        validate_author(&input.author)?;
        let fields = input.fields.validated()?;

        let max = with_timeout("max_version", self.timeout, self.store.max_version(&input.name))
            .await?;
        if max > 0 {
            return Err(CoreError::DuplicateName(input.name).into());
        }

        let new = CreateTemplateVersion {
            name: input.name.clone(),
            version: 1,
            fields,
            is_active: true,
            created_by: input.author.clone(),
            previous_version_id: None,
        };
        let log_entry =
            CreateVersionLogEntry::new(&input.name, 1, VersionAction::Created, &input.author)
                .with_metadata(created_metadata(None));

        let template = with_timeout(
            "insert_version",
            self.timeout,
            self.store.insert_version(&new, &log_entry),
        )
        .await?;

        tracing::info!(
            template_id = template.id,
            name = %template.name,
            version = template.version,
            author = %input.author,
            "Template created"
        );
        Ok(template)
    }

    /// Append the next version to an existing family. The new version is
    /// inactive.
    pub async fn create_version(&self, input: CreateVersionInput) -> EngineResult<Template> {
        validate_name(&input.template_name)?;
        validate_author(&input.author)?;
        validate_optional_notes(input.notes.as_deref())?;
        let fields = input.fields.validated()?;
        let name = input.template_name;

        let max = with_timeout("max_version", self.timeout, self.store.max_version(&name)).await?;
        if max == 0 {
            return Err(CoreError::not_found("Template", &name).into());
        }
        let next = max + 1;
        if let Some(expected) = input.expected_version {
            if expected != next {
                return Err(CoreError::InvalidVersionSequence {
                    name,
                    expected,
                    actual: next,
                }
                .into());
            }
        }

        let latest = with_timeout("get_version", self.timeout, self.store.get_version(&name, max))
            .await?;
        let new = CreateTemplateVersion {
            name: name.clone(),
            version: next,
            fields,
            is_active: false,
            created_by: input.author.clone(),
            previous_version_id: Some(latest.id),
        };
        let log_entry = CreateVersionLogEntry::new(&name, next, VersionAction::Created, &input.author)
            .with_notes(input.notes)
            .with_metadata(created_metadata(Some(max)));

        let template = with_timeout(
            "insert_version",
            self.timeout,
            self.store.insert_version(&new, &log_entry),
        )
        .await?;

        tracing::info!(
            template_id = template.id,
            name = %template.name,
            version = template.version,
            author = %input.author,
            "Template version created"
        );
        Ok(template)
    }

    /// [`create_version`](Self::create_version) addressed by any version id of
    /// the family.
    pub async fn new_version(
        &self,
        template_id: DbId,
        fields: TemplateFields,
        author: &str,
        notes: Option<String>,
    ) -> EngineResult<Template> {
        let existing = self.get_template(template_id).await?;
        self.create_version(CreateVersionInput {
            template_name: existing.name,
            fields,
            author: author.to_string(),
            notes,
            expected_version: None,
        })
        .await
    }

    /// Make `version_id` the active version of its family.
    ///
    /// A no-op when the version is already active. Conflicts with concurrent
    /// activations are retried, since activation is idempotent.
    pub async fn activate_version(
        &self,
        version_id: DbId,
        author: &str,
        notes: Option<&str>,
    ) -> EngineResult<Template> {
        validate_author(author)?;
        validate_optional_notes(notes)?;

        let mut attempt = 0;
        loop {
            let result = with_timeout(
                "swap_active",
                self.timeout,
                self.store.swap_active(version_id, author, notes),
            )
            .await;
            match result {
                Ok(template) => {
                    tracing::info!(
                        template_id = template.id,
                        name = %template.name,
                        version = template.version,
                        author,
                        "Template version activated"
                    );
                    return Ok(template);
                }
                Err(err) if err.is_retryable() && attempt < self.activation_max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        template_id = version_id,
                        attempt,
                        error = %err,
                        "Activation conflicted, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Create a new inactive version copying `target_version` of the same
    /// family. `template_id` is the version being rolled back from.
    pub async fn rollback(
        &self,
        template_id: DbId,
        target_version: i32,
        author: &str,
    ) -> EngineResult<Template> {
        validate_author(author)?;

        let from = self.get_template(template_id).await?;
        let target = with_timeout(
            "get_version",
            self.timeout,
            self.store.get_version(&from.name, target_version),
        )
        .await?;
        let max =
            with_timeout("max_version", self.timeout, self.store.max_version(&from.name)).await?;
        let next = max + 1;

        let new = CreateTemplateVersion {
            name: from.name.clone(),
            version: next,
            fields: target.fields(),
            is_active: false,
            created_by: author.to_string(),
            previous_version_id: Some(from.id),
        };
        let log_entry = CreateVersionLogEntry::new(&from.name, next, VersionAction::Rollback, author)
            .with_metadata(rollback_metadata(from.version, target_version));

        let template = with_timeout(
            "insert_version",
            self.timeout,
            self.store.insert_version(&new, &log_entry),
        )
        .await?;

        tracing::info!(
            template_id = template.id,
            name = %template.name,
            version = template.version,
            rolled_back_from = from.version,
            rolled_back_to = target_version,
            author,
            "Template rolled back"
        );
        Ok(template)
    }

    /// Delete every version of the family `template_id` belongs to, with
    /// their parameters, usage records, and log entries.
    pub async fn delete_family(&self, template_id: DbId) -> EngineResult<DeletedFamily> {
        let template = self.get_template(template_id).await?;
        let deleted_versions = with_timeout(
            "delete_family",
            self.timeout,
            self.store.delete_family(&template.name),
        )
        .await?;

        // The family's log entries are gone with it; the deletion is recorded
        // here only.
        let metadata = deleted_metadata(deleted_versions);
        tracing::info!(
            template_id,
            name = %template.name,
            action = %VersionAction::Deleted,
            metadata = ?metadata,
            "Template family deleted"
        );

        Ok(DeletedFamily {
            name: template.name,
            deleted_versions,
        })
    }
}
