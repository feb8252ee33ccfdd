//! Version log rows.

use promptline_core::error::CoreError;
use promptline_core::types::{DbId, Timestamp};
use promptline_core::value::Metadata;
use promptline_core::version_log::VersionAction;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `template_version_log` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct VersionLogEntry {
    pub id: DbId,
    pub template_name: String,
    pub version: i32,
    pub action: String,
    pub author: String,
    pub notes: Option<String>,
    pub metadata: Json<Metadata>,
    pub timestamp: Timestamp,
}

impl VersionLogEntry {
    pub fn action(&self) -> Result<VersionAction, CoreError> {
        VersionAction::from_str_value(&self.action)
    }
}

/// Input for appending a log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVersionLogEntry {
    pub template_name: String,
    pub version: i32,
    pub action: VersionAction,
    pub author: String,
    pub notes: Option<String>,
    pub metadata: Metadata,
}

impl CreateVersionLogEntry {
    pub fn new(
        template_name: impl Into<String>,
        version: i32,
        action: VersionAction,
        author: impl Into<String>,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            version,
            action,
            author: author.into(),
            notes: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
