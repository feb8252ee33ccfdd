//! Template version models and DTOs.

use promptline_core::diff::{VersionSnapshot, VersionSummary};
use promptline_core::parameter::ParameterDef;
use promptline_core::template::TemplateFields;
use promptline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `templates` table.
///
/// `parameters` lives in `template_parameters`; repositories return it
/// empty and the store fills it in with [`Template::with_parameters`].
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: DbId,
    pub name: String,
    pub version: i32,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_by: String,
    pub previous_version_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[sqlx(skip)]
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

impl Template {
    pub fn with_parameters(mut self, parameters: Vec<ParameterDef>) -> Self {
        self.parameters = parameters;
        self
    }

    /// The versioned payload of this row.
    pub fn fields(&self) -> TemplateFields {
        TemplateFields {
            content: self.content.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            parameters: self.parameters.clone(),
        }
    }

    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            id: self.id,
            version: self.version,
            is_active: self.is_active,
            created_by: self.created_by.clone(),
            created_at: self.created_at,
        }
    }

    /// Input for the diff engine.
    pub fn snapshot(&self) -> VersionSnapshot {
        VersionSnapshot {
            summary: self.summary(),
            fields: self.fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for inserting a new template version.
///
/// `fields` is expected to be validated and normalized already.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateVersion {
    pub name: String,
    pub version: i32,
    pub fields: TemplateFields,
    pub is_active: bool,
    pub created_by: String,
    pub previous_version_id: Option<DbId>,
}
