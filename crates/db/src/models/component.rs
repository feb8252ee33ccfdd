//! Component models and DTOs.

use promptline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `components` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Component {
    pub id: DbId,
    pub name: String,
    pub version: i32,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub usage_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for writing a component. The store assigns the version number.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComponent {
    pub name: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl CreateComponent {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            category: promptline_core::template::DEFAULT_CATEGORY.to_string(),
            tags: Vec::new(),
        }
    }
}
