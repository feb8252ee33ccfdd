//! Render usage records for templates.

use promptline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `template_usage` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TemplateUsage {
    pub id: DbId,
    pub template_id: DbId,
    pub unresolved_count: i32,
    pub rendered_at: Timestamp,
}
