//! Repository for the `template_usage` table.

use promptline_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::template_usage::TemplateUsage;

const COLUMNS: &str = "id, template_id, unresolved_count, rendered_at";

pub struct TemplateUsageRepo;

impl TemplateUsageRepo {
    pub async fn record<'e, E: PgExecutor<'e>>(
        executor: E,
        template_id: DbId,
        unresolved_count: i32,
    ) -> Result<TemplateUsage, sqlx::Error> {
        let query = format!(
            "INSERT INTO template_usage (template_id, unresolved_count) \
             VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TemplateUsage>(&query)
            .bind(template_id)
            .bind(unresolved_count)
            .fetch_one(executor)
            .await
    }

    /// Count usage rows across every version of a name.
    pub async fn count_for_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM template_usage u \
             JOIN templates t ON t.id = u.template_id \
             WHERE t.name = $1",
        )
        .bind(name)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }
}
