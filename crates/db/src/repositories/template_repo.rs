//! Repository for the `templates` table.

use promptline_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::template::{CreateTemplateVersion, Template};

/// Column list for templates queries.
const COLUMNS: &str = "id, name, version, content, category, tags, is_active, \
    created_by, previous_version_id, created_at, updated_at";

/// Queries over template versions. Rows come back without parameters.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Find a template version by its primary key.
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE id = $1");
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_name_and_version<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        version: i32,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE name = $1 AND version = $2");
        sqlx::query_as::<_, Template>(&query)
            .bind(name)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Find the active version for a name. Served by the partial unique
    /// index on `(name) WHERE is_active`.
    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE name = $1 AND is_active");
        sqlx::query_as::<_, Template>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// All versions of a name, oldest first.
    pub async fn list_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Vec<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE name = $1 ORDER BY version ASC");
        sqlx::query_as::<_, Template>(&query)
            .bind(name)
            .fetch_all(executor)
            .await
    }

    /// Highest version number for a name, `0` when the family does not exist.
    pub async fn max_version<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<i32, sqlx::Error> {
        let row: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM templates WHERE name = $1")
                .bind(name)
                .fetch_one(executor)
                .await?;
        Ok(row.0)
    }

    /// Lock every version of a family for the rest of the transaction,
    /// returning them oldest first.
    ///
    /// Concurrent writers on the same name serialize here. A family that does
    /// not exist yet locks nothing; the unique `(name, version)` constraint
    /// catches that race instead.
    pub async fn lock_family<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Vec<Template>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM templates WHERE name = $1 ORDER BY version ASC FOR UPDATE"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(name)
            .fetch_all(executor)
            .await
    }

    /// Insert a version row. Parameters are written separately.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateTemplateVersion,
    ) -> Result<Template, sqlx::Error> {
        let query = format!(
            "INSERT INTO templates
                (name, version, content, category, tags, is_active, created_by, previous_version_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(&input.name)
            .bind(input.version)
            .bind(&input.fields.content)
            .bind(&input.fields.category)
            .bind(&input.fields.tags)
            .bind(input.is_active)
            .bind(&input.created_by)
            .bind(input.previous_version_id)
            .fetch_one(executor)
            .await
    }

    /// Set `is_active` on one version. Returns `None` if the id does not exist.
    pub async fn set_active<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("UPDATE templates SET is_active = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(executor)
            .await
    }

    /// Hard-delete every version of a name. Parameters and usage rows go with
    /// them through `ON DELETE CASCADE`. Returns the number of versions removed.
    pub async fn delete_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM templates WHERE name = $1")
            .bind(name)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
