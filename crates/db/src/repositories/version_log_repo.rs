//! Repository for the append-only `template_version_log` table.

use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::version_log::{CreateVersionLogEntry, VersionLogEntry};

const COLUMNS: &str = "id, template_name, version, action, author, notes, metadata, timestamp";

pub struct VersionLogRepo;

impl VersionLogRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateVersionLogEntry,
    ) -> Result<VersionLogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO template_version_log
                (template_name, version, action, author, notes, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VersionLogEntry>(&query)
            .bind(&input.template_name)
            .bind(input.version)
            .bind(input.action.as_str())
            .bind(&input.author)
            .bind(&input.notes)
            .bind(Json(&input.metadata))
            .fetch_one(executor)
            .await
    }

    /// Entries for a name, newest first.
    pub async fn list_for_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Vec<VersionLogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM template_version_log \
             WHERE template_name = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, VersionLogEntry>(&query)
            .bind(name)
            .fetch_all(executor)
            .await
    }

    /// Remove every entry for a name. Only the family delete calls this.
    pub async fn delete_for_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM template_version_log WHERE template_name = $1")
            .bind(name)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
