//! Repository for the `components` table.

use promptline_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::component::{Component, CreateComponent};

const COLUMNS: &str =
    "id, name, version, content, category, tags, is_active, usage_count, created_at, updated_at";

pub struct ComponentRepo;

impl ComponentRepo {
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Component>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM components WHERE id = $1");
        sqlx::query_as::<_, Component>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Option<Component>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM components WHERE name = $1 AND is_active");
        sqlx::query_as::<_, Component>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_name_and_version<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        version: i32,
    ) -> Result<Option<Component>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM components WHERE name = $1 AND version = $2");
        sqlx::query_as::<_, Component>(&query)
            .bind(name)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Every active component, ordered by name.
    pub async fn list_active<'e, E: PgExecutor<'e>>(
        executor: E,
    ) -> Result<Vec<Component>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM components WHERE is_active ORDER BY name ASC");
        sqlx::query_as::<_, Component>(&query)
            .fetch_all(executor)
            .await
    }

    /// Lock every entry of a component name for the rest of the transaction.
    pub async fn lock_family<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Vec<Component>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM components WHERE name = $1 ORDER BY version ASC FOR UPDATE"
        );
        sqlx::query_as::<_, Component>(&query)
            .bind(name)
            .fetch_all(executor)
            .await
    }

    /// Insert an active entry with the given version number.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateComponent,
        version: i32,
    ) -> Result<Component, sqlx::Error> {
        let query = format!(
            "INSERT INTO components (name, version, content, category, tags, is_active)
             VALUES ($1, $2, $3, $4, $5, true)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Component>(&query)
            .bind(&input.name)
            .bind(version)
            .bind(&input.content)
            .bind(&input.category)
            .bind(&input.tags)
            .fetch_one(executor)
            .await
    }

    /// Clear `is_active`. Returns `false` if the entry was not active.
    pub async fn deactivate<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE components SET is_active = false WHERE id = $1 AND is_active")
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_usage<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE components SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
