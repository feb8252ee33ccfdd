//! Repository for the `template_parameters` table.

use promptline_core::parameter::ParameterDef;
use promptline_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};

use crate::models::parameter::TemplateParameter;

const COLUMNS: &str =
    "id, template_id, position, name, description, required, param_type, default_value";

pub struct ParameterRepo;

impl ParameterRepo {
    /// Insert a version's parameters in declared order.
    pub async fn insert_all(
        conn: &mut PgConnection,
        template_id: DbId,
        parameters: &[ParameterDef],
    ) -> Result<(), sqlx::Error> {
        for (position, param) in parameters.iter().enumerate() {
            sqlx::query(
                "INSERT INTO template_parameters
                    (template_id, position, name, description, required, param_type, default_value)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(template_id)
            .bind(position as i32)
            .bind(&param.name)
            .bind(&param.description)
            .bind(param.required)
            .bind(param.param_type.as_str())
            .bind(param.default_value.as_ref().map(Json))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Parameters of one version, in declared order.
    pub async fn list_for_template<'e, E: PgExecutor<'e>>(
        executor: E,
        template_id: DbId,
    ) -> Result<Vec<TemplateParameter>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM template_parameters \
             WHERE template_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, TemplateParameter>(&query)
            .bind(template_id)
            .fetch_all(executor)
            .await
    }

    /// Parameters of several versions at once, grouped by the caller.
    pub async fn list_for_templates<'e, E: PgExecutor<'e>>(
        executor: E,
        template_ids: &[DbId],
    ) -> Result<Vec<TemplateParameter>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM template_parameters \
             WHERE template_id = ANY($1) ORDER BY template_id ASC, position ASC"
        );
        sqlx::query_as::<_, TemplateParameter>(&query)
            .bind(template_ids)
            .fetch_all(executor)
            .await
    }

    /// Count parameters across every version of a name.
    pub async fn count_for_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM template_parameters p \
             JOIN templates t ON t.id = p.template_id \
             WHERE t.name = $1",
        )
        .bind(name)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }
}
