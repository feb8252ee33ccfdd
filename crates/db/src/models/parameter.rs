//! Template parameter rows.

use promptline_core::error::CoreError;
use promptline_core::parameter::{ParameterDef, ParameterType};
use promptline_core::types::DbId;
use promptline_core::value::Value;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `template_parameters` table. `position` preserves the
/// declared order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TemplateParameter {
    pub id: DbId,
    pub template_id: DbId,
    pub position: i32,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: String,
    pub default_value: Option<Json<Value>>,
}

impl TemplateParameter {
    /// Convert to the domain definition, rejecting unknown type strings.
    pub fn to_def(&self) -> Result<ParameterDef, CoreError> {
        Ok(ParameterDef {
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
            param_type: ParameterType::from_str_value(&self.param_type)?,
            default_value: self.default_value.as_ref().map(|v| v.0.clone()),
        })
    }
}
