//! Template parameter declarations and their validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::{ParamMap, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TYPE_STRING: &str = "string";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_OBJECT: &str = "object";

/// All valid parameter type names.
pub const VALID_PARAMETER_TYPES: &[&str] =
    &[TYPE_STRING, TYPE_NUMBER, TYPE_BOOLEAN, TYPE_ARRAY, TYPE_OBJECT];

/// Maximum length for a parameter name.
pub const MAX_PARAMETER_NAME_LENGTH: usize = 100;

/// Maximum number of parameters on one template version.
pub const MAX_PARAMETERS: usize = 50;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            TYPE_STRING => Ok(Self::String),
            TYPE_NUMBER => Ok(Self::Number),
            TYPE_BOOLEAN => Ok(Self::Boolean),
            TYPE_ARRAY => Ok(Self::Array),
            TYPE_OBJECT => Ok(Self::Object),
            _ => Err(CoreError::validation(
                "type",
                format!(
                    "Invalid parameter type '{s}'. Must be one of: {}",
                    VALID_PARAMETER_TYPES.join(", ")
                ),
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => TYPE_STRING,
            Self::Number => TYPE_NUMBER,
            Self::Boolean => TYPE_BOOLEAN,
            Self::Array => TYPE_ARRAY,
            Self::Object => TYPE_OBJECT,
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Array, Value::List(_))
                | (Self::Object, Value::Map(_))
        )
    }
}

/// A parameter declared by a template version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub default_value: Option<Value>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate one parameter declaration. `index` is used in the field path.
pub fn validate_parameter(index: usize, param: &ParameterDef) -> Result<(), CoreError> {
    let field = |name: &str| format!("parameters[{index}].{name}");

    if param.name.trim().is_empty() {
        return Err(CoreError::validation(field("name"), "Parameter name is required"));
    }
    if param.name.len() > MAX_PARAMETER_NAME_LENGTH {
        return Err(CoreError::validation(
            field("name"),
            format!(
                "Parameter name exceeds maximum length of {MAX_PARAMETER_NAME_LENGTH} characters (got {})",
                param.name.len()
            ),
        ));
    }
    if param.description.trim().is_empty() {
        return Err(CoreError::validation(
            field("description"),
            format!("Parameter '{}' requires a description", param.name),
        ));
    }
    if let Some(default) = &param.default_value {
        if !param.param_type.accepts(default) {
            return Err(CoreError::validation(
                field("default_value"),
                format!(
                    "Default value for '{}' is {} but the declared type is {}",
                    param.name,
                    default.type_name(),
                    param.param_type.as_str()
                ),
            ));
        }
        if !default.is_finite() {
            return Err(CoreError::validation(
                field("default_value"),
                format!("Default value for '{}' must not contain NaN or infinity", param.name),
            ));
        }
    }
    Ok(())
}

/// Validate a full parameter list: each entry, count limit, and unique names.
pub fn validate_parameters(params: &[ParameterDef]) -> Result<(), CoreError> {
    if params.len() > MAX_PARAMETERS {
        return Err(CoreError::validation(
            "parameters",
            format!("Parameter count exceeds maximum of {MAX_PARAMETERS} (got {})", params.len()),
        ));
    }

    let mut seen = HashSet::new();
    for (index, param) in params.iter().enumerate() {
        validate_parameter(index, param)?;
        if !seen.insert(param.name.as_str()) {
            return Err(CoreError::validation(
                format!("parameters[{index}].name"),
                format!("Duplicate parameter name '{}'", param.name),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Render-time helpers
// ---------------------------------------------------------------------------

/// Fill in declared defaults for parameters absent from `values`.
pub fn apply_defaults(params: &[ParameterDef], values: &ParamMap) -> ParamMap {
    let mut merged = values.clone();
    for param in params {
        if let Some(default) = &param.default_value {
            merged
                .entry(param.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
    merged
}

/// Names of required parameters that have neither a value nor a default.
pub fn missing_required(params: &[ParameterDef], values: &ParamMap) -> Vec<String> {
    params
        .iter()
        .filter(|p| p.required && p.default_value.is_none() && !values.contains_key(&p.name))
        .map(|p| p.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: ParameterType, default: Option<Value>) -> ParameterDef {
        ParameterDef {
            name: name.to_string(),
            description: format!("The {name}"),
            required: false,
            param_type: ty,
            default_value: default,
        }
    }

    #[test]
    fn type_round_trips_through_db_string() {
        for name in VALID_PARAMETER_TYPES {
            assert_eq!(ParameterType::from_str_value(name).unwrap().as_str(), *name);
        }
        assert!(ParameterType::from_str_value("date").is_err());
    }

    #[test]
    fn valid_parameter_passes() {
        let p = param("name", ParameterType::String, Some(Value::from("Bob")));
        assert!(validate_parameter(0, &p).is_ok());
    }

    #[test]
    fn missing_name_rejected_with_field_path() {
        let p = param("  ", ParameterType::String, None);
        let err = validate_parameter(2, &p).unwrap_err();
        assert_eq!(
            err,
            CoreError::validation("parameters[2].name", "Parameter name is required")
        );
    }

    #[test]
    fn missing_description_rejected() {
        let mut p = param("tone", ParameterType::String, None);
        p.description = String::new();
        let err = validate_parameter(0, &p).unwrap_err();
        assert!(err.to_string().contains("parameters[0].description"));
    }

    #[test]
    fn mismatched_default_rejected() {
        let p = param("count", ParameterType::Number, Some(Value::from("three")));
        let err = validate_parameter(0, &p).unwrap_err();
        assert!(err.to_string().contains("is string but the declared type is number"));
    }

    #[test]
    fn non_finite_defaults_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let p = param("ratio", ParameterType::Number, Some(Value::from(bad)));
            let err = validate_parameters(&[p]).unwrap_err();
            assert!(err.to_string().contains("parameters[0].default_value"));
        }
        let nested = param(
            "weights",
            ParameterType::Array,
            Some(Value::List(vec![Value::from(0.5), Value::from(f64::NAN)])),
        );
        assert!(validate_parameter(0, &nested).is_err());
        let fine = param("ratio", ParameterType::Number, Some(Value::from(0.25)));
        assert!(validate_parameter(0, &fine).is_ok());
    }

    #[test]
    fn duplicate_names_rejected() {
        let params = vec![
            param("a", ParameterType::String, None),
            param("a", ParameterType::Boolean, None),
        ];
        let err = validate_parameters(&params).unwrap_err();
        assert!(err.to_string().contains("Duplicate parameter name 'a'"));
    }

    #[test]
    fn defaults_fill_only_missing_values() {
        let params = vec![
            param("name", ParameterType::String, Some(Value::from("World"))),
            param("vip", ParameterType::Boolean, Some(Value::from(false))),
        ];
        let mut values = ParamMap::new();
        values.insert("name".into(), Value::from("Bob"));

        let merged = apply_defaults(&params, &values);
        assert_eq!(merged["name"], Value::from("Bob"));
        assert_eq!(merged["vip"], Value::from(false));
    }

    #[test]
    fn missing_required_ignores_defaulted_params() {
        let mut required = param("name", ParameterType::String, None);
        required.required = true;
        let mut defaulted = param("lang", ParameterType::String, Some(Value::from("en")));
        defaulted.required = true;

        let missing = missing_required(&[required, defaulted], &ParamMap::new());
        assert_eq!(missing, vec!["name".to_string()]);
    }
}
