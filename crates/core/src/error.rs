/// Domain errors shared by every layer.
///
/// Missing includes and unresolved placeholders are not errors: the renderer
/// reports them inline in its output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Duplicate name: a template named '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid version sequence for '{name}': expected version {expected}, got {actual}")]
    InvalidVersionSequence {
        name: String,
        expected: i32,
        actual: i32,
    },

    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Component cycle detected: {}", path.join(" -> "))]
    ComponentCycle { path: Vec<String> },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] keyed by anything displayable.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`CoreError::Validation`] on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may safely retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}
