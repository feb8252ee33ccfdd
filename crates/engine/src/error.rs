use std::time::Duration;

use promptline_core::error::CoreError;

/// Engine-level error type.
///
/// Wraps [`CoreError`] for domain errors and adds the failure modes of the
/// storage layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error from `promptline_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx that has no domain meaning.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A store call did not finish within the configured bound.
    #[error("Store operation '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(core) => core.is_retryable(),
            Self::Timeout { .. } => true,
            Self::Database(_) => false,
        }
    }

    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(core) => Some(core),
            _ => None,
        }
    }
}

/// PostgreSQL unique violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Name of the `uq_` constraint a unique violation tripped, if any.
pub fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            db_err.constraint().filter(|c| c.starts_with("uq_"))
        }
        _ => None,
    }
}

/// Classify a sqlx error into an engine error.
///
/// - `RowNotFound` maps to `NotFound`.
/// - Violations of an `uq_*_active_*` index map to `ConcurrencyConflict`:
///   another writer activated a version of the same name first.
/// - Other `uq_` violations map to `Conflict`.
/// - Everything else stays a `Database` error.
pub fn classify_sqlx_error(err: sqlx::Error, entity: &'static str, key: &str) -> EngineError {
    if matches!(err, sqlx::Error::RowNotFound) {
        return CoreError::not_found(entity, key).into();
    }
    let mapped = match unique_violation(&err) {
        Some(constraint) if constraint.contains("_active_") => Some(
            CoreError::ConcurrencyConflict(format!(
                "{entity} '{key}' was activated concurrently ({constraint})"
            )),
        ),
        Some(constraint) => Some(CoreError::Conflict(format!(
            "Duplicate value violates unique constraint: {constraint}"
        ))),
        None => None,
    };
    match mapped {
        Some(core) => core.into(),
        None => {
            tracing::error!(error = %err, entity, key, "Database error");
            EngineError::Database(err)
        }
    }
}

/// Run a store call under a deadline.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> EngineResult<T>
where
    F: std::future::Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?after, "Store operation timed out");
            Err(EngineError::Timeout { operation, after })
        }
    }
}
