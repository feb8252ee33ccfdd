//! Version log vocabulary: lifecycle actions and their metadata.
//!
//! Entries are append-only. This module lives in `core` so that both store
//! implementations build identical entries.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;
use crate::value::{Metadata, Value};

// ---------------------------------------------------------------------------
// Action constants
// ---------------------------------------------------------------------------

pub const ACTION_CREATED: &str = "created";
pub const ACTION_ACTIVATED: &str = "activated";
pub const ACTION_DEACTIVATED: &str = "deactivated";
pub const ACTION_ROLLBACK: &str = "rollback";
pub const ACTION_DELETED: &str = "deleted";

/// All valid version log actions.
pub const VALID_ACTIONS: &[&str] = &[
    ACTION_CREATED,
    ACTION_ACTIVATED,
    ACTION_DEACTIVATED,
    ACTION_ROLLBACK,
    ACTION_DELETED,
];

// ---------------------------------------------------------------------------
// Metadata keys
// ---------------------------------------------------------------------------

pub const META_PREVIOUS_VERSION: &str = "previous_version";
pub const META_REPLACED_BY_ID: &str = "replaced_by_id";
pub const META_REPLACED_BY_VERSION: &str = "replaced_by_version";
pub const META_REPLACES_ID: &str = "replaces_id";
pub const META_REPLACES_VERSION: &str = "replaces_version";
pub const META_ROLLED_BACK_FROM: &str = "rolled_back_from";
pub const META_ROLLED_BACK_TO: &str = "rolled_back_to";
pub const META_DELETED_VERSIONS: &str = "deleted_versions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    Created,
    Activated,
    Deactivated,
    Rollback,
    Deleted,
}

impl VersionAction {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            ACTION_CREATED => Ok(Self::Created),
            ACTION_ACTIVATED => Ok(Self::Activated),
            ACTION_DEACTIVATED => Ok(Self::Deactivated),
            ACTION_ROLLBACK => Ok(Self::Rollback),
            ACTION_DELETED => Ok(Self::Deleted),
            _ => Err(CoreError::validation(
                "action",
                format!(
                    "Invalid version action '{s}'. Must be one of: {}",
                    VALID_ACTIONS.join(", ")
                ),
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => ACTION_CREATED,
            Self::Activated => ACTION_ACTIVATED,
            Self::Deactivated => ACTION_DEACTIVATED,
            Self::Rollback => ACTION_ROLLBACK,
            Self::Deleted => ACTION_DELETED,
        }
    }
}

impl std::fmt::Display for VersionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata builders
// ---------------------------------------------------------------------------

/// A version referenced from another entry's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRef {
    pub id: DbId,
    pub version: i32,
}

/// Metadata for a `created` entry.
pub fn created_metadata(previous_version: Option<i32>) -> Metadata {
    let mut meta = Metadata::new();
    if let Some(previous) = previous_version {
        meta.insert(META_PREVIOUS_VERSION.into(), Value::from(previous));
    }
    meta
}

/// Metadata for the `deactivated` half of an activation swap.
pub fn deactivated_metadata(replaced_by: VersionRef) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(META_REPLACED_BY_ID.into(), Value::from(replaced_by.id));
    meta.insert(META_REPLACED_BY_VERSION.into(), Value::from(replaced_by.version));
    meta
}

/// Metadata for the `activated` half of an activation swap.
pub fn activated_metadata(replaces: Option<VersionRef>) -> Metadata {
    let mut meta = Metadata::new();
    if let Some(old) = replaces {
        meta.insert(META_REPLACES_ID.into(), Value::from(old.id));
        meta.insert(META_REPLACES_VERSION.into(), Value::from(old.version));
    }
    meta
}

/// Metadata for a `rollback` entry.
pub fn rollback_metadata(rolled_back_from: i32, rolled_back_to: i32) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(META_ROLLED_BACK_FROM.into(), Value::from(rolled_back_from));
    meta.insert(META_ROLLED_BACK_TO.into(), Value::from(rolled_back_to));
    meta
}

/// Metadata for a `deleted` entry.
pub fn deleted_metadata(deleted_versions: u64) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(META_DELETED_VERSIONS.into(), Value::Number(deleted_versions as f64));
    meta
}
