//! Template field validation and normalization.
//!
//! Every lifecycle write validates its input here before touching storage.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::parameter::{validate_parameters, ParameterDef};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length for a template or component name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for template content in characters.
pub const MAX_CONTENT_LENGTH: usize = 100_000;

/// Maximum length for a category.
pub const MAX_CATEGORY_LENGTH: usize = 100;

/// Maximum number of tags on one version.
pub const MAX_TAGS_COUNT: usize = 20;

/// Maximum length of a single tag.
pub const MAX_TAG_LENGTH: usize = 50;

/// Maximum length for version notes.
pub const MAX_NOTES_LENGTH: usize = 1_000;

/// Category assigned when the caller supplies none.
pub const DEFAULT_CATEGORY: &str = "general";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The mutable-by-new-version part of a template: everything except identity
/// and lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFields {
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl TemplateFields {
    /// Fields with the default category and no tags or parameters.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            category: default_category(),
            tags: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterDef>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Validate every field and return a copy with tags normalized.
    pub fn validated(&self) -> Result<Self, CoreError> {
        validate_content(&self.content)?;
        validate_category(&self.category)?;
        validate_tags(&self.tags)?;
        validate_parameters(&self.parameters)?;
        Ok(Self {
            content: self.content.clone(),
            category: self.category.trim().to_string(),
            tags: normalize_tags(&self.tags),
            parameters: self.parameters.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a template or component name.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::validation("name", "Name must not be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(CoreError::validation(
            "name",
            format!(
                "Name exceeds maximum length of {MAX_NAME_LENGTH} characters (got {})",
                name.len()
            ),
        ));
    }
    if !NAME_RE.is_match(name) {
        return Err(CoreError::validation(
            "name",
            format!("Name '{name}' may only contain letters, digits, '_', '.', and '-'"),
        ));
    }
    Ok(())
}

/// Validate template content: must be non-empty and within length limit.
pub fn validate_content(content: &str) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::validation("content", "Content must not be empty"));
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_LENGTH {
        return Err(CoreError::validation(
            "content",
            format!("Content exceeds maximum length of {MAX_CONTENT_LENGTH} characters (got {len})"),
        ));
    }
    Ok(())
}

/// Validate a category: non-empty and within length limit.
pub fn validate_category(category: &str) -> Result<(), CoreError> {
    if category.trim().is_empty() {
        return Err(CoreError::validation("category", "Category must not be empty"));
    }
    if category.len() > MAX_CATEGORY_LENGTH {
        return Err(CoreError::validation(
            "category",
            format!("Category exceeds maximum length of {MAX_CATEGORY_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Validate tags: count limit, each tag non-empty and within length limit.
pub fn validate_tags(tags: &[String]) -> Result<(), CoreError> {
    if tags.len() > MAX_TAGS_COUNT {
        return Err(CoreError::validation(
            "tags",
            format!("Tag count exceeds maximum of {MAX_TAGS_COUNT} (got {})", tags.len()),
        ));
    }
    for (index, tag) in tags.iter().enumerate() {
        if tag.trim().is_empty() {
            return Err(CoreError::validation(format!("tags[{index}]"), "Tag must not be empty"));
        }
        if tag.len() > MAX_TAG_LENGTH {
            return Err(CoreError::validation(
                format!("tags[{index}]"),
                format!("Tag exceeds maximum length of {MAX_TAG_LENGTH} characters"),
            ));
        }
    }
    Ok(())
}

/// Validate version notes: length check only.
pub fn validate_notes(notes: &str) -> Result<(), CoreError> {
    if notes.len() > MAX_NOTES_LENGTH {
        return Err(CoreError::validation(
            "notes",
            format!(
                "Notes exceed maximum length of {MAX_NOTES_LENGTH} characters (got {})",
                notes.len()
            ),
        ));
    }
    Ok(())
}

/// Tags are a set: trim, drop duplicates, and sort for stable storage.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tags.iter().map(|t| t.trim().to_string()).collect();
    out.sort();
    out.dedup();
    out
}
