//! Version comparison: line, word, parameter, and tag diffs plus statistics.
//!
//! Content diffs use positional pairing, not LCS: two cursors walk both
//! sequences, equal pairs are unchanged, a mismatched pair becomes one
//! removed and one added entry, and leftover tails are removed or added.
//! Reordered content therefore shows up as paired changes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterDef;
use crate::template::TemplateFields;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The status of an item in a diff comparison.
///
/// - `Added`     -- present only in the newer version.
/// - `Removed`   -- present only in the older version.
/// - `Modified`  -- present in both with different values.
/// - `Unchanged` -- present in both with identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl DiffStatus {
    /// String representation for display and export.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Identity and lifecycle data of one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: DbId,
    pub version: i32,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: Timestamp,
}

/// A stored version as seen by the diff engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSnapshot {
    pub summary: VersionSummary,
    pub fields: TemplateFields,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// One line or word in a content diff. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub status: DiffStatus,
    pub text: String,
    pub old_position: Option<usize>,
    pub new_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDiff {
    pub changed: bool,
    pub lines: Vec<DiffEntry>,
    pub words: Vec<DiffEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryChange {
    pub from: String,
    pub to: String,
}

/// A parameter present in both versions whose declaration differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub name: String,
    pub before: ParameterDef,
    pub after: ParameterDef,
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDiff {
    pub added: Vec<ParameterDef>,
    pub removed: Vec<ParameterDef>,
    pub modified: Vec<ParameterChange>,
    pub unchanged: Vec<String>,
}

impl ParameterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_unchanged: usize,
    pub words_added: usize,
    pub words_removed: usize,
    /// New length minus old length, in characters.
    pub char_delta: i64,
    pub parameters_added: usize,
    pub parameters_removed: usize,
    pub parameters_modified: usize,
    pub tags_added: usize,
    pub tags_removed: usize,
    /// Reported on its own; not part of `total_changes`.
    pub category_changed: bool,
    /// Lines, parameters and tags added, removed or modified.
    pub total_changes: usize,
}

/// The full result of comparing two versions of one template.
///
/// Every output format is a projection of this value; see
/// [`crate::diff_format`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPayload {
    pub template_name: String,
    pub from: VersionSummary,
    pub to: VersionSummary,
    pub content: ContentDiff,
    pub category: Option<CategoryChange>,
    pub parameters: ParameterDiff,
    pub tags: TagDiff,
    pub stats: DiffStats,
}

impl DiffPayload {
    pub fn has_changes(&self) -> bool {
        self.stats.total_changes > 0 || self.stats.category_changed
    }
}

// ---------------------------------------------------------------------------
// Content diff
// ---------------------------------------------------------------------------

fn positional_diff(old: &[&str], new: &[&str]) -> Vec<DiffEntry> {
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);

    while i < old.len() || j < new.len() {
        match (old.get(i), new.get(j)) {
            (Some(a), Some(b)) if a == b => {
                out.push(DiffEntry {
                    status: DiffStatus::Unchanged,
                    text: a.to_string(),
                    old_position: Some(i + 1),
                    new_position: Some(j + 1),
                });
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) => {
                out.push(DiffEntry {
                    status: DiffStatus::Removed,
                    text: a.to_string(),
                    old_position: Some(i + 1),
                    new_position: None,
                });
                out.push(DiffEntry {
                    status: DiffStatus::Added,
                    text: b.to_string(),
                    old_position: None,
                    new_position: Some(j + 1),
                });
                i += 1;
                j += 1;
            }
            (Some(a), None) => {
                out.push(DiffEntry {
                    status: DiffStatus::Removed,
                    text: a.to_string(),
                    old_position: Some(i + 1),
                    new_position: None,
                });
                i += 1;
            }
            (None, Some(b)) => {
                out.push(DiffEntry {
                    status: DiffStatus::Added,
                    text: b.to_string(),
                    old_position: None,
                    new_position: Some(j + 1),
                });
                j += 1;
            }
            (None, None) => break,
        }
    }

    out
}

/// Positional line diff.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffEntry> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    positional_diff(&old_lines, &new_lines)
}

/// Positional word diff over whitespace-separated tokens.
pub fn diff_words(old: &str, new: &str) -> Vec<DiffEntry> {
    let old_words: Vec<&str> = old.split_whitespace().collect();
    let new_words: Vec<&str> = new.split_whitespace().collect();
    positional_diff(&old_words, &new_words)
}

fn count(entries: &[DiffEntry], status: DiffStatus) -> usize {
    entries.iter().filter(|e| e.status == status).count()
}

// ---------------------------------------------------------------------------
// Parameter and tag diffs
// ---------------------------------------------------------------------------

fn changed_fields(before: &ParameterDef, after: &ParameterDef) -> Vec<String> {
    let mut fields = Vec::new();
    if before.description != after.description {
        fields.push("description".to_string());
    }
    if before.required != after.required {
        fields.push("required".to_string());
    }
    if before.param_type != after.param_type {
        fields.push("type".to_string());
    }
    if before.default_value != after.default_value {
        fields.push("default_value".to_string());
    }
    fields
}

/// Compare parameter lists keyed by name.
pub fn diff_parameters(old: &[ParameterDef], new: &[ParameterDef]) -> ParameterDiff {
    let old_by_name: BTreeMap<&str, &ParameterDef> =
        old.iter().map(|p| (p.name.as_str(), p)).collect();
    let new_by_name: BTreeMap<&str, &ParameterDef> =
        new.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut diff = ParameterDiff::default();

    for (name, after) in &new_by_name {
        match old_by_name.get(name) {
            None => diff.added.push((*after).clone()),
            Some(before) if before == after => diff.unchanged.push(name.to_string()),
            Some(before) => diff.modified.push(ParameterChange {
                name: name.to_string(),
                before: (*before).clone(),
                after: (*after).clone(),
                changed_fields: changed_fields(before, after),
            }),
        }
    }
    for (name, before) in &old_by_name {
        if !new_by_name.contains_key(name) {
            diff.removed.push((*before).clone());
        }
    }

    diff
}

/// Set difference over tag collections.
pub fn diff_tags(old: &[String], new: &[String]) -> TagDiff {
    let old_set: BTreeSet<&String> = old.iter().collect();
    let new_set: BTreeSet<&String> = new.iter().collect();

    TagDiff {
        added: new_set.difference(&old_set).map(|s| s.to_string()).collect(),
        removed: old_set.difference(&new_set).map(|s| s.to_string()).collect(),
        unchanged: old_set.intersection(&new_set).map(|s| s.to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Compare two versions of the template `template_name`.
pub fn compare(template_name: &str, old: &VersionSnapshot, new: &VersionSnapshot) -> DiffPayload {
    let lines = diff_lines(&old.fields.content, &new.fields.content);
    let words = diff_words(&old.fields.content, &new.fields.content);
    let parameters = diff_parameters(&old.fields.parameters, &new.fields.parameters);
    let tags = diff_tags(&old.fields.tags, &new.fields.tags);
    let category = (old.fields.category != new.fields.category).then(|| CategoryChange {
        from: old.fields.category.clone(),
        to: new.fields.category.clone(),
    });

    let mut stats = DiffStats {
        lines_added: count(&lines, DiffStatus::Added),
        lines_removed: count(&lines, DiffStatus::Removed),
        lines_unchanged: count(&lines, DiffStatus::Unchanged),
        words_added: count(&words, DiffStatus::Added),
        words_removed: count(&words, DiffStatus::Removed),
        char_delta: new.fields.content.chars().count() as i64
            - old.fields.content.chars().count() as i64,
        parameters_added: parameters.added.len(),
        parameters_removed: parameters.removed.len(),
        parameters_modified: parameters.modified.len(),
        tags_added: tags.added.len(),
        tags_removed: tags.removed.len(),
        category_changed: category.is_some(),
        total_changes: 0,
    };
    stats.total_changes = stats.lines_added
        + stats.lines_removed
        + stats.parameters_added
        + stats.parameters_removed
        + stats.parameters_modified
        + stats.tags_added
        + stats.tags_removed;

    DiffPayload {
        template_name: template_name.to_string(),
        from: old.summary.clone(),
        to: new.summary.clone(),
        content: ContentDiff {
            changed: old.fields.content != new.fields.content,
            lines,
            words,
        },
        category,
        parameters,
        tags,
        stats,
    }
}
