//! Output projections for [`DiffPayload`].
//!
//! Each projection is a pure function of an already computed payload; none
//! of them re-run the diff.

use serde::{Deserialize, Serialize};

use crate::diff::{DiffEntry, DiffPayload, DiffStatus};
use crate::error::CoreError;
use crate::parameter::ParameterDef;
use crate::pdf;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

pub const FORMAT_STRUCTURED: &str = "structured";
pub const FORMAT_HTML: &str = "html";
pub const FORMAT_MARKDOWN: &str = "markdown";
pub const FORMAT_PDF: &str = "pdf";

/// All accepted format names (aliases included).
pub const VALID_FORMATS: &[&str] = &[
    FORMAT_STRUCTURED,
    "json",
    FORMAT_HTML,
    FORMAT_MARKDOWN,
    "md",
    FORMAT_PDF,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffFormat {
    Structured,
    Html,
    Markdown,
    Pdf,
}

impl DiffFormat {
    /// Parse a format name as supplied by a caller.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_lowercase().as_str() {
            FORMAT_STRUCTURED | "json" => Ok(Self::Structured),
            FORMAT_HTML => Ok(Self::Html),
            FORMAT_MARKDOWN | "md" => Ok(Self::Markdown),
            FORMAT_PDF => Ok(Self::Pdf),
            _ => Err(CoreError::validation(
                "format",
                format!(
                    "Invalid diff format '{s}'. Must be one of: {}",
                    VALID_FORMATS.join(", ")
                ),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => FORMAT_STRUCTURED,
            Self::Html => FORMAT_HTML,
            Self::Markdown => FORMAT_MARKDOWN,
            Self::Pdf => FORMAT_PDF,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Structured => "application/json",
            Self::Html => "text/html; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Structured => "json",
            Self::Html => "html",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
        }
    }
}

/// A projected diff document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiff {
    pub format: DiffFormat,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl RenderedDiff {
    /// Suggested file name, e.g. `greeting_v1_v2.md`.
    pub fn file_name(&self, payload: &DiffPayload) -> String {
        format!(
            "{}_v{}_v{}.{}",
            payload.template_name,
            payload.from.version,
            payload.to.version,
            self.format.file_extension()
        )
    }
}

/// Project `payload` into `format`.
pub fn project(payload: &DiffPayload, format: DiffFormat) -> Result<RenderedDiff, CoreError> {
    let body = match format {
        DiffFormat::Structured => to_structured(payload)?.into_bytes(),
        DiffFormat::Html => to_html(payload).into_bytes(),
        DiffFormat::Markdown => to_markdown(payload).into_bytes(),
        DiffFormat::Pdf => to_pdf(payload),
    };
    Ok(RenderedDiff {
        format,
        content_type: format.content_type(),
        body,
    })
}

// ---------------------------------------------------------------------------
// Structured
// ---------------------------------------------------------------------------

/// Pretty-printed JSON export of the whole payload.
pub fn to_structured(payload: &DiffPayload) -> Result<String, CoreError> {
    serde_json::to_string_pretty(payload)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize diff: {e}")))
}

// ---------------------------------------------------------------------------
// Side-by-side rows (shared by HTML)
// ---------------------------------------------------------------------------

/// One row of a side-by-side view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideBySideRow<'a> {
    pub old: Option<&'a DiffEntry>,
    pub new: Option<&'a DiffEntry>,
}

/// Group line entries into rows: a removal directly followed by an addition
/// shares a row.
pub fn side_by_side(lines: &[DiffEntry]) -> Vec<SideBySideRow<'_>> {
    let mut rows = Vec::with_capacity(lines.len());
    let mut idx = 0;
    while idx < lines.len() {
        let entry = &lines[idx];
        match entry.status {
            DiffStatus::Removed => {
                let next = lines.get(idx + 1).filter(|n| n.status == DiffStatus::Added);
                rows.push(SideBySideRow {
                    old: Some(entry),
                    new: next,
                });
                idx += if next.is_some() { 2 } else { 1 };
            }
            DiffStatus::Added => {
                rows.push(SideBySideRow {
                    old: None,
                    new: Some(entry),
                });
                idx += 1;
            }
            DiffStatus::Unchanged | DiffStatus::Modified => {
                rows.push(SideBySideRow {
                    old: Some(entry),
                    new: Some(entry),
                });
                idx += 1;
            }
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_cell(entry: Option<&DiffEntry>, side: &str) -> String {
    match entry {
        Some(e) => {
            let position = if side == "old" { e.old_position } else { e.new_position };
            format!(
                "<td class=\"ln\">{}</td><td class=\"{}\">{}</td>",
                position.map(|p| p.to_string()).unwrap_or_default(),
                e.status.as_str(),
                escape_html(&e.text)
            )
        }
        None => "<td class=\"ln\"></td><td class=\"empty\"></td>".to_string(),
    }
}

fn html_parameter_list(title: &str, params: &[ParameterDef]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut out = format!("<h3>{}</h3>\n<ul>\n", escape_html(title));
    for p in params {
        out.push_str(&format!(
            "<li><code>{}</code> ({}) {}</li>\n",
            escape_html(&p.name),
            p.param_type.as_str(),
            escape_html(&p.description)
        ));
    }
    out.push_str("</ul>\n");
    out
}

/// Standalone HTML page with a side-by-side line view.
pub fn to_html(payload: &DiffPayload) -> String {
    let name = escape_html(&payload.template_name);
    let s = &payload.stats;
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>{name}: v{} vs v{}</title>\n",
        payload.from.version, payload.to.version
    ));
    out.push_str(
        "<style>\
         table{border-collapse:collapse;width:100%;font-family:monospace}\
         td{padding:2px 6px;vertical-align:top;white-space:pre-wrap}\
         td.ln{color:#888;text-align:right;width:3em}\
         td.added{background:#e6ffed}td.removed{background:#ffeef0}\
         td.empty{background:#fafbfc}\
         </style>\n</head>\n<body>\n",
    );
    out.push_str(&format!(
        "<h1>{name}: version {} &rarr; version {}</h1>\n",
        payload.from.version, payload.to.version
    ));
    out.push_str(&format!(
        "<p class=\"summary\">{} total changes: +{} / -{} lines, +{} / -{} words, {:+} characters</p>\n",
        s.total_changes, s.lines_added, s.lines_removed, s.words_added, s.words_removed, s.char_delta
    ));

    out.push_str("<h2>Content</h2>\n<table class=\"diff\">\n");
    out.push_str(&format!(
        "<tr><th colspan=\"2\">v{}</th><th colspan=\"2\">v{}</th></tr>\n",
        payload.from.version, payload.to.version
    ));
    for row in side_by_side(&payload.content.lines) {
        out.push_str(&format!(
            "<tr>{}{}</tr>\n",
            html_cell(row.old, "old"),
            html_cell(row.new, "new")
        ));
    }
    out.push_str("</table>\n");

    if let Some(change) = &payload.category {
        out.push_str(&format!(
            "<h2>Category</h2>\n<p>{} &rarr; {}</p>\n",
            escape_html(&change.from),
            escape_html(&change.to)
        ));
    }

    out.push_str("<h2>Parameters</h2>\n");
    if payload.parameters.is_empty() {
        out.push_str("<p>No parameter changes.</p>\n");
    } else {
        out.push_str(&html_parameter_list("Added", &payload.parameters.added));
        out.push_str(&html_parameter_list("Removed", &payload.parameters.removed));
        if !payload.parameters.modified.is_empty() {
            out.push_str("<h3>Modified</h3>\n<ul>\n");
            for change in &payload.parameters.modified {
                out.push_str(&format!(
                    "<li><code>{}</code>: {}</li>\n",
                    escape_html(&change.name),
                    escape_html(&change.changed_fields.join(", "))
                ));
            }
            out.push_str("</ul>\n");
        }
    }

    out.push_str("<h2>Tags</h2>\n");
    if payload.tags.is_empty() {
        out.push_str("<p>No tag changes.</p>\n");
    } else {
        for tag in &payload.tags.added {
            out.push_str(&format!("<span class=\"added\">+{}</span>\n", escape_html(tag)));
        }
        for tag in &payload.tags.removed {
            out.push_str(&format!("<span class=\"removed\">-{}</span>\n", escape_html(tag)));
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn diff_prefix(status: DiffStatus) -> char {
    match status {
        DiffStatus::Added => '+',
        DiffStatus::Removed => '-',
        DiffStatus::Unchanged | DiffStatus::Modified => ' ',
    }
}

/// A backtick fence longer than any backtick run inside `lines`.
fn code_fence(lines: &[DiffEntry]) -> String {
    let longest = lines
        .iter()
        .flat_map(|entry| entry.text.split(|c| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

/// Review report in Markdown with a fenced `diff` block.
pub fn to_markdown(payload: &DiffPayload) -> String {
    let s = &payload.stats;
    let mut out = String::new();

    out.push_str(&format!(
        "# {}: v{} → v{}\n\n",
        payload.template_name, payload.from.version, payload.to.version
    ));
    out.push_str("| | From | To |\n|---|---|---|\n");
    out.push_str(&format!(
        "| Version | {} | {} |\n",
        payload.from.version, payload.to.version
    ));
    out.push_str(&format!(
        "| Active | {} | {} |\n",
        payload.from.is_active, payload.to.is_active
    ));
    out.push_str(&format!(
        "| Author | {} | {} |\n",
        payload.from.created_by, payload.to.created_by
    ));
    out.push_str(&format!(
        "| Created | {} | {} |\n\n",
        payload.from.created_at.to_rfc3339(),
        payload.to.created_at.to_rfc3339()
    ));

    out.push_str("## Summary\n\n");
    out.push_str(&format!("- Total changes: {}\n", s.total_changes));
    out.push_str(&format!("- Lines: +{} / -{}\n", s.lines_added, s.lines_removed));
    out.push_str(&format!("- Words: +{} / -{}\n", s.words_added, s.words_removed));
    out.push_str(&format!("- Characters: {:+}\n\n", s.char_delta));

    out.push_str("## Content\n\n");
    if payload.content.changed {
        let fence = code_fence(&payload.content.lines);
        out.push_str(&format!("{fence}diff\n"));
        for entry in &payload.content.lines {
            out.push(diff_prefix(entry.status));
            out.push_str(&entry.text);
            out.push('\n');
        }
        out.push_str(&format!("{fence}\n\n"));
    } else {
        out.push_str("Content unchanged.\n\n");
    }

    if let Some(change) = &payload.category {
        out.push_str(&format!(
            "## Category\n\n`{}` → `{}`\n\n",
            change.from, change.to
        ));
    }

    out.push_str("## Parameters\n\n");
    if payload.parameters.is_empty() {
        out.push_str("No parameter changes.\n\n");
    } else {
        for p in &payload.parameters.added {
            out.push_str(&format!("- **added** `{}` ({})\n", p.name, p.param_type.as_str()));
        }
        for p in &payload.parameters.removed {
            out.push_str(&format!("- **removed** `{}` ({})\n", p.name, p.param_type.as_str()));
        }
        for change in &payload.parameters.modified {
            out.push_str(&format!(
                "- **modified** `{}`: {}\n",
                change.name,
                change.changed_fields.join(", ")
            ));
        }
        out.push('\n');
    }

    out.push_str("## Tags\n\n");
    if payload.tags.is_empty() {
        out.push_str("No tag changes.\n");
    } else {
        for tag in &payload.tags.added {
            out.push_str(&format!("- **added** `{tag}`\n"));
        }
        for tag in &payload.tags.removed {
            out.push_str(&format!("- **removed** `{tag}`\n"));
        }
    }

    out
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

/// Plain-text report lines used by the printable projection.
pub fn report_lines(payload: &DiffPayload) -> Vec<String> {
    let s = &payload.stats;
    let mut lines = vec![
        format!(
            "Template {}: version {} -> version {}",
            payload.template_name, payload.from.version, payload.to.version
        ),
        format!(
            "From: {} at {}",
            payload.from.created_by,
            payload.from.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
        format!(
            "To:   {} at {}",
            payload.to.created_by,
            payload.to.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
        String::new(),
        format!(
            "Total changes: {}  Lines +{}/-{}  Words +{}/-{}  Chars {:+}",
            s.total_changes, s.lines_added, s.lines_removed, s.words_added, s.words_removed, s.char_delta
        ),
        String::new(),
        "Content:".to_string(),
    ];
    for entry in &payload.content.lines {
        lines.push(format!("{} {}", diff_prefix(entry.status), entry.text));
    }
    if let Some(change) = &payload.category {
        lines.push(String::new());
        lines.push(format!("Category: {} -> {}", change.from, change.to));
    }
    lines.push(String::new());
    lines.push("Parameters:".to_string());
    if payload.parameters.is_empty() {
        lines.push("  (no changes)".to_string());
    }
    for p in &payload.parameters.added {
        lines.push(format!("  + {} ({})", p.name, p.param_type.as_str()));
    }
    for p in &payload.parameters.removed {
        lines.push(format!("  - {} ({})", p.name, p.param_type.as_str()));
    }
    for change in &payload.parameters.modified {
        lines.push(format!("  ~ {}: {}", change.name, change.changed_fields.join(", ")));
    }
    lines.push(String::new());
    lines.push("Tags:".to_string());
    if payload.tags.is_empty() {
        lines.push("  (no changes)".to_string());
    }
    for tag in &payload.tags.added {
        lines.push(format!("  + {tag}"));
    }
    for tag in &payload.tags.removed {
        lines.push(format!("  - {tag}"));
    }
    lines
}

/// Printable PDF report.
pub fn to_pdf(payload: &DiffPayload) -> Vec<u8> {
    let title = format!(
        "{} v{} vs v{}",
        payload.template_name, payload.from.version, payload.to.version
    );
    pdf::text_document(&title, &report_lines(payload))
}
