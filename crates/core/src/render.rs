//! The template mini-language.
//!
//! Three directive kinds live inside `{{ ... }}` tags:
//!
//! - `{{ include <component> }}`: replaced by the active component's content.
//! - `{{ if <param> }} ... {{ else }} ... {{ endif }}`: conditional sections.
//! - `{{ <param> }}`: placeholder substitution.
//!
//! Rendering runs in that strict order over pre-loaded component content, so
//! this module performs no I/O. Missing references never fail a render; they
//! are reported inline and in [`RenderOutput`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::CoreError;
use crate::value::{ParamMap, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of nested include levels resolved before giving up.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 8;

/// Words that can never be placeholder names.
const RESERVED_WORDS: &[&str] = &["include", "if", "else", "endif"];

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*include\s+([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid regex")
});

static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(?:if\s+([A-Za-z_][A-Za-z0-9_.]*)|(else)|(endif))\s*\}\}")
        .expect("valid regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("valid regex")
});

/// Inline marker for an include whose component is missing or inactive.
pub fn not_found_marker(name: &str) -> String {
    format!("[Component not found: {name}]")
}

/// Inline marker for an include that would recurse into itself.
pub fn cycle_marker(path: &[String]) -> String {
    format!("[Component cycle: {}]", path.join(" -> "))
}

/// Inline marker for an include nested deeper than the configured limit.
pub fn depth_marker(name: &str) -> String {
    format!("[Component depth limit exceeded: {name}]")
}

// ---------------------------------------------------------------------------
// Component lookup
// ---------------------------------------------------------------------------

/// Source of active component content, keyed by component name.
pub trait ComponentLookup {
    fn component_content(&self, name: &str) -> Option<&str>;
}

impl ComponentLookup for HashMap<String, String> {
    fn component_content(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl ComponentLookup for BTreeMap<String, String> {
    fn component_content(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A lookup with one component's content replaced, used to vet a component
/// write before it is committed.
struct Overlay<'a, L: ?Sized> {
    name: &'a str,
    content: &'a str,
    inner: &'a L,
}

impl<L: ComponentLookup + ?Sized> ComponentLookup for Overlay<'_, L> {
    fn component_content(&self, name: &str) -> Option<&str> {
        if name == self.name {
            Some(self.content)
        } else {
            self.inner.component_content(name)
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The result of a render, including every soft failure encountered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOutput {
    pub text: String,
    /// One entry per substituted include (a component included twice appears twice).
    pub included: Vec<String>,
    /// Includes rendered as "not found" markers.
    pub missing: Vec<String>,
    /// Include chains that looped back on themselves.
    pub cycles: Vec<Vec<String>>,
    /// Includes skipped because of the depth limit.
    pub depth_exceeded: Vec<String>,
    /// Placeholders left in the text because no parameter matched.
    pub unresolved: Vec<String>,
}

impl RenderOutput {
    /// Whether the render resolved every reference.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
            && self.cycles.is_empty()
            && self.depth_exceeded.is_empty()
            && self.unresolved.is_empty()
    }
}

/// Directives found in a piece of content, de-duplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directives {
    pub includes: Vec<String>,
    pub conditionals: Vec<String>,
    pub placeholders: Vec<String>,
}

/// List the include, conditional, and placeholder names used by `content`.
pub fn extract_directives(content: &str) -> Directives {
    let includes: BTreeSet<String> = INCLUDE_RE
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect();
    let conditionals: BTreeSet<String> = CONTROL_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    let placeholders: BTreeSet<String> = PLACEHOLDER_RE
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .filter(|name| !RESERVED_WORDS.contains(&name.as_str()))
        .collect();

    Directives {
        includes: includes.into_iter().collect(),
        conditionals: conditionals.into_iter().collect(),
        placeholders: placeholders.into_iter().collect(),
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Pure renderer over pre-loaded component content.
#[derive(Debug, Clone, Copy)]
pub struct TemplateRenderer {
    max_include_depth: usize,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INCLUDE_DEPTH)
    }
}

impl TemplateRenderer {
    pub fn new(max_include_depth: usize) -> Self {
        Self { max_include_depth }
    }

    pub fn max_include_depth(&self) -> usize {
        self.max_include_depth
    }

    /// Render `content`. Never fails; soft failures are reported inline.
    pub fn render<L>(&self, content: &str, params: &ParamMap, components: &L) -> RenderOutput
    where
        L: ComponentLookup + ?Sized,
    {
        let mut output = RenderOutput::default();

        let mut stack = Vec::new();
        let expanded = self.resolve_includes(content, components, &mut stack, &mut output);
        let conditioned = apply_conditionals(&expanded, params);
        output.text = substitute_placeholders(&conditioned, params, &mut output.unresolved);

        output
    }

    /// Render `content`, failing with [`CoreError::ComponentCycle`] if any
    /// include chain loops.
    pub fn render_checked<L>(
        &self,
        content: &str,
        params: &ParamMap,
        components: &L,
    ) -> Result<RenderOutput, CoreError>
    where
        L: ComponentLookup + ?Sized,
    {
        let output = self.render(content, params, components);
        match output.cycles.first() {
            Some(path) => Err(CoreError::ComponentCycle { path: path.clone() }),
            None => Ok(output),
        }
    }

    /// Check whether saving `content` under component `name` would create an
    /// include cycle with the existing components.
    pub fn find_include_cycle<L>(
        &self,
        name: &str,
        content: &str,
        components: &L,
    ) -> Option<Vec<String>>
    where
        L: ComponentLookup + ?Sized,
    {
        let overlay = Overlay {
            name,
            content,
            inner: components,
        };
        let mut output = RenderOutput::default();
        let mut stack = vec![name.to_string()];
        self.resolve_includes(content, &overlay, &mut stack, &mut output);
        output.cycles.into_iter().next()
    }

    /// Replace include directives, recursing into component content with the
    /// chain of enclosing component names in `stack`.
    fn resolve_includes<L>(
        &self,
        text: &str,
        components: &L,
        stack: &mut Vec<String>,
        output: &mut RenderOutput,
    ) -> String
    where
        L: ComponentLookup + ?Sized,
    {
        let mut result = String::with_capacity(text.len());
        let mut cursor = 0;

        for caps in INCLUDE_RE.captures_iter(text) {
            let whole = caps.get(0).expect("group 0 always present");
            let name = &caps[1];
            result.push_str(&text[cursor..whole.start()]);
            cursor = whole.end();

            if stack.iter().any(|s| s == name) {
                let mut path = stack.clone();
                path.push(name.to_string());
                result.push_str(&cycle_marker(&path));
                output.cycles.push(path);
                continue;
            }
            if stack.len() >= self.max_include_depth {
                result.push_str(&depth_marker(name));
                output.depth_exceeded.push(name.to_string());
                continue;
            }
            match components.component_content(name) {
                Some(content) => {
                    output.included.push(name.to_string());
                    stack.push(name.to_string());
                    let expanded = self.resolve_includes(content, components, stack, output);
                    stack.pop();
                    result.push_str(&expanded);
                }
                None => {
                    result.push_str(&not_found_marker(name));
                    output.missing.push(name.to_string());
                }
            }
        }

        result.push_str(&text[cursor..]);
        result
    }
}

// ---------------------------------------------------------------------------
// Conditionals
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ControlKind {
    If(String),
    Else,
    EndIf,
}

#[derive(Debug)]
struct ControlTag {
    start: usize,
    end: usize,
    kind: ControlKind,
}

/// Else/endif partners of a balanced `if` tag, as indices into the tag list.
#[derive(Debug, Clone, Copy)]
struct Block {
    else_idx: Option<usize>,
    endif_idx: usize,
}

/// Keep or drop `{{ if }}` sections. Unbalanced tags stay as literal text.
fn apply_conditionals(text: &str, params: &ParamMap) -> String {
    let tags: Vec<ControlTag> = CONTROL_RE
        .captures_iter(text)
        .map(|c| {
            let whole = c.get(0).expect("group 0 always present");
            let kind = if let Some(param) = c.get(1) {
                ControlKind::If(param.as_str().to_string())
            } else if c.get(2).is_some() {
                ControlKind::Else
            } else {
                ControlKind::EndIf
            };
            ControlTag {
                start: whole.start(),
                end: whole.end(),
                kind,
            }
        })
        .collect();

    if tags.is_empty() {
        return text.to_string();
    }

    // Pair tags with a stack of open `if` indices and their else (if any).
    let mut blocks: Vec<Option<Block>> = vec![None; tags.len()];
    let mut open: Vec<(usize, Option<usize>)> = Vec::new();
    for (idx, tag) in tags.iter().enumerate() {
        match tag.kind {
            ControlKind::If(_) => open.push((idx, None)),
            ControlKind::Else => {
                if let Some(top) = open.last_mut() {
                    if top.1.is_none() {
                        top.1 = Some(idx);
                    }
                }
            }
            ControlKind::EndIf => {
                if let Some((if_idx, else_idx)) = open.pop() {
                    blocks[if_idx] = Some(Block {
                        else_idx,
                        endif_idx: idx,
                    });
                }
            }
        }
    }

    let mut out = String::with_capacity(text.len());
    eval_range(text, &tags, &blocks, 0, tags.len(), 0, text.len(), params, &mut out);
    out
}

/// Emit `text[start..end]`, expanding balanced blocks whose `if` tag index is
/// in `lo..hi`.
#[allow(clippy::too_many_arguments)]
fn eval_range(
    text: &str,
    tags: &[ControlTag],
    blocks: &[Option<Block>],
    lo: usize,
    hi: usize,
    start: usize,
    end: usize,
    params: &ParamMap,
    out: &mut String,
) {
    let mut cursor = start;
    let mut idx = lo;
    while idx < hi {
        let (Some(block), ControlKind::If(param)) = (blocks[idx], &tags[idx].kind) else {
            idx += 1;
            continue;
        };

        out.push_str(&text[cursor..tags[idx].start]);

        if is_truthy(params, param) {
            let branch_end = block.else_idx.unwrap_or(block.endif_idx);
            eval_range(
                text,
                tags,
                blocks,
                idx + 1,
                branch_end,
                tags[idx].end,
                tags[branch_end].start,
                params,
                out,
            );
        } else if let Some(else_idx) = block.else_idx {
            eval_range(
                text,
                tags,
                blocks,
                else_idx + 1,
                block.endif_idx,
                tags[else_idx].end,
                tags[block.endif_idx].start,
                params,
                out,
            );
        }

        cursor = tags[block.endif_idx].end;
        idx = block.endif_idx + 1;
    }
    out.push_str(&text[cursor..end]);
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Resolve a parameter name, trying the literal key before a dotted path.
fn lookup<'a>(params: &'a ParamMap, name: &str) -> Option<&'a Value> {
    if let Some(value) = params.get(name) {
        return Some(value);
    }
    let mut segments = name.split('.');
    let root = params.get(segments.next()?)?;
    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() {
        return None;
    }
    root.lookup_path(&rest)
}

fn is_truthy(params: &ParamMap, name: &str) -> bool {
    lookup(params, name).is_some_and(Value::is_truthy)
}

fn substitute_placeholders(text: &str, params: &ParamMap, unresolved: &mut Vec<String>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            if RESERVED_WORDS.contains(&name) {
                return caps[0].to_string();
            }
            match lookup(params, name) {
                Some(value) => value.to_string(),
                None => {
                    unresolved.push(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
