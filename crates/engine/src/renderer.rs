//! Async renderer: loads the components a piece of content needs, runs the
//! pure renderer, and records usage.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use promptline_core::error::CoreError;
use promptline_core::parameter::{apply_defaults, missing_required};
use promptline_core::render::{extract_directives, RenderOutput, TemplateRenderer};
use promptline_core::types::DbId;
use promptline_core::value::ParamMap;
use promptline_db::models::template::Template;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{with_timeout, EngineError, EngineResult};
use crate::store::Store;

/// The active version of a template rendered by name.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRender {
    pub template: Template,
    pub output: RenderOutput,
}

/// Components loaded for one render.
#[derive(Debug, Default)]
struct Prefetched {
    content: BTreeMap<String, String>,
    ids: BTreeMap<String, DbId>,
}

#[derive(Clone)]
pub struct Renderer {
    store: Arc<dyn Store>,
    renderer: TemplateRenderer,
    timeout: Duration,
}

impl Renderer {
    pub fn new(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self {
            store,
            renderer: TemplateRenderer::new(config.max_include_depth),
            timeout: config.store_timeout,
        }
    }

    /// Render `content` to text. Never fails: missing components, cycles, and
    /// undefined parameters are reported inline.
    pub async fn render(&self, content: &str, params: &ParamMap) -> String {
        self.render_output(content, params).await.text
    }

    /// Render `content`, returning the text with every soft failure listed.
    pub async fn render_output(&self, content: &str, params: &ParamMap) -> RenderOutput {
        let components = self.prefetch(content).await;
        let output = self.renderer.render(content, params, &components.content);
        self.record_component_usage(&components, &output).await;
        tracing::debug!(
            included = output.included.len(),
            missing = output.missing.len(),
            unresolved = output.unresolved.len(),
            "Rendered content"
        );
        output
    }

    /// Render `content`, failing with `ComponentCycle` if an include chain
    /// loops. Usage is only recorded for successful renders.
    pub async fn render_checked(
        &self,
        content: &str,
        params: &ParamMap,
    ) -> EngineResult<RenderOutput> {
        let components = self.prefetch(content).await;
        let output = self
            .renderer
            .render_checked(content, params, &components.content)?;
        self.record_component_usage(&components, &output).await;
        Ok(output)
    }

    /// Render the active version of `name`, filling absent parameters from
    /// their declared defaults, and record the render against that version.
    pub async fn render_active(&self, name: &str, params: &ParamMap) -> EngineResult<ActiveRender> {
        let template =
            with_timeout("get_active", self.timeout, self.store.get_active(name)).await?;
        let merged = apply_defaults(&template.parameters, params);
        let output = self.render_output(&template.content, &merged).await;
        self.record_template_usage(&template, &output).await;

        tracing::debug!(
            template_id = template.id,
            name,
            version = template.version,
            "Rendered active template"
        );
        Ok(ActiveRender { template, output })
    }

    /// Like [`render_active`](Self::render_active), but refuses to render when
    /// a required parameter has neither a value nor a default, and fails on
    /// include cycles.
    pub async fn render_active_strict(
        &self,
        name: &str,
        params: &ParamMap,
    ) -> EngineResult<ActiveRender> {
        let template =
            with_timeout("get_active", self.timeout, self.store.get_active(name)).await?;
        let missing = missing_required(&template.parameters, params);
        if !missing.is_empty() {
            return Err(CoreError::validation(
                "parameters",
                format!("Missing required parameters: {}", missing.join(", ")),
            )
            .into());
        }
        let merged = apply_defaults(&template.parameters, params);
        let output = self.render_checked(&template.content, &merged).await?;
        self.record_template_usage(&template, &output).await;
        Ok(ActiveRender { template, output })
    }

    /// Required parameters of the active version of `name` that `params`
    /// leaves without a value or default.
    pub async fn check_required_parameters(
        &self,
        name: &str,
        params: &ParamMap,
    ) -> EngineResult<Vec<String>> {
        let template =
            with_timeout("get_active", self.timeout, self.store.get_active(name)).await?;
        Ok(missing_required(&template.parameters, params))
    }

    /// Load active components breadth-first from the includes in `content`,
    /// down to the include depth limit.
    async fn prefetch(&self, content: &str) -> Prefetched {
        let mut prefetched = Prefetched::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = extract_directives(content)
            .includes
            .into_iter()
            .map(|name| (name, 1))
            .collect();

        while let Some((name, depth)) = queue.pop_front() {
            if depth > self.renderer.max_include_depth() || !seen.insert(name.clone()) {
                continue;
            }
            let result = with_timeout(
                "get_active_component",
                self.timeout,
                self.store.get_active_component(&name),
            )
            .await;
            match result {
                Ok(component) => {
                    for nested in extract_directives(&component.content).includes {
                        queue.push_back((nested, depth + 1));
                    }
                    prefetched.ids.insert(name.clone(), component.id);
                    prefetched.content.insert(name, component.content);
                }
                Err(EngineError::Core(CoreError::NotFound { .. })) => {}
                Err(err) => {
                    // Rendered as not found.
                    tracing::warn!(component = %name, error = %err, "Failed to load component");
                }
            }
        }
        prefetched
    }

    async fn record_template_usage(&self, template: &Template, output: &RenderOutput) {
        let unresolved = i32::try_from(output.unresolved.len()).unwrap_or(i32::MAX);
        let result = with_timeout(
            "record_template_usage",
            self.timeout,
            self.store.record_template_usage(template.id, unresolved),
        )
        .await;
        if let Err(err) = result {
            tracing::warn!(template_id = template.id, error = %err, "Failed to record template usage");
        }
    }

    /// Increment usage once per substituted include. Failures are logged and
    /// never fail the render.
    async fn record_component_usage(&self, components: &Prefetched, output: &RenderOutput) {
        for name in &output.included {
            let Some(&id) = components.ids.get(name) else {
                continue;
            };
            let result = with_timeout(
                "increment_component_usage",
                self.timeout,
                self.store.increment_component_usage(id),
            )
            .await;
            if let Err(err) = result {
                tracing::warn!(component = %name, error = %err, "Failed to increment component usage");
            }
        }
    }
}
