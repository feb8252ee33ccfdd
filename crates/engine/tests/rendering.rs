//! Rendering through the engine: include resolution against the component
//! store, conditionals, placeholders, and usage accounting.

mod common;

use assert_matches::assert_matches;
use common::{
    build_engine, build_engine_with, params, put_component, string_param, test_config, AUTHOR,
};
use promptline_core::error::CoreError;
use promptline_core::template::TemplateFields;
use promptline_core::value::{ParamMap, Value};
use promptline_db::models::component::CreateComponent;
use promptline_engine::store::{ComponentStore, TemplateStore};
use promptline_engine::{CreateTemplateInput, EngineConfig, EngineError};

// ---------------------------------------------------------------------------
// Placeholders and conditionals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn substitutes_placeholders() {
    let (engine, _) = build_engine();

    let text = engine
        .renderer
        .render("Hello {{name}}", &params(&[("name", Value::from("Bob"))]))
        .await;

    assert_eq!(text, "Hello Bob");
}

#[tokio::test]
async fn undefined_placeholders_are_left_verbatim() {
    let (engine, _) = build_engine();

    let output = engine
        .renderer
        .render_output("Hello {{ name }}, {{greeting}}", &params(&[("name", Value::from("Bob"))]))
        .await;

    assert_eq!(output.text, "Hello Bob, {{greeting}}");
    assert_eq!(output.unresolved, vec!["greeting".to_string()]);
}

#[tokio::test]
async fn conditional_sections_follow_truthiness() {
    let (engine, _) = build_engine();
    let content = "A{{ if vip }}B{{ endif }}C";

    let vip = engine
        .renderer
        .render(content, &params(&[("vip", Value::from(true))]))
        .await;
    let not_vip = engine
        .renderer
        .render(content, &params(&[("vip", Value::from(false))]))
        .await;
    let absent = engine.renderer.render(content, &ParamMap::new()).await;

    assert_eq!(vip, "ABC");
    assert_eq!(not_vip, "AC");
    assert_eq!(absent, "AC");
}

// ---------------------------------------------------------------------------
// Includes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn include_resolves_active_component() {
    let (engine, store) = build_engine();
    put_component(&store, "greeting", "Hi!").await;

    let text = engine
        .renderer
        .render("{{ include greeting }}", &ParamMap::new())
        .await;

    assert_eq!(text, "Hi!");
}

#[tokio::test]
async fn missing_component_renders_marker() {
    let (engine, _) = build_engine();

    let output = engine
        .renderer
        .render_output("{{ include greeting }}", &ParamMap::new())
        .await;

    assert_eq!(output.text, "[Component not found: greeting]");
    assert_eq!(output.missing, vec!["greeting".to_string()]);
}

#[tokio::test]
async fn deactivated_component_renders_marker() {
    let (engine, store) = build_engine();
    put_component(&store, "greeting", "Hi!").await;
    store.deactivate_component("greeting").await.unwrap();

    let text = engine
        .renderer
        .render("{{ include greeting }}", &ParamMap::new())
        .await;

    assert_eq!(text, "[Component not found: greeting]");
}

#[tokio::test]
async fn included_content_sees_parameters() {
    let (engine, store) = build_engine();
    put_component(
        &store,
        "sign_off",
        "{{ if formal }}Regards{{ else }}Cheers{{ endif }}, {{author}}",
    )
    .await;

    let text = engine
        .renderer
        .render(
            "Thanks!\n{{ include sign_off }}",
            &params(&[("formal", Value::from(true)), ("author", Value::from("Ana"))]),
        )
        .await;

    assert_eq!(text, "Thanks!\nRegards, Ana");
}

#[tokio::test]
async fn nested_includes_resolve_recursively() {
    let (engine, store) = build_engine();
    put_component(&store, "inner", "core").await;
    put_component(&store, "outer", "[{{ include inner }}]").await;

    let output = engine
        .renderer
        .render_output("<{{ include outer }}>", &ParamMap::new())
        .await;

    assert_eq!(output.text, "<[core]>");
    assert_eq!(output.included, vec!["outer".to_string(), "inner".to_string()]);
}

#[tokio::test]
async fn include_depth_is_bounded() {
    let (engine, store) = build_engine_with(EngineConfig {
        max_include_depth: 2,
        ..test_config()
    });
    put_component(&store, "c", "C").await;
    put_component(&store, "b", "B{{ include c }}").await;
    put_component(&store, "a", "A{{ include b }}").await;

    let output = engine
        .renderer
        .render_output("{{ include a }}", &ParamMap::new())
        .await;

    assert_eq!(output.text, "AB[Component depth limit exceeded: c]");
    assert_eq!(output.depth_exceeded, vec!["c".to_string()]);
}

#[tokio::test]
async fn component_writes_reject_cycles() {
    let (_, store) = build_engine();
    put_component(&store, "a", "A{{ include b }}").await;
    put_component(&store, "b", "B").await;

    let err = store
        .put_component(&CreateComponent::new("b", "B{{ include a }}"))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Core(CoreError::ComponentCycle { path })
            if path == vec!["b".to_string(), "a".to_string(), "b".to_string()]
    );
    assert_eq!(store.get_active_component("b").await.unwrap().content, "B");
}

#[tokio::test]
async fn put_component_replaces_active_entry() {
    let (engine, store) = build_engine();
    put_component(&store, "greeting", "Hi!").await;
    put_component(&store, "greeting", "Hello!").await;

    let active = store.get_active_component("greeting").await.unwrap();
    assert_eq!(active.version, 2);
    assert!(!store.get_component_version("greeting", 1).await.unwrap().is_active);
    assert_eq!(store.list_active_components().await.unwrap().len(), 1);

    let text = engine
        .renderer
        .render("{{ include greeting }}", &ParamMap::new())
        .await;
    assert_eq!(text, "Hello!");
}

// ---------------------------------------------------------------------------
// Usage accounting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_substitution_increments_usage() {
    let (engine, store) = build_engine();
    put_component(&store, "greeting", "Hi!").await;

    engine
        .renderer
        .render("{{ include greeting }} {{ include greeting }}", &ParamMap::new())
        .await;

    let component = store.get_active_component("greeting").await.unwrap();
    assert_eq!(component.usage_count, 2);
}

#[tokio::test]
async fn used_components_cannot_be_deactivated() {
    let (engine, store) = build_engine();
    put_component(&store, "greeting", "Hi!").await;
    engine
        .renderer
        .render("{{ include greeting }}", &ParamMap::new())
        .await;

    let err = store.deactivate_component("greeting").await.unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::Conflict(_)));
    assert!(store.get_active_component("greeting").await.unwrap().is_active);
}

// ---------------------------------------------------------------------------
// Strict rendering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn render_checked_resolves_and_counts_usage() {
    let (engine, store) = build_engine();
    put_component(&store, "second", "end").await;
    put_component(&store, "first", "{{ include second }}").await;

    let output = engine
        .renderer
        .render_checked("{{ include first }}", &ParamMap::new())
        .await
        .unwrap();

    assert_eq!(output.text, "end");
    assert!(output.is_complete());
    assert_eq!(store.get_active_component("first").await.unwrap().usage_count, 1);
    assert_eq!(store.get_active_component("second").await.unwrap().usage_count, 1);
}

// ---------------------------------------------------------------------------
// Rendering stored templates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn render_active_applies_defaults_and_records_usage() {
    let (engine, store) = build_engine();
    engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hello {{name}}, welcome to {{place}}")
                .with_parameters(vec![
                    string_param("name", true, None),
                    string_param("place", false, Some("Promptline")),
                ]),
            author: AUTHOR.into(),
        })
        .await
        .unwrap();

    let rendered = engine
        .renderer
        .render_active("greeting", &params(&[("name", Value::from("Bob"))]))
        .await
        .unwrap();

    assert_eq!(rendered.output.text, "Hello Bob, welcome to Promptline");
    assert_eq!(rendered.template.version, 1);
    assert_eq!(store.family_counts("greeting").await.usage_records, 1);
}

#[tokio::test]
async fn strict_render_reports_missing_required_parameters() {
    let (engine, _) = build_engine();
    engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hello {{name}}")
                .with_parameters(vec![string_param("name", true, None)]),
            author: AUTHOR.into(),
        })
        .await
        .unwrap();

    let missing = engine
        .renderer
        .check_required_parameters("greeting", &ParamMap::new())
        .await
        .unwrap();
    assert_eq!(missing, vec!["name".to_string()]);

    let err = engine
        .renderer
        .render_active_strict("greeting", &ParamMap::new())
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation { field, .. }) if field == "parameters");

    let ok = engine
        .renderer
        .render_active_strict("greeting", &params(&[("name", Value::from("Bob"))]))
        .await
        .unwrap();
    assert_eq!(ok.output.text, "Hello Bob");
}

#[tokio::test]
async fn render_active_of_unknown_template_is_not_found() {
    let (engine, store) = build_engine();

    let err = engine
        .renderer
        .render_active("missing", &ParamMap::new())
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
    assert!(store.list_versions("missing").await.unwrap().is_empty());
}
