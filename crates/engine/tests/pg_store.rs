//! The engine over `PgStore` against a real database.
//!
//! Run with `DATABASE_URL` set: `cargo test -p promptline-engine -- --ignored`.

use std::sync::Arc;

use assert_matches::assert_matches;
use promptline_core::error::CoreError;
use promptline_core::parameter::{ParameterDef, ParameterType};
use promptline_core::template::TemplateFields;
use promptline_core::value::{ParamMap, Value};
use promptline_db::models::component::CreateComponent;
use promptline_db::repositories::{ParameterRepo, TemplateUsageRepo, VersionLogRepo};
use promptline_engine::store::{ComponentStore, PgStore};
use promptline_engine::{CreateTemplateInput, CreateVersionInput, Engine, EngineConfig, EngineError};
use sqlx::PgPool;

fn engine(pool: &PgPool) -> Engine {
    Engine::new(Arc::new(PgStore::new(pool.clone())), &EngineConfig::default())
}

fn fields(content: &str) -> TemplateFields {
    TemplateFields::new(content).with_parameters(vec![ParameterDef {
        name: "name".into(),
        description: "Who to greet".into(),
        required: false,
        param_type: ParameterType::String,
        default_value: Some(Value::from("there")),
    }])
}

async fn seed(engine: &Engine) -> (i64, i64) {
    let v1 = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: fields("Hello {{name}}"),
            author: "alice".into(),
        })
        .await
        .unwrap();
    let v2 = engine
        .versions
        .create_version(CreateVersionInput {
            template_name: "greeting".into(),
            fields: fields("Hi {{name}}!"),
            author: "alice".into(),
            notes: None,
            expected_version: Some(2),
        })
        .await
        .unwrap();
    (v1.id, v2.id)
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore]
async fn test_activation_keeps_single_active_version(pool: PgPool) {
    let engine = engine(&pool);
    let (v1, v2) = seed(&engine).await;

    let activations = [v2, v1, v2].map(|id| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.versions.activate_version(id, "bob", None).await })
    });
    for result in futures::future::join_all(activations).await {
        result.unwrap().unwrap();
    }

    let active: Vec<i32> = engine
        .versions
        .list_versions("greeting")
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.is_active)
        .map(|t| t.version)
        .collect();
    assert_eq!(active.len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore]
async fn test_stale_expected_version_is_rejected(pool: PgPool) {
    let engine = engine(&pool);
    seed(&engine).await;

    let err = engine
        .versions
        .create_version(CreateVersionInput {
            template_name: "greeting".into(),
            fields: fields("late"),
            author: "alice".into(),
            notes: None,
            expected_version: Some(2),
        })
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Core(CoreError::InvalidVersionSequence { expected: 2, actual: 3, .. })
    );
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore]
async fn test_render_and_compare(pool: PgPool) {
    let engine = engine(&pool);
    let store = PgStore::new(pool.clone());
    store
        .put_component(&CreateComponent::new("sign_off", "Cheers"))
        .await
        .unwrap();
    let (v1, v2) = seed(&engine).await;
    engine.versions.activate_version(v2, "bob", None).await.unwrap();

    let rendered = engine
        .renderer
        .render_active("greeting", &ParamMap::new())
        .await
        .unwrap();
    assert_eq!(rendered.output.text, "Hi there!");

    let text = engine
        .renderer
        .render("{{ include sign_off }}", &ParamMap::new())
        .await;
    assert_eq!(text, "Cheers");
    assert_eq!(
        store.get_active_component("sign_off").await.unwrap().usage_count,
        1
    );

    let comparison = engine
        .diffs
        .compare_versions(v1, 1, 2, promptline_core::diff_format::DiffFormat::Html)
        .await
        .unwrap();
    assert_eq!(comparison.payload.stats.lines_added, 1);
    assert!(comparison.payload.parameters.modified.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore]
async fn test_delete_family_cascades(pool: PgPool) {
    let engine = engine(&pool);
    let (v1, _) = seed(&engine).await;
    engine
        .renderer
        .render_active("greeting", &ParamMap::new())
        .await
        .unwrap();

    let deleted = engine.versions.delete_family(v1).await.unwrap();

    assert_eq!(deleted.deleted_versions, 2);
    assert!(engine.versions.list_versions("greeting").await.unwrap().is_empty());
    assert_eq!(ParameterRepo::count_for_name(&pool, "greeting").await.unwrap(), 0);
    assert_eq!(TemplateUsageRepo::count_for_name(&pool, "greeting").await.unwrap(), 0);
    assert!(VersionLogRepo::list_for_name(&pool, "greeting")
        .await
        .unwrap()
        .is_empty());
    let orphans: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM template_usage")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans.0, 0);
}
