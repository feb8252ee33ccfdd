#![allow(dead_code)]

use std::sync::Arc;

use promptline_core::parameter::{ParameterDef, ParameterType};
use promptline_core::template::TemplateFields;
use promptline_core::value::{ParamMap, Value};
use promptline_db::models::component::CreateComponent;
use promptline_db::models::template::Template;
use promptline_engine::store::{ComponentStore, MemoryStore};
use promptline_engine::{CreateTemplateInput, CreateVersionInput, Engine, EngineConfig};

pub const AUTHOR: &str = "alice";

/// Build a test `EngineConfig` with the cache disabled.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        cache_ttl: std::time::Duration::ZERO,
        ..EngineConfig::default()
    }
}

/// Build an engine over a fresh in-memory store, returning the store too so
/// tests can inspect what it holds.
pub fn build_engine() -> (Engine, Arc<MemoryStore>) {
    build_engine_with(test_config())
}

pub fn build_engine_with(config: EngineConfig) -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), &config);
    (engine, store)
}

pub fn params(pairs: &[(&str, Value)]) -> ParamMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn string_param(name: &str, required: bool, default: Option<&str>) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        description: format!("The {name}"),
        required,
        param_type: ParameterType::String,
        default_value: default.map(Value::from),
    }
}

pub async fn create_template(engine: &Engine, name: &str, content: &str) -> Template {
    engine
        .versions
        .create_template(CreateTemplateInput {
            name: name.to_string(),
            fields: TemplateFields::new(content),
            author: AUTHOR.to_string(),
        })
        .await
        .unwrap()
}

pub async fn add_version(engine: &Engine, name: &str, content: &str) -> Template {
    engine
        .versions
        .create_version(CreateVersionInput {
            template_name: name.to_string(),
            fields: TemplateFields::new(content),
            author: AUTHOR.to_string(),
            notes: None,
            expected_version: None,
        })
        .await
        .unwrap()
}

pub async fn put_component(store: &MemoryStore, name: &str, content: &str) {
    store
        .put_component(&CreateComponent::new(name, content))
        .await
        .unwrap();
}

/// Versions of `name` that are currently active.
pub async fn active_versions(engine: &Engine, name: &str) -> Vec<i32> {
    engine
        .versions
        .list_versions(name)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.is_active)
        .map(|t| t.version)
        .collect()
}
