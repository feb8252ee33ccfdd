//! Versioning, rendering, and comparison of prompt templates.
//!
//! [`Engine`] wires the three services over one shared [`store::Store`]:
//! [`VersionManager`] for lifecycle writes, [`Renderer`] for the template
//! mini-language, and [`DiffService`] for version comparison.

pub mod config;
pub mod diff_service;
pub mod error;
pub mod renderer;
pub mod store;
pub mod version_manager;

use std::sync::Arc;

pub use config::EngineConfig;
pub use diff_service::{Comparison, DiffService};
pub use error::{EngineError, EngineResult};
pub use renderer::{ActiveRender, Renderer};
pub use version_manager::{CreateTemplateInput, CreateVersionInput, DeletedFamily, VersionManager};

use store::{CachedStore, PgStore, Store};

/// The engine's services sharing one store.
#[derive(Clone)]
pub struct Engine {
    pub versions: VersionManager,
    pub renderer: Renderer,
    pub diffs: DiffService,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self {
            versions: VersionManager::new(Arc::clone(&store), config),
            renderer: Renderer::new(Arc::clone(&store), config),
            diffs: DiffService::new(store, config),
        }
    }

    /// Build an engine over Postgres with the configured read cache.
    pub fn postgres(pool: promptline_db::DbPool, config: &EngineConfig) -> Self {
        let store = CachedStore::new(PgStore::new(pool), config.cache_ttl);
        Self::new(Arc::new(store), config)
    }
}
