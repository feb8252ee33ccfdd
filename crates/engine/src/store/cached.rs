//! Read-through cache in front of any store.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use promptline_core::cache::TtlCache;
use promptline_core::parameter::ParameterDef;
use promptline_core::types::DbId;
use promptline_db::models::component::{Component, CreateComponent};
use promptline_db::models::template::{CreateTemplateVersion, Template};
use promptline_db::models::version_log::{CreateVersionLogEntry, VersionLogEntry};

use super::{ComponentStore, TemplateStore};
use crate::error::EngineResult;

/// Caches active template versions and active components by name.
///
/// Every write that can change what `get_active` or `get_active_component`
/// returns for a name holds a [`WriteGuard`] for its whole duration. Loads
/// that overlap a write, or started before one, are returned to the caller
/// but never cached. The guard ends the write on drop, so failed and
/// cancelled writes invalidate too. Usage counters on a cached component are
/// not refreshed and may lag until the entry expires.
pub struct CachedStore<S> {
    inner: S,
    active_templates: Mutex<TtlCache<String, Template>>,
    active_components: Mutex<TtlCache<String, Component>>,
}

impl<S> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            active_templates: Mutex::new(TtlCache::new(ttl)),
            active_components: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn lock<V>(cache: &Mutex<TtlCache<String, V>>) -> MutexGuard<'_, TtlCache<String, V>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-through lookup: serve a fresh hit, else load and cache the value
/// unless a write on `name` overlapped the load.
async fn read_through<V, F>(
    cache: &Mutex<TtlCache<String, V>>,
    name: &str,
    load: F,
) -> EngineResult<V>
where
    V: Clone,
    F: std::future::Future<Output = EngineResult<V>>,
{
    let key = name.to_string();
    let ticket = {
        let mut guard = lock(cache);
        if let Some(hit) = guard.get(&key) {
            return Ok(hit);
        }
        guard.ticket()
    };
    let value = load.await?;
    if !lock(cache).insert_if_current(key, value.clone(), ticket) {
        tracing::debug!(name, "Skipped caching a value loaded across a write");
    }
    Ok(value)
}

/// Marks a write on one cached name for as long as it lives.
struct WriteGuard<'a, V: Clone> {
    cache: &'a Mutex<TtlCache<String, V>>,
    key: String,
}

impl<'a, V: Clone> WriteGuard<'a, V> {
    fn begin(cache: &'a Mutex<TtlCache<String, V>>, name: &str) -> Self {
        let key = name.to_string();
        lock(cache).begin_write(&key);
        Self { cache, key }
    }
}

impl<V: Clone> Drop for WriteGuard<'_, V> {
    fn drop(&mut self) {
        lock(self.cache).end_write(&self.key);
        tracing::debug!(name = %self.key, "Invalidated cached entry after write");
    }
}

#[async_trait]
impl<S: TemplateStore> TemplateStore for CachedStore<S> {
    async fn get_template(&self, id: DbId) -> EngineResult<Template> {
        self.inner.get_template(id).await
    }

    async fn get_version(&self, name: &str, version: i32) -> EngineResult<Template> {
        self.inner.get_version(name, version).await
    }

    async fn get_active(&self, name: &str) -> EngineResult<Template> {
        read_through(&self.active_templates, name, self.inner.get_active(name)).await
    }

    async fn list_versions(&self, name: &str) -> EngineResult<Vec<Template>> {
        self.inner.list_versions(name).await
    }

    async fn max_version(&self, name: &str) -> EngineResult<i32> {
        self.inner.max_version(name).await
    }

    async fn list_parameters(&self, template_id: DbId) -> EngineResult<Vec<ParameterDef>> {
        self.inner.list_parameters(template_id).await
    }

    async fn list_log(&self, name: &str) -> EngineResult<Vec<VersionLogEntry>> {
        self.inner.list_log(name).await
    }

    async fn insert_version(
        &self,
        new: &CreateTemplateVersion,
        log_entry: &CreateVersionLogEntry,
    ) -> EngineResult<Template> {
        let _write = WriteGuard::begin(&self.active_templates, &new.name);
        self.inner.insert_version(new, log_entry).await
    }

    async fn swap_active(
        &self,
        target_id: DbId,
        author: &str,
        notes: Option<&str>,
    ) -> EngineResult<Template> {
        let name = self.inner.get_template(target_id).await?.name;
        let _write = WriteGuard::begin(&self.active_templates, &name);
        self.inner.swap_active(target_id, author, notes).await
    }

    async fn delete_family(&self, name: &str) -> EngineResult<u64> {
        let _write = WriteGuard::begin(&self.active_templates, name);
        self.inner.delete_family(name).await
    }

    async fn record_template_usage(
        &self,
        template_id: DbId,
        unresolved_count: i32,
    ) -> EngineResult<()> {
        self.inner
            .record_template_usage(template_id, unresolved_count)
            .await
    }
}

#[async_trait]
impl<S: ComponentStore> ComponentStore for CachedStore<S> {
    async fn get_active_component(&self, name: &str) -> EngineResult<Component> {
        read_through(
            &self.active_components,
            name,
            self.inner.get_active_component(name),
        )
        .await
    }

    async fn get_component_version(&self, name: &str, version: i32) -> EngineResult<Component> {
        self.inner.get_component_version(name, version).await
    }

    async fn list_active_components(&self) -> EngineResult<Vec<Component>> {
        self.inner.list_active_components().await
    }

    async fn put_component(&self, new: &CreateComponent) -> EngineResult<Component> {
        let _write = WriteGuard::begin(&self.active_components, &new.name);
        self.inner.put_component(new).await
    }

    async fn deactivate_component(&self, name: &str) -> EngineResult<Component> {
        let _write = WriteGuard::begin(&self.active_components, name);
        self.inner.deactivate_component(name).await
    }

    async fn increment_component_usage(&self, id: DbId) -> EngineResult<()> {
        self.inner.increment_component_usage(id).await
    }
}
