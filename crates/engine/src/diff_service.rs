//! Version comparison.

use std::sync::Arc;
use std::time::Duration;

use promptline_core::diff::{compare, DiffPayload};
use promptline_core::diff_format::{project, DiffFormat, RenderedDiff};
use promptline_core::types::DbId;

use crate::config::EngineConfig;
use crate::error::{with_timeout, EngineResult};
use crate::store::Store;

/// A computed diff and one projection of it.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub payload: DiffPayload,
    pub document: RenderedDiff,
}

impl Comparison {
    /// Suggested download name for the document, e.g. `greeting_v1_v2.html`.
    pub fn file_name(&self) -> String {
        self.document.file_name(&self.payload)
    }
}

#[derive(Clone)]
pub struct DiffService {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl DiffService {
    pub fn new(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout,
        }
    }

    /// Compare versions `v1` (old) and `v2` (new) of the family that
    /// `template_id` belongs to.
    pub async fn compare_versions(
        &self,
        template_id: DbId,
        v1: i32,
        v2: i32,
        format: DiffFormat,
    ) -> EngineResult<Comparison> {
        let anchor =
            with_timeout("get_template", self.timeout, self.store.get_template(template_id))
                .await?;
        let old = with_timeout(
            "get_version",
            self.timeout,
            self.store.get_version(&anchor.name, v1),
        )
        .await?;
        let new = with_timeout(
            "get_version",
            self.timeout,
            self.store.get_version(&anchor.name, v2),
        )
        .await?;

        let payload = compare(&anchor.name, &old.snapshot(), &new.snapshot());
        let document = project(&payload, format)?;

        tracing::debug!(
            template_id,
            name = %anchor.name,
            from = v1,
            to = v2,
            format = format.as_str(),
            total_changes = payload.stats.total_changes,
            "Compared template versions"
        );
        Ok(Comparison { payload, document })
    }
}
