//! Per-run import context
//!
//! Carries the tenant and the import-id → persisted-id map through one run.
//! The map is seeded from the tenant's stored divisions and extended after
//! every committed row, so later rows can resolve parents committed earlier
//! in the same run.

use std::collections::HashMap;
use uuid::Uuid;

use crate::database::{DatabaseResult, DivisionStore};

/// Import-id map for a single tenant and a single run
#[derive(Debug, Clone)]
pub struct ImportContext {
    tenant_id: Uuid,
    ids: HashMap<String, Uuid>,
}

impl ImportContext {
    /// Create an empty context for a tenant
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            ids: HashMap::new(),
        }
    }

    /// Create a context seeded with the tenant's stored divisions
    pub async fn preload<S: DivisionStore + ?Sized>(
        store: &S,
        tenant_id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut context = Self::new(tenant_id);
        for (import_id, id) in store.import_id_map(tenant_id).await? {
            context.record(import_id, id);
        }
        tracing::info!(
            "Preloaded {} existing divisions for tenant {}",
            context.len(),
            tenant_id
        );
        Ok(context)
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Record a committed division
    pub fn record(&mut self, import_id: impl Into<String>, id: Uuid) {
        self.ids.insert(import_id.into(), id);
    }

    /// Persisted id of an import id, if known
    pub fn resolve(&self, import_id: &str) -> Option<Uuid> {
        self.ids.get(import_id).copied()
    }

    pub fn contains(&self, import_id: &str) -> bool {
        self.ids.contains_key(import_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
