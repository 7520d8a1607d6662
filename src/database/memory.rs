//! In-memory database backend
//!
//! Keeps divisions in a mutex-guarded map. Each upsert validates and applies
//! its write under a single lock acquisition, so a rejected write leaves the
//! store untouched. The backend also records the commit order, which tests use
//! to check that parents are committed before their children.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult, DivisionStore};
use crate::models::{
    BoundingBox, BoxRelation, DivisionNode, DivisionRecord, UpsertOperation, UpsertOutcome,
};

#[derive(Debug, Default)]
struct MemoryState {
    divisions: HashMap<Uuid, DivisionNode>,
    commit_log: Vec<(Uuid, String)>,
}

impl MemoryState {
    /// Whether `ancestor` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, tenant_id: Uuid, ancestor: Uuid, node: Uuid) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self
                .divisions
                .get(&id)
                .filter(|d| d.tenant_id == tenant_id)
                .and_then(|d| d.parent_id);
        }
        false
    }

    /// Set every descendant of `root` to `parent.level + 1`
    fn relevel_descendants(&mut self, tenant_id: Uuid, root: Uuid, level: i64) -> usize {
        let now = Utc::now();
        let mut frontier = vec![(root, level)];
        let mut relevelled = 0;

        while let Some((parent_id, parent_level)) = frontier.pop() {
            for child in self.divisions.values_mut().filter(|d| {
                d.tenant_id == tenant_id
                    && d.parent_id == Some(parent_id)
                    && d.level != parent_level + 1
            }) {
                child.level = parent_level + 1;
                child.updated_at = now;
                frontier.push((child.id, child.level));
                relevelled += 1;
            }
        }

        relevelled
    }
}

/// In-memory division store
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Import ids of the tenant's committed upserts, in commit order
    pub fn commit_log(&self, tenant_id: Uuid) -> Vec<String> {
        self.lock()
            .map(|state| {
                state
                    .commit_log
                    .iter()
                    .filter(|(tenant, _)| *tenant == tenant_id)
                    .map(|(_, import_id)| import_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn sorted(mut nodes: Vec<DivisionNode>) -> Vec<DivisionNode> {
        nodes.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| a.import_id.cmp(&b.import_id))
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }
}

#[async_trait(?Send)]
impl DivisionStore for InMemoryBackend {
    async fn initialize(&self) -> DatabaseResult<()> {
        Ok(())
    }

    async fn upsert_division(
        &self,
        tenant_id: Uuid,
        record: &DivisionRecord,
    ) -> DatabaseResult<UpsertOutcome> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let existing_id = state
            .divisions
            .values()
            .find(|d| {
                d.tenant_id == tenant_id && d.import_id.as_deref() == Some(record.import_id.as_str())
            })
            .map(|d| d.id);

        if let Some(clash) = state.divisions.values().find(|d| {
            d.tenant_id == tenant_id
                && d.national_id.as_deref() == Some(record.national_id.as_str())
                && Some(d.id) != existing_id
        }) {
            return Err(DatabaseError::Conflict(format!(
                "national id '{}' is already used by division {}",
                record.national_id, clash.id
            )));
        }

        if let Some(parent_id) = record.parent_id {
            let parent_ok = state
                .divisions
                .get(&parent_id)
                .is_some_and(|p| p.tenant_id == tenant_id);
            if !parent_ok {
                return Err(DatabaseError::InvalidInput(format!(
                    "parent division {} does not exist for this tenant",
                    parent_id
                )));
            }
            if let Some(id) = existing_id
                && state.is_ancestor_or_self(tenant_id, id, parent_id)
            {
                return Err(DatabaseError::Conflict(format!(
                    "moving division '{}' under {} would create a parent cycle",
                    record.import_id, parent_id
                )));
            }
        }

        let now = Utc::now();
        let outcome = match existing_id.and_then(|id| state.divisions.get_mut(&id)) {
            Some(node) => {
                let moved = node.level != record.level;
                node.national_id = Some(record.national_id.clone());
                node.parent_id = record.parent_id;
                node.name = record.name.clone();
                node.geojson = Some(record.geojson.clone());
                node.geometry = Some(record.geometry.clone());
                node.bounding_box = Some(record.bounding_box);
                node.level = record.level;
                node.updated_at = now;
                let id = node.id;
                if moved {
                    let relevelled = state.relevel_descendants(tenant_id, id, record.level);
                    tracing::debug!(
                        "Division {} moved to level {}; {} descendants relevelled",
                        record.import_id,
                        record.level,
                        relevelled
                    );
                }
                UpsertOutcome {
                    id,
                    operation: UpsertOperation::Updated,
                }
            }
            None => {
                let id = Uuid::new_v4();
                state.divisions.insert(
                    id,
                    DivisionNode {
                        id,
                        import_id: Some(record.import_id.clone()),
                        national_id: Some(record.national_id.clone()),
                        parent_id: record.parent_id,
                        tenant_id,
                        name: record.name.clone(),
                        geojson: Some(record.geojson.clone()),
                        geometry: Some(record.geometry.clone()),
                        bounding_box: Some(record.bounding_box),
                        level: record.level,
                        created_at: now,
                        updated_at: now,
                    },
                );
                UpsertOutcome {
                    id,
                    operation: UpsertOperation::Inserted,
                }
            }
        };

        state
            .commit_log
            .push((tenant_id, record.import_id.clone()));
        Ok(outcome)
    }

    async fn find_by_import_id(
        &self,
        tenant_id: Uuid,
        import_id: &str,
    ) -> DatabaseResult<Option<DivisionNode>> {
        Ok(self
            .lock()?
            .divisions
            .values()
            .find(|d| d.tenant_id == tenant_id && d.import_id.as_deref() == Some(import_id))
            .cloned())
    }

    async fn get_division(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> DatabaseResult<Option<DivisionNode>> {
        Ok(self
            .lock()?
            .divisions
            .get(&id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn division_level(&self, tenant_id: Uuid, id: Uuid) -> DatabaseResult<Option<i64>> {
        Ok(self
            .lock()?
            .divisions
            .get(&id)
            .filter(|d| d.tenant_id == tenant_id)
            .map(|d| d.level))
    }

    async fn import_id_map(&self, tenant_id: Uuid) -> DatabaseResult<Vec<(String, Uuid)>> {
        Ok(self
            .lock()?
            .divisions
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter_map(|d| d.import_id.clone().map(|import_id| (import_id, d.id)))
            .collect())
    }

    async fn children(
        &self,
        tenant_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> DatabaseResult<Vec<DivisionNode>> {
        let nodes = self
            .lock()?
            .divisions
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.parent_id == parent_id)
            .cloned()
            .collect();
        Ok(Self::sorted(nodes))
    }

    async fn by_level(&self, tenant_id: Uuid, level: i64) -> DatabaseResult<Vec<DivisionNode>> {
        let nodes = self
            .lock()?
            .divisions
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.level == level)
            .cloned()
            .collect();
        Ok(Self::sorted(nodes))
    }

    async fn in_bounding_box(
        &self,
        tenant_id: Uuid,
        bbox: &BoundingBox,
        relation: BoxRelation,
    ) -> DatabaseResult<Vec<DivisionNode>> {
        bbox.validate_query().map_err(DatabaseError::InvalidInput)?;
        let nodes = self
            .lock()?
            .divisions
            .values()
            .filter(|d| {
                d.tenant_id == tenant_id
                    && d.bounding_box.is_some_and(|b| relation.holds(&b, bbox))
            })
            .cloned()
            .collect();
        Ok(Self::sorted(nodes))
    }

    async fn count(&self, tenant_id: Uuid) -> DatabaseResult<usize> {
        Ok(self
            .lock()?
            .divisions
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .count())
    }

    async fn delete_all(&self, tenant_id: Uuid) -> DatabaseResult<usize> {
        let mut state = self.lock()?;
        let before = state.divisions.len();
        state.divisions.retain(|_, d| d.tenant_id != tenant_id);
        Ok(before - state.divisions.len())
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(self.lock().is_ok())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
