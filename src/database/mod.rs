//! Division persistence abstraction
//!
//! This module provides the tenant-scoped store the import pipeline writes to:
//! - In-memory: for tests, dry runs and embedding
//! - DuckDB: embedded database for the CLI (feature `duckdb-backend`)
//!
//! Every operation takes the tenant id and never reads or writes another
//! tenant's rows. Each upsert runs in its own short transaction.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{BoundingBox, BoxRelation, DivisionNode, DivisionRecord, UpsertOutcome};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

pub mod config;
pub mod memory;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

pub use config::{DatabaseBackendType, DivisionsConfig};
pub use memory::InMemoryBackend;
pub use schema::DatabaseSchema;

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A tenant-scoped uniqueness rule was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Database not initialized
    #[error("Database not initialized. Run 'divisions init' first.")]
    NotInitialized,

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Tenant-scoped division store
///
/// The import pipeline only needs upsert-by-import-id, select-by-id,
/// select-parent-level and the tenant's import-id listing; the remaining
/// operations serve readers and administration.
#[async_trait(?Send)]
pub trait DivisionStore: Send + Sync {
    /// Initialize database schema (run migrations)
    async fn initialize(&self) -> DatabaseResult<()>;

    /// Insert or update a division keyed by `(tenant_id, record.import_id)`
    ///
    /// Runs in its own transaction. The parent (if any) must belong to the
    /// same tenant and `national_id` must be unique within the tenant;
    /// violations roll back and return [`DatabaseError::Conflict`] or
    /// [`DatabaseError::InvalidInput`].
    ///
    /// Moving an existing division under itself or one of its descendants is
    /// a [`DatabaseError::Conflict`]. When the level of an existing division
    /// changes, its stored descendants are relevelled in the same transaction.
    async fn upsert_division(
        &self,
        tenant_id: Uuid,
        record: &DivisionRecord,
    ) -> DatabaseResult<UpsertOutcome>;

    /// Get a division by its import id
    async fn find_by_import_id(
        &self,
        tenant_id: Uuid,
        import_id: &str,
    ) -> DatabaseResult<Option<DivisionNode>>;

    /// Get a division by its persisted id
    async fn get_division(&self, tenant_id: Uuid, id: Uuid)
    -> DatabaseResult<Option<DivisionNode>>;

    /// Get the persisted level of a division
    async fn division_level(&self, tenant_id: Uuid, id: Uuid) -> DatabaseResult<Option<i64>>;

    /// All `(import_id, id)` pairs of the tenant's divisions that carry an import id
    async fn import_id_map(&self, tenant_id: Uuid) -> DatabaseResult<Vec<(String, Uuid)>>;

    /// Direct children of a division, or the roots when `parent_id` is `None`
    async fn children(
        &self,
        tenant_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> DatabaseResult<Vec<DivisionNode>>;

    /// Divisions at one hierarchy level, ordered by import id
    async fn by_level(&self, tenant_id: Uuid, level: i64) -> DatabaseResult<Vec<DivisionNode>>;

    /// Divisions whose stored envelope stands in `relation` to `bbox`
    ///
    /// `bbox` must pass [`BoundingBox::validate_query`], otherwise
    /// [`DatabaseError::InvalidInput`] is returned.
    async fn in_bounding_box(
        &self,
        tenant_id: Uuid,
        bbox: &BoundingBox,
        relation: BoxRelation,
    ) -> DatabaseResult<Vec<DivisionNode>>;

    /// Number of divisions stored for the tenant
    async fn count(&self, tenant_id: Uuid) -> DatabaseResult<usize>;

    /// Delete every division of the tenant
    ///
    /// Administrative operation; the import pipeline never deletes.
    async fn delete_all(&self, tenant_id: Uuid) -> DatabaseResult<usize>;

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Get the database backend type name
    fn backend_type(&self) -> &'static str;

    /// Ancestor chain of a division, root first, ending with the division itself
    async fn breadcrumb(&self, tenant_id: Uuid, id: Uuid) -> DatabaseResult<Vec<DivisionNode>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            if !visited.insert(current_id) {
                tracing::warn!(
                    "Cycle detected in parent chain of division {} at {}",
                    id,
                    current_id
                );
                break;
            }
            let Some(node) = self.get_division(tenant_id, current_id).await? else {
                break;
            };
            current = node.parent_id;
            chain.push(node);
        }

        chain.reverse();
        Ok(chain)
    }
}
