//! DuckDB database backend implementation
//!
//! Provides an embedded, file-based division store for the CLI. Identifiers
//! are stored as text and geometry as GeoJSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::schema::{DatabaseSchema, SCHEMA_VERSION};
use super::{DatabaseError, DatabaseResult, DivisionStore};
use crate::models::{
    BoundingBox, BoxRelation, DivisionNode, DivisionRecord, LocalizedName, UpsertOperation,
    UpsertOutcome,
};

/// DuckDB database backend
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

/// A division row as stored, before identifiers and JSON are parsed
struct DivisionRow {
    id: String,
    tenant_id: String,
    import_id: Option<String>,
    national_id: Option<String>,
    parent_id: Option<String>,
    name: String,
    geojson: Option<String>,
    geometry: Option<String>,
    bbox: [Option<f64>; 4],
    level: i64,
    created_at: String,
    updated_at: String,
}

impl DivisionRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            import_id: row.get(2)?,
            national_id: row.get(3)?,
            parent_id: row.get(4)?,
            name: row.get(5)?,
            geojson: row.get(6)?,
            geometry: row.get(7)?,
            bbox: [row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?],
            level: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_node(self) -> DatabaseResult<DivisionNode> {
        let bounding_box = match self.bbox {
            [Some(min_x), Some(min_y), Some(max_x), Some(max_y)] => {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            }
            _ => None,
        };

        Ok(DivisionNode {
            id: parse_uuid(&self.id)?,
            tenant_id: parse_uuid(&self.tenant_id)?,
            import_id: self.import_id,
            national_id: self.national_id,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            name: serde_json::from_str::<LocalizedName>(&self.name)
                .map_err(|e| DatabaseError::SerializationError(format!("Invalid name: {}", e)))?,
            geojson: self.geojson.as_deref().map(parse_json).transpose()?,
            geometry: self.geometry.as_deref().map(parse_json).transpose()?,
            bounding_box,
            level: self.level,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Map "no rows" to `None` for single-row lookups
fn optional<T>(result: duckdb::Result<T>) -> duckdb::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether `ancestor` is `node` or one of its ancestors within the tenant
fn is_ancestor_or_self(
    conn: &duckdb::Connection,
    tenant: &str,
    ancestor: &str,
    node: &str,
) -> DatabaseResult<bool> {
    let mut seen = HashSet::new();
    let mut current = Some(node.to_string());
    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id.clone()) {
            return Ok(false);
        }
        current = optional(conn.query_row(
            "SELECT parent_id FROM divisions WHERE tenant_id = ? AND id = ?",
            duckdb::params![tenant, id],
            |row| row.get::<_, Option<String>>(0),
        ))
        .map_err(|e| DatabaseError::QueryFailed(format!("Ancestor lookup failed: {}", e)))?
        .flatten();
    }
    Ok(false)
}

/// Set every stored descendant of `root` to its parent's level plus one
fn relevel_descendants(
    conn: &duckdb::Connection,
    tenant: &str,
    root: &str,
    level: i64,
    now: &str,
) -> DatabaseResult<usize> {
    let mut frontier = vec![(root.to_string(), level)];
    let mut relevelled = 0;

    while let Some((parent_id, parent_level)) = frontier.pop() {
        let child_level = parent_level + 1;
        let mut stmt = conn
            .prepare(
                "SELECT id FROM divisions WHERE tenant_id = ? AND parent_id = ? AND level <> ?",
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let children = stmt
            .query_map(duckdb::params![tenant, parent_id, child_level], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?;

        for child in children {
            conn.execute(
                "UPDATE divisions SET level = ?, updated_at = ? WHERE id = ?",
                duckdb::params![child_level, now, child],
            )
            .map_err(|e| {
                DatabaseError::QueryFailed(format!("Failed to relevel division {}: {}", child, e))
            })?;
            frontier.push((child, child_level));
            relevelled += 1;
        }
    }

    Ok(relevelled)
}

fn parse_uuid(value: &str) -> DatabaseResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::SerializationError(format!("Invalid UUID '{}': {}", value, e)))
}

fn parse_json(value: &str) -> DatabaseResult<serde_json::Value> {
    serde_json::from_str(value)
        .map_err(|e| DatabaseError::SerializationError(format!("Invalid JSON column: {}", e)))
}

fn parse_timestamp(value: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            DatabaseError::SerializationError(format!("Invalid timestamp '{}': {}", value, e))
        })
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute multiple SQL statements
    fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    /// Run a division SELECT with the given WHERE clause
    fn select_divisions(
        &self,
        where_clause: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> DatabaseResult<Vec<DivisionNode>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM divisions WHERE {} ORDER BY level, import_id, id",
            DatabaseSchema::division_columns(),
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let rows = stmt
            .query_map(params, DivisionRow::from_row)
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut nodes = Vec::new();
        for row in rows {
            let row =
                row.map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?;
            nodes.push(row.into_node()?);
        }
        Ok(nodes)
    }
}

#[async_trait(?Send)]
impl DivisionStore for DuckDBBackend {
    async fn initialize(&self) -> DatabaseResult<()> {
        self.execute_batch(DatabaseSchema::create_tables_sql())?;
        self.execute_batch(DatabaseSchema::create_indexes_sql())?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?) ON CONFLICT (version) DO NOTHING",
            [SCHEMA_VERSION],
        )
        .map_err(|e| {
            DatabaseError::MigrationFailed(format!("Failed to record schema version: {}", e))
        })?;

        Ok(())
    }

    async fn upsert_division(
        &self,
        tenant_id: Uuid,
        record: &DivisionRecord,
    ) -> DatabaseResult<UpsertOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to begin transaction: {}", e))
        })?;
        let tenant = tenant_id.to_string();

        let existing: Option<(String, i64)> = optional(tx.query_row(
            "SELECT id, level FROM divisions WHERE tenant_id = ? AND import_id = ?",
            duckdb::params![tenant, record.import_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ))
        .map_err(|e| DatabaseError::QueryFailed(format!("Lookup failed: {}", e)))?;
        let previous_level = existing.as_ref().map(|(_, level)| *level);
        let existing = existing.map(|(id, _)| id);

        let clash: Option<String> = optional(tx.query_row(
            "SELECT id FROM divisions WHERE tenant_id = ? AND national_id = ? AND id <> ?",
            duckdb::params![
                tenant,
                record.national_id,
                existing.clone().unwrap_or_default()
            ],
            |row| row.get(0),
        ))
        .map_err(|e| DatabaseError::QueryFailed(format!("Lookup failed: {}", e)))?;
        if let Some(clash) = clash {
            return Err(DatabaseError::Conflict(format!(
                "national id '{}' is already used by division {}",
                record.national_id, clash
            )));
        }

        let parent = record.parent_id.map(|p| p.to_string());
        if let Some(parent) = &parent {
            let found: Option<i32> = optional(tx.query_row(
                "SELECT 1 FROM divisions WHERE id = ? AND tenant_id = ?",
                duckdb::params![parent, tenant],
                |row| row.get(0),
            ))
            .map_err(|e| DatabaseError::QueryFailed(format!("Lookup failed: {}", e)))?;
            if found.is_none() {
                return Err(DatabaseError::InvalidInput(format!(
                    "parent division {} does not exist for this tenant",
                    parent
                )));
            }
            if let Some(id) = &existing
                && is_ancestor_or_self(&tx, &tenant, id, parent)?
            {
                return Err(DatabaseError::Conflict(format!(
                    "moving division '{}' under {} would create a parent cycle",
                    record.import_id, parent
                )));
            }
        }

        let name = serde_json::to_string(&record.name)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let geojson = record.geojson.to_string();
        let geometry = record.geometry.to_string();
        let bbox = record.bounding_box;
        let now = Utc::now().to_rfc3339();

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE divisions SET
                        national_id = ?, parent_id = ?, name = ?, geojson = ?, geometry = ?,
                        bbox_min_x = ?, bbox_min_y = ?, bbox_max_x = ?, bbox_max_y = ?,
                        level = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                    duckdb::params![
                        record.national_id,
                        parent,
                        name,
                        geojson,
                        geometry,
                        bbox.min_x,
                        bbox.min_y,
                        bbox.max_x,
                        bbox.max_y,
                        record.level,
                        now,
                        id,
                    ],
                )
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!(
                        "Failed to update division {}: {}",
                        record.import_id, e
                    ))
                })?;
                if previous_level != Some(record.level) {
                    let relevelled = relevel_descendants(&tx, &tenant, &id, record.level, &now)?;
                    tracing::debug!(
                        "Division {} moved to level {}; {} descendants relevelled",
                        record.import_id,
                        record.level,
                        relevelled
                    );
                }
                UpsertOutcome {
                    id: parse_uuid(&id)?,
                    operation: UpsertOperation::Updated,
                }
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    r#"
                    INSERT INTO divisions (
                        id, tenant_id, import_id, national_id, parent_id, name, geojson, geometry,
                        bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, level,
                        created_at, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    duckdb::params![
                        id.to_string(),
                        tenant,
                        record.import_id,
                        record.national_id,
                        parent,
                        name,
                        geojson,
                        geometry,
                        bbox.min_x,
                        bbox.min_y,
                        bbox.max_x,
                        bbox.max_y,
                        record.level,
                        now,
                        now,
                    ],
                )
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!(
                        "Failed to insert division {}: {}",
                        record.import_id, e
                    ))
                })?;
                UpsertOutcome {
                    id,
                    operation: UpsertOperation::Inserted,
                }
            }
        };

        tx.commit().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to commit transaction: {}", e))
        })?;
        Ok(outcome)
    }

    async fn find_by_import_id(
        &self,
        tenant_id: Uuid,
        import_id: &str,
    ) -> DatabaseResult<Option<DivisionNode>> {
        let tenant = tenant_id.to_string();
        Ok(self
            .select_divisions("tenant_id = ? AND import_id = ?", &[&tenant, &import_id])?
            .into_iter()
            .next())
    }

    async fn get_division(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> DatabaseResult<Option<DivisionNode>> {
        let tenant = tenant_id.to_string();
        let id = id.to_string();
        Ok(self
            .select_divisions("tenant_id = ? AND id = ?", &[&tenant, &id])?
            .into_iter()
            .next())
    }

    async fn division_level(&self, tenant_id: Uuid, id: Uuid) -> DatabaseResult<Option<i64>> {
        let conn = self.lock()?;
        optional(conn.query_row(
            "SELECT level FROM divisions WHERE tenant_id = ? AND id = ?",
            duckdb::params![tenant_id.to_string(), id.to_string()],
            |row| row.get(0),
        ))
        .map_err(|e| DatabaseError::QueryFailed(format!("Failed to read level: {}", e)))
    }

    async fn import_id_map(&self, tenant_id: Uuid) -> DatabaseResult<Vec<(String, Uuid)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT import_id, id FROM divisions WHERE tenant_id = ? AND import_id IS NOT NULL",
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let rows = stmt
            .query_map([tenant_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut pairs = Vec::new();
        for row in rows {
            let (import_id, id) =
                row.map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?;
            pairs.push((import_id, parse_uuid(&id)?));
        }
        Ok(pairs)
    }

    async fn children(
        &self,
        tenant_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> DatabaseResult<Vec<DivisionNode>> {
        let tenant = tenant_id.to_string();
        match parent_id {
            Some(parent_id) => {
                let parent = parent_id.to_string();
                self.select_divisions("tenant_id = ? AND parent_id = ?", &[&tenant, &parent])
            }
            None => self.select_divisions("tenant_id = ? AND parent_id IS NULL", &[&tenant]),
        }
    }

    async fn by_level(&self, tenant_id: Uuid, level: i64) -> DatabaseResult<Vec<DivisionNode>> {
        let tenant = tenant_id.to_string();
        self.select_divisions("tenant_id = ? AND level = ?", &[&tenant, &level])
    }

    async fn in_bounding_box(
        &self,
        tenant_id: Uuid,
        bbox: &BoundingBox,
        relation: BoxRelation,
    ) -> DatabaseResult<Vec<DivisionNode>> {
        bbox.validate_query().map_err(DatabaseError::InvalidInput)?;
        let tenant = tenant_id.to_string();
        match relation {
            BoxRelation::Intersects => self.select_divisions(
                "tenant_id = ? AND bbox_min_x <= ? AND bbox_max_x >= ? \
                 AND bbox_min_y <= ? AND bbox_max_y >= ?",
                &[&tenant, &bbox.max_x, &bbox.min_x, &bbox.max_y, &bbox.min_y],
            ),
            BoxRelation::Contains => self.select_divisions(
                "tenant_id = ? AND bbox_min_x <= ? AND bbox_max_x >= ? \
                 AND bbox_min_y <= ? AND bbox_max_y >= ?",
                &[&tenant, &bbox.min_x, &bbox.max_x, &bbox.min_y, &bbox.max_y],
            ),
            BoxRelation::Within => self.select_divisions(
                "tenant_id = ? AND bbox_min_x >= ? AND bbox_max_x <= ? \
                 AND bbox_min_y >= ? AND bbox_max_y <= ?",
                &[&tenant, &bbox.min_x, &bbox.max_x, &bbox.min_y, &bbox.max_y],
            ),
        }
    }

    async fn count(&self, tenant_id: Uuid) -> DatabaseResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM divisions WHERE tenant_id = ?",
                [tenant_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count as usize)
    }

    async fn delete_all(&self, tenant_id: Uuid) -> DatabaseResult<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM divisions WHERE tenant_id = ?",
            [tenant_id.to_string()],
        )
        .map_err(|e| DatabaseError::QueryFailed(format!("Delete failed: {}", e)))
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let healthy: i32 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(healthy == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}
