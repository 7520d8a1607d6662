//! Database schema definitions
//!
//! Geometry is kept as GeoJSON text next to a flattened envelope so range
//! queries on the bounding box need no spatial extension.

/// Schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Database schema helper
pub struct DatabaseSchema;

impl DatabaseSchema {
    /// Get the initial schema creation SQL
    ///
    /// Uniqueness of `(tenant_id, import_id)` and `(tenant_id, national_id)`
    /// is checked inside the upsert transaction rather than by unique indexes.
    /// DuckDB rewrites updates of indexed columns as delete plus insert, so
    /// only columns an upsert never changes are indexed.
    pub fn create_tables_sql() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Administrative divisions, one tree per tenant
CREATE TABLE IF NOT EXISTS divisions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    import_id TEXT,
    national_id TEXT,
    parent_id TEXT,
    name TEXT NOT NULL,
    geojson TEXT,
    geometry TEXT,
    bbox_min_x DOUBLE,
    bbox_min_y DOUBLE,
    bbox_max_x DOUBLE,
    bbox_max_y DOUBLE,
    level BIGINT NOT NULL CHECK (level >= 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#
    }

    /// Get index creation SQL
    pub fn create_indexes_sql() -> &'static str {
        r#"
CREATE INDEX IF NOT EXISTS idx_divisions_tenant_import ON divisions(tenant_id, import_id);
"#
    }

    /// Column list shared by every division SELECT
    pub fn division_columns() -> &'static str {
        "id, tenant_id, import_id, national_id, parent_id, name, geojson, geometry, \
         bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, level, created_at, updated_at"
    }

    /// Get all table names in dependency order (for drops)
    pub fn table_names() -> &'static [&'static str] {
        &["divisions", "schema_version"]
    }
}
