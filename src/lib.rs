//! Division Import SDK - hierarchical administrative division imports
//!
//! Provides:
//! - Archive import (CSV manifest + GeoJSON files in one zip)
//! - Hierarchy resolution (level ordering, orphan and cycle rejection)
//! - Geometry extraction and repair
//! - Tenant-scoped persistence (in-memory, DuckDB)
//! - The `divisions` CLI (feature `cli`)

#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod geometry;
pub mod import;
pub mod models;
pub mod validation;

// Re-export commonly used types
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
pub use database::{DatabaseError, DivisionStore, DivisionsConfig, InMemoryBackend};
pub use import::{
    DivisionImporter, ImportError, ImportOptions, ImportPlan, ImportReport, ImportResponse,
    UnresolvedPolicy,
};
pub use validation::{HierarchyResolution, HierarchyResolver};

// Re-export models
pub use models::{
    BoundingBox, BoxRelation, DivisionNode, DivisionRecord, LocalizedName, ManifestRow,
    UpsertOperation, UpsertOutcome,
};
