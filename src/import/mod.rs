//! Import functionality
//!
//! Imports administrative divisions from a zip archive holding one CSV
//! manifest and per-division GeoJSON files:
//! - Archive reading and manifest discovery
//! - Manifest parsing (required columns, language columns)
//! - Geometry file lookup by basename
//! - Per-division import with idempotent upserts
//! - Orchestration across hierarchy levels

pub mod archive;
pub mod context;
pub mod lookup;
pub mod manifest;
pub mod node;
pub mod options;
pub mod orchestrator;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use context::ImportContext;
pub use lookup::{GeometryLookup, LookupCollision};
pub use manifest::{Manifest, ManifestParser, SkippedRow};
pub use node::{ImportedNode, NodeImportError, NodeImporter};
pub use options::{ImportOptions, UnresolvedPolicy};
pub use orchestrator::{DivisionImporter, ImportPlan};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::database::DatabaseError;

/// Batch-level import failure
///
/// Raised before any row is written; the whole run is rejected.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum ImportError {
    #[error("Invalid archive: {0}")]
    Archive(String),
    #[error("Archive is {size} bytes, larger than the {limit} byte limit")]
    ArchiveTooLarge { size: u64, limit: u64 },
    #[error("Archive unpacks to more than the {limit} byte limit")]
    UnpackedTooLarge { limit: u64 },
    #[error("No .{0} manifest found in archive")]
    MissingManifest(String),
    #[error("Archive contains more than one manifest: {}", .0.join(", "))]
    MultipleManifests(Vec<String>),
    #[error("Manifest is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Manifest is missing the required language column 'en'")]
    MissingLanguageColumn,
    #[error("Duplicate id '{import_id}' on line {line} (first seen on line {first_line})")]
    DuplicateImportId {
        import_id: String,
        first_line: usize,
        line: usize,
    },
    #[error("No valid rows found in manifest")]
    NoValidRows,
    #[error("Failed to parse manifest: {0}")]
    Csv(String),
    #[error("No root divisions found (rows with an empty parent)")]
    NoRoots,
    #[error("Orphaned divisions found ({count}): {}", .examples.join("; "))]
    OrphanedParents { count: usize, examples: Vec<String> },
    #[error(
        "{count} divisions could not be placed in the hierarchy (cycles: {}): {}",
        .cycles.len(),
        .examples.join(", ")
    )]
    UnresolvedHierarchy {
        count: usize,
        examples: Vec<String>,
        cycles: Vec<Vec<String>>,
    },
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DatabaseError> for ImportError {
    fn from(err: DatabaseError) -> Self {
        ImportError::Database(err.to_string())
    }
}

/// Aggregate result of a completed import run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "import reports carry per-row failures that should be surfaced"]
pub struct ImportReport {
    /// Valid manifest rows considered for import
    pub total_processed: usize,
    pub imported: usize,
    pub failed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Failure reason keyed by import id
    pub failed_details: BTreeMap<String, String>,
    /// Number of hierarchy levels processed
    pub levels: usize,
    /// Hex SHA-256 of the archive bytes
    pub archive_sha256: String,
}

impl ImportReport {
    pub(crate) fn record_failure(&mut self, import_id: &str, reason: impl Into<String>) {
        self.failed += 1;
        self.failed_details
            .insert(import_id.to_string(), reason.into());
    }
}

/// Wire shape of an import outcome
///
/// `{ success: true, totalProcessed, imported, failed, inserted, updated,
/// failedDetails, ... }` for completed runs and `{ success: false, error }`
/// for runs rejected before any row was processed.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<ImportReport, ImportError>> for ImportResponse {
    fn from(result: Result<ImportReport, ImportError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                report: Some(report),
                error: None,
            },
            Err(err) => Self {
                success: false,
                report: None,
                error: Some(err.to_string()),
            },
        }
    }
}
