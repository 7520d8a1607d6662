//! Single-division import
//!
//! Imports one manifest row: locate and decode its GeoJSON file, extract and
//! repair the geometry, resolve the parent and level, then upsert. Every
//! failure is returned as a [`NodeImportError`] so the orchestrator can record
//! it against the row and move on.

use serde_json::Value;
use uuid::Uuid;

use super::archive::ArchiveReader;
use super::context::ImportContext;
use super::lookup::GeometryLookup;
use crate::database::{DatabaseError, DivisionStore};
use crate::geometry::{self, GeoJsonDocument, GeoJsonError, GeometryError};
use crate::models::{DivisionRecord, ManifestRow, UpsertOperation};

/// Per-row import failure; the `Display` text is the reported reason
#[derive(Debug, thiserror::Error)]
pub enum NodeImportError {
    #[error("GeoJSON file not found: {0}")]
    GeoJsonNotFound(String),
    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("Invalid JSON in GeoJSON file: {0}")]
    InvalidJson(String),
    #[error("Invalid GeoJSON: missing 'type' property")]
    MissingType,
    #[error("Invalid GeoJSON type: {0}")]
    UnsupportedType(String),
    #[error("FeatureCollection has no features")]
    EmptyFeatureCollection,
    #[error("No geometry found in GeoJSON")]
    NoGeometry,
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error("Parent division '{0}' has not been imported")]
    ParentNotResolved(String),
    #[error("Parent division {0} not found in database")]
    ParentMissingInStore(Uuid),
    #[error("Database error: {0}")]
    Store(#[from] DatabaseError),
}

impl From<GeoJsonError> for NodeImportError {
    fn from(err: GeoJsonError) -> Self {
        match err {
            GeoJsonError::MissingType => NodeImportError::MissingType,
            GeoJsonError::UnsupportedType(kind) => NodeImportError::UnsupportedType(kind),
            GeoJsonError::EmptyFeatureCollection => NodeImportError::EmptyFeatureCollection,
            GeoJsonError::NoGeometry => NodeImportError::NoGeometry,
        }
    }
}

/// A committed division
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNode {
    pub import_id: String,
    pub id: Uuid,
    pub operation: UpsertOperation,
    pub level: i64,
}

/// Imports single rows against one archive and one store
pub struct NodeImporter<'a, S: ?Sized> {
    store: &'a S,
    archive: &'a ArchiveReader,
    lookup: &'a GeometryLookup,
}

impl<'a, S: DivisionStore + ?Sized> NodeImporter<'a, S> {
    pub fn new(store: &'a S, archive: &'a ArchiveReader, lookup: &'a GeometryLookup) -> Self {
        Self {
            store,
            archive,
            lookup,
        }
    }

    /// Import one row
    ///
    /// The caller must record the returned id in `context` before importing
    /// any child of this row.
    pub async fn import(
        &self,
        row: &ManifestRow,
        context: &ImportContext,
    ) -> Result<ImportedNode, NodeImportError> {
        let document = self.load_document(&row.geodata_filename)?;
        let extracted = GeoJsonDocument::classify(&document)?.extract_geometry()?;
        let derived = geometry::derive(extracted)?;

        let (parent_id, level) = self.resolve_parent(row, context).await?;

        let record = DivisionRecord {
            import_id: row.import_id.clone(),
            national_id: row.national_id.clone(),
            parent_id,
            name: row.name.clone(),
            geometry: derived.to_geojson(),
            bounding_box: derived.bounding_box,
            geojson: document,
            level,
        };

        let outcome = self
            .store
            .upsert_division(context.tenant_id(), &record)
            .await?;
        tracing::debug!(
            "Division {} {} as {} (level {})",
            row.import_id,
            outcome.operation,
            outcome.id,
            level
        );

        Ok(ImportedNode {
            import_id: row.import_id.clone(),
            id: outcome.id,
            operation: outcome.operation,
            level,
        })
    }

    fn load_document(&self, filename: &str) -> Result<Value, NodeImportError> {
        let entry = self
            .lookup
            .resolve(filename)
            .and_then(|path| self.archive.get(path))
            .ok_or_else(|| NodeImportError::GeoJsonNotFound(filename.to_string()))?;

        let text = entry.text().map_err(|e| NodeImportError::Unreadable {
            path: entry.path.clone(),
            reason: e.to_string(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        serde_json::from_str(text).map_err(|e| NodeImportError::InvalidJson(e.to_string()))
    }

    async fn resolve_parent(
        &self,
        row: &ManifestRow,
        context: &ImportContext,
    ) -> Result<(Option<Uuid>, i64), NodeImportError> {
        let Some(parent) = row.parent() else {
            return Ok((None, 1));
        };

        let parent_id = context
            .resolve(parent)
            .ok_or_else(|| NodeImportError::ParentNotResolved(parent.to_string()))?;
        let parent_level = self
            .store
            .division_level(context.tenant_id(), parent_id)
            .await?
            .ok_or(NodeImportError::ParentMissingInStore(parent_id))?;

        Ok((Some(parent_id), parent_level + 1))
    }
}
