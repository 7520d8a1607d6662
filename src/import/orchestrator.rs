//! Import orchestration
//!
//! Drives a run end to end:
//!
//! ```text
//! read archive → parse manifest → build lookup → preload → resolve hierarchy
//!     → import level 1..N → report
//! ```
//!
//! Everything up to hierarchy resolution is read-only, so a rejected batch
//! never leaves partial writes. Once levels are being imported a run always
//! completes; row failures are recorded in the report.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::archive::ArchiveReader;
use super::context::ImportContext;
use super::lookup::GeometryLookup;
use super::manifest::{Manifest, ManifestParser};
use super::node::NodeImporter;
use super::options::{ImportOptions, UnresolvedPolicy};
use super::{ImportError, ImportReport};
use crate::database::DivisionStore;
use crate::models::UpsertOperation;
use crate::validation::{HierarchyLevel, HierarchyResolution, HierarchyResolver};

/// Number of offending rows quoted in batch-level error messages
const ERROR_EXAMPLES: usize = 5;

/// Reason recorded for rows left out by the `skip` policy
const UNRESOLVED_REASON: &str = "Division could not be placed in the hierarchy (parent cycle or depth limit)";

/// Dry-run result: what an import would do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPlan {
    pub total_rows: usize,
    pub languages: Vec<String>,
    /// Import ids per level, in commit order
    pub levels: Vec<HierarchyLevel>,
    /// Rows that would be reported as failed under the `skip` policy
    pub unresolved: Vec<String>,
    /// Rows whose geometry file is not in the archive
    pub missing_geometry: Vec<String>,
    /// Rows whose import id already exists for the tenant
    pub existing: usize,
    pub skipped_rows: usize,
    pub archive_sha256: String,
}

/// Everything the read-only phase produced
struct PreparedRun {
    archive: ArchiveReader,
    manifest: Manifest,
    lookup: GeometryLookup,
    context: ImportContext,
    levels: Vec<HierarchyLevel>,
    unresolved: Vec<String>,
}

/// Division import pipeline bound to a store
pub struct DivisionImporter<S> {
    store: S,
    options: ImportOptions,
}

impl<S: DivisionStore> DivisionImporter<S> {
    /// Create an importer with default options
    pub fn new(store: S) -> Self {
        Self::with_options(store, ImportOptions::default())
    }

    pub fn with_options(store: S, options: ImportOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Consume the importer and return its store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Import an archive for a tenant
    ///
    /// Returns `Err` only when the batch is rejected before any write.
    pub async fn import_archive(
        &self,
        bytes: &[u8],
        tenant_id: Uuid,
    ) -> Result<ImportReport, ImportError> {
        let PreparedRun {
            archive,
            manifest,
            lookup,
            mut context,
            levels,
            unresolved,
        } = self.prepare(bytes, tenant_id).await?;

        let mut report = ImportReport {
            total_processed: manifest.len(),
            levels: levels.len(),
            archive_sha256: archive.sha256().to_string(),
            ..Default::default()
        };
        for import_id in &unresolved {
            report.record_failure(import_id, UNRESOLVED_REASON);
        }

        let importer = NodeImporter::new(&self.store, &archive, &lookup);
        let interval = self.options.progress_interval.max(1);

        for (depth, level) in levels.iter().enumerate() {
            tracing::info!(
                "Importing level {} of {} ({} divisions)",
                depth + 1,
                levels.len(),
                level.len()
            );

            for (n, import_id) in level.iter().enumerate() {
                let Some(row) = manifest.get(import_id) else {
                    report.record_failure(import_id, "Row missing from manifest");
                    continue;
                };

                match importer.import(row, &context).await {
                    Ok(node) => {
                        context.record(node.import_id, node.id);
                        report.imported += 1;
                        match node.operation {
                            UpsertOperation::Inserted => report.inserted += 1,
                            UpsertOperation::Updated => report.updated += 1,
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to import division {}: {}", import_id, e);
                        report.record_failure(import_id, e.to_string());
                    }
                }

                if (n + 1) % interval == 0 && n + 1 < level.len() {
                    tracing::info!(
                        "Level {}: {}/{} processed ({} imported, {} failed so far)",
                        depth + 1,
                        n + 1,
                        level.len(),
                        report.imported,
                        report.failed
                    );
                }
            }

            tracing::info!(
                "Level {} complete: {} imported, {} failed so far",
                depth + 1,
                report.imported,
                report.failed
            );
        }

        tracing::info!(
            "Import complete for tenant {}: {} rows, {} imported ({} inserted, {} updated), {} failed",
            tenant_id,
            report.total_processed,
            report.imported,
            report.inserted,
            report.updated,
            report.failed
        );

        Ok(report)
    }

    /// Run the read-only phase and describe what an import would do
    pub async fn plan(&self, bytes: &[u8], tenant_id: Uuid) -> Result<ImportPlan, ImportError> {
        let run = self.prepare(bytes, tenant_id).await?;

        let missing_geometry = run
            .manifest
            .rows()
            .iter()
            .filter(|r| run.lookup.resolve(&r.geodata_filename).is_none())
            .map(|r| r.import_id.clone())
            .collect();
        let existing = run
            .manifest
            .rows()
            .iter()
            .filter(|r| run.context.contains(&r.import_id))
            .count();

        Ok(ImportPlan {
            total_rows: run.manifest.len(),
            languages: run.manifest.languages().to_vec(),
            levels: run.levels,
            unresolved: run.unresolved,
            missing_geometry,
            existing,
            skipped_rows: run.manifest.skipped().len(),
            archive_sha256: run.archive.sha256().to_string(),
        })
    }

    async fn prepare(&self, bytes: &[u8], tenant_id: Uuid) -> Result<PreparedRun, ImportError> {
        let archive = ArchiveReader::from_bytes(
            bytes,
            self.options.max_archive_bytes,
            self.options.max_unpacked_bytes,
        )?;
        tracing::info!(
            "Read archive with {} files (sha256 {})",
            archive.len(),
            archive.sha256()
        );

        let manifest_entry = archive.manifest(&self.options.manifest_extension)?;
        let text = manifest_entry.text().map_err(|e| {
            ImportError::Csv(format!("{} is not valid UTF-8: {}", manifest_entry.path, e))
        })?;
        let manifest = ManifestParser::parse(text)?;
        tracing::info!(
            "Parsed {} divisions from {} (languages: {})",
            manifest.len(),
            manifest_entry.path,
            manifest.languages().join(", ")
        );

        let lookup = GeometryLookup::build(archive.paths(), &self.options.geometry_extension);
        tracing::info!("Indexed {} geometry files", lookup.len());

        let context = ImportContext::preload(&self.store, tenant_id).await?;

        let resolver = HierarchyResolver::new(self.options.max_levels);
        let (levels, unresolved) =
            match resolver.resolve(manifest.rows(), |id| context.contains(id)) {
                HierarchyResolution::Resolved(levels) => (levels, Vec::new()),
                HierarchyResolution::NoRoots => return Err(ImportError::NoRoots),
                HierarchyResolution::OrphanDetected(orphans) => {
                    return Err(ImportError::OrphanedParents {
                        count: orphans.len(),
                        examples: orphans
                            .iter()
                            .take(ERROR_EXAMPLES)
                            .map(|o| o.to_string())
                            .collect(),
                    });
                }
                HierarchyResolution::CycleOrUnresolved {
                    levels,
                    unresolved,
                    cycles,
                } => match self.options.unresolved_rows {
                    UnresolvedPolicy::Fail => {
                        return Err(ImportError::UnresolvedHierarchy {
                            count: unresolved.len(),
                            examples: unresolved.into_iter().take(ERROR_EXAMPLES).collect(),
                            cycles,
                        });
                    }
                    UnresolvedPolicy::Skip => {
                        tracing::warn!(
                            "Skipping {} unresolved divisions; they will be reported as failed",
                            unresolved.len()
                        );
                        (levels, unresolved)
                    }
                },
            };

        tracing::info!(
            "Resolved {} levels: [{}]",
            levels.len(),
            levels
                .iter()
                .map(|l| l.len().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(PreparedRun {
            archive,
            manifest,
            lookup,
            context,
            levels,
            unresolved,
        })
    }
}
