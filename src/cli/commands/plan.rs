//! Dry-run command
//!
//! Validates an archive against the workspace database and prints the level
//! plan without writing anything.

use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::error::CliError;
use crate::database::{DatabaseBackendType, DivisionStore, InMemoryBackend};
use crate::import::{DivisionImporter, ImportOptions, ImportPlan};

use super::{load_config, open_duckdb, parse_tenant, read_archive};

/// Plan command arguments
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub archive: PathBuf,
    pub tenant: String,
    pub workspace: PathBuf,
    pub pretty: bool,
}

pub fn handle_plan(args: &PlanArgs) -> Result<(), CliError> {
    let workspace_path = &args.workspace;
    let tenant_id = parse_tenant(&args.tenant)?;
    let config = load_config(workspace_path)?;
    let bytes = read_archive(&args.archive)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    let plan = rt.block_on(async {
        match config.database.backend {
            DatabaseBackendType::DuckDB => {
                let store = open_duckdb(&config, workspace_path)?;
                run_plan(store, config.import.clone(), &bytes, tenant_id).await
            }
            DatabaseBackendType::Memory => {
                run_plan(
                    InMemoryBackend::new(),
                    config.import.clone(),
                    &bytes,
                    tenant_id,
                )
                .await
            }
        }
    })?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&plan)
    } else {
        serde_json::to_string(&plan)
    }
    .map_err(|e| CliError::IoError(format!("Failed to serialize plan: {}", e)))?;
    println!("{}", output);

    if !plan.unresolved.is_empty() {
        eprintln!(
            "Warning: {} divisions cannot be placed in the hierarchy and would be reported as failed",
            plan.unresolved.len()
        );
    }
    if !plan.missing_geometry.is_empty() {
        eprintln!(
            "Warning: {} divisions reference GeoJSON files missing from the archive",
            plan.missing_geometry.len()
        );
    }

    Ok(())
}

async fn run_plan<S: DivisionStore>(
    store: S,
    options: ImportOptions,
    bytes: &[u8],
    tenant_id: Uuid,
) -> Result<ImportPlan, CliError> {
    store.initialize().await?;
    let importer = DivisionImporter::with_options(store, options);
    Ok(importer.plan(bytes, tenant_id).await?)
}
