//! Archive import command

use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::error::CliError;
use crate::database::{DatabaseBackendType, DivisionStore, InMemoryBackend};
use crate::import::{DivisionImporter, ImportOptions, ImportResponse, UnresolvedPolicy};

use super::{load_config, open_duckdb, parse_tenant, read_archive};

/// Import command arguments
#[derive(Debug, Clone)]
pub struct ImportArgs {
    /// Zip archive holding the manifest and GeoJSON files
    pub archive: PathBuf,
    /// Tenant the divisions belong to
    pub tenant: String,
    /// Workspace path
    pub workspace: PathBuf,
    /// Overrides `import.unresolved_rows` from the config
    pub on_unresolved: Option<String>,
    /// Pretty-print the JSON response
    pub pretty: bool,
}

/// Import an archive into the workspace database and print the response
pub fn handle_import(args: &ImportArgs) -> Result<(), CliError> {
    let workspace_path = &args.workspace;
    let tenant_id = parse_tenant(&args.tenant)?;
    let mut config = load_config(workspace_path)?;

    if let Some(policy) = &args.on_unresolved {
        config.import.unresolved_rows = policy
            .parse::<UnresolvedPolicy>()
            .map_err(CliError::InvalidArgument)?;
    }

    let bytes = read_archive(&args.archive)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    let response = rt.block_on(async {
        match config.database.backend {
            DatabaseBackendType::DuckDB => {
                let store = open_duckdb(&config, workspace_path)?;
                run_import(store, config.import.clone(), &bytes, tenant_id).await
            }
            DatabaseBackendType::Memory => {
                run_import(
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
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .map_err(|e| CliError::IoError(format!("Failed to serialize response: {}", e)))?;
    println!("{}", output);

    match response.error {
        Some(error) => Err(CliError::InvalidArgument(format!(
            "Import of {} rejected: {}",
            args.archive.display(),
            error
        ))),
        None => Ok(()),
    }
}

async fn run_import<S: DivisionStore>(
    store: S,
    options: ImportOptions,
    bytes: &[u8],
    tenant_id: Uuid,
) -> Result<ImportResponse, CliError> {
    store.initialize().await?;
    let importer = DivisionImporter::with_options(store, options);
    Ok(ImportResponse::from(
        importer.import_archive(bytes, tenant_id).await,
    ))
}
