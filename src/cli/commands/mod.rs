//! CLI command implementations

pub mod import;
pub mod init;
pub mod plan;
pub mod tree;

use std::path::Path;
use uuid::Uuid;

use crate::cli::error::CliError;
use crate::database::{DivisionsConfig, DuckDBBackend};

/// Parse a `--tenant` argument
pub(crate) fn parse_tenant(value: &str) -> Result<Uuid, CliError> {
    Uuid::parse_str(value).map_err(|_| CliError::InvalidUuid(value.to_string()))
}

/// Read an archive from disk
pub(crate) fn read_archive(path: &Path) -> Result<Vec<u8>, CliError> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))
}

/// Load the workspace configuration, requiring `divisions init` to have run
pub(crate) fn load_config(workspace: &Path) -> Result<DivisionsConfig, CliError> {
    let config = DivisionsConfig::load(workspace)
        .map_err(|e| CliError::IoError(format!("Failed to load config: {}", e)))?;

    if !DivisionsConfig::is_initialized(workspace) {
        return Err(CliError::InvalidArgument(
            "Database not initialized. Run 'divisions init' first.".to_string(),
        ));
    }

    Ok(config)
}

pub(crate) fn open_duckdb(
    config: &DivisionsConfig,
    workspace: &Path,
) -> Result<DuckDBBackend, CliError> {
    let db_path = config.get_duckdb_path(workspace);
    DuckDBBackend::new(&db_path)
        .map_err(|e| CliError::IoError(format!("Failed to open database: {}", e)))
}
