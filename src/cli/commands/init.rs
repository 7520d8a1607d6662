//! Workspace initialization command
//!
//! Writes `.divisions.toml` and, for DuckDB, creates the database schema.

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::database::{
    DatabaseBackendType, DivisionStore, DivisionsConfig, config::CONFIG_FILENAME,
};

use super::open_duckdb;

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Workspace path
    pub workspace: PathBuf,
    /// Database backend (duckdb, memory)
    pub backend: String,
    /// Overwrite an existing configuration
    pub force: bool,
}

/// Initialize a workspace
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    let workspace_path = &args.workspace;

    let backend: DatabaseBackendType = args
        .backend
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    if DivisionsConfig::exists(workspace_path) && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists in {}. Use --force to overwrite.",
            CONFIG_FILENAME,
            workspace_path.display()
        )));
    }

    std::fs::create_dir_all(workspace_path)
        .map_err(|e| CliError::IoError(format!("Failed to create workspace: {}", e)))?;

    let config = DivisionsConfig::with_backend(backend);
    config.save(workspace_path)?;
    println!(
        "Wrote {}",
        workspace_path.join(CONFIG_FILENAME).display()
    );

    if backend == DatabaseBackendType::DuckDB {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let store = open_duckdb(&config, workspace_path)?;
            store.initialize().await?;
            println!(
                "Initialized DuckDB database at {}",
                config.get_duckdb_path(workspace_path).display()
            );
            Ok::<(), CliError>(())
        })?;
    } else {
        println!("Using the in-memory backend; imported divisions are not persisted");
    }

    Ok(())
}
