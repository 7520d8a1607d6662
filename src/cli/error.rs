//! CLI-specific error types

use crate::database::DatabaseError;
use crate::import::ImportError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Invalid UUID format: {0}")]
    InvalidUuid(String),

    #[error("Import error: {0}")]
    ImportError(#[from] ImportError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for CliError {
    fn from(err: DatabaseError) -> Self {
        CliError::DatabaseError(err.to_string())
    }
}
