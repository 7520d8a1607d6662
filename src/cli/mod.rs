//! Command-line interface for the `divisions` binary

pub mod commands;
pub mod error;

pub use error::CliError;
