//! Workspace configuration
//!
//! `.divisions.toml` holds a `[database]` section choosing the store and an
//! `[import]` section with [`ImportOptions`]. A few keys can be overridden
//! from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{DatabaseError, DatabaseResult};
use crate::import::{ImportOptions, UnresolvedPolicy};

/// Database file used when `database.path` is empty
pub const DEFAULT_DUCKDB_FILENAME: &str = ".divisions.duckdb";

pub const CONFIG_FILENAME: &str = ".divisions.toml";

pub const ENV_DB_BACKEND: &str = "DIVISIONS_DB_BACKEND";
pub const ENV_DUCKDB_PATH: &str = "DIVISIONS_DUCKDB_PATH";
pub const ENV_UNRESOLVED_ROWS: &str = "DIVISIONS_UNRESOLVED_ROWS";
pub const ENV_MAX_LEVELS: &str = "DIVISIONS_MAX_LEVELS";

/// Where divisions are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendType {
    /// Process-local store, discarded on exit
    Memory,
    #[default]
    DuckDB,
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(DatabaseBackendType::Memory),
            "duckdb" => Ok(DatabaseBackendType::DuckDB),
            _ => Err(format!(
                "Unknown database backend: {}. Use 'memory' or 'duckdb'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::Memory => write!(f, "memory"),
            DatabaseBackendType::DuckDB => write!(f, "duckdb"),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub backend: DatabaseBackendType,

    /// DuckDB file, relative to the workspace unless absolute
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Contents of `.divisions.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DivisionsConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub import: ImportOptions,
}

impl DivisionsConfig {
    /// Default configuration for the given backend
    pub fn with_backend(backend: DatabaseBackendType) -> Self {
        Self {
            database: DatabaseSection {
                backend,
                path: String::new(),
            },
            ..Default::default()
        }
    }

    /// Load `.divisions.toml` from a workspace, or defaults when it is absent
    ///
    /// Environment overrides are applied either way.
    pub fn load(workspace_path: &Path) -> DatabaseResult<Self> {
        let config_path = workspace_path.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| DatabaseError::IoError(format!("Failed to read config: {}", e)))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(content: &str) -> DatabaseResult<Self> {
        toml::from_str(content)
            .map_err(|e| DatabaseError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Write `.divisions.toml` into a workspace
    pub fn save(&self, workspace_path: &Path) -> DatabaseResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            DatabaseError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(workspace_path.join(CONFIG_FILENAME), content)
            .map_err(|e| DatabaseError::IoError(format!("Failed to write config: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var(ENV_DB_BACKEND)
            && let Ok(backend_type) = backend.parse()
        {
            self.database.backend = backend_type;
        }

        if let Ok(path) = std::env::var(ENV_DUCKDB_PATH) {
            self.database.path = path;
        }

        if let Ok(policy) = std::env::var(ENV_UNRESOLVED_ROWS)
            && let Ok(policy) = policy.parse::<UnresolvedPolicy>()
        {
            self.import.unresolved_rows = policy;
        }

        if let Ok(levels) = std::env::var(ENV_MAX_LEVELS)
            && let Ok(levels) = levels.parse()
        {
            self.import.max_levels = levels;
        }
    }

    /// Resolve the DuckDB file for a workspace
    pub fn get_duckdb_path(&self, workspace_path: &Path) -> PathBuf {
        if self.database.path.is_empty() {
            workspace_path.join(DEFAULT_DUCKDB_FILENAME)
        } else {
            // `join` keeps absolute paths as they are
            workspace_path.join(&self.database.path)
        }
    }

    pub fn exists(workspace_path: &Path) -> bool {
        workspace_path.join(CONFIG_FILENAME).exists()
    }

    /// A workspace is initialized once it has a config and, for DuckDB, a database file
    pub fn is_initialized(workspace_path: &Path) -> bool {
        if !Self::exists(workspace_path) {
            return false;
        }

        match Self::load(workspace_path) {
            Ok(config) => match config.database.backend {
                DatabaseBackendType::DuckDB => config.get_duckdb_path(workspace_path).exists(),
                DatabaseBackendType::Memory => true,
            },
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_fills_defaults() {
        let toml = r#"
[database]
backend = "memory"

[import]
unresolved_rows = "skip"
max_levels = 12
"#;
        let config = DivisionsConfig::parse(toml).unwrap();
        assert_eq!(config.database.backend, DatabaseBackendType::Memory);
        assert_eq!(config.import.unresolved_rows, UnresolvedPolicy::Skip);
        assert_eq!(config.import.max_levels, 12);
        assert_eq!(config.import.progress_interval, 10);

        let empty = DivisionsConfig::parse("").unwrap();
        assert_eq!(empty.database.backend, DatabaseBackendType::DuckDB);
        assert_eq!(empty.import, ImportOptions::default());
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let toml = "[import]\nunresolved_rows = \"ignore\"\n";
        assert!(matches!(
            DivisionsConfig::parse(toml),
            Err(DatabaseError::ConfigError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut config = DivisionsConfig::with_backend(DatabaseBackendType::DuckDB);
        config.database.path = "my-db.duckdb".to_string();
        config.import.max_levels = 7;

        config.save(dir.path()).unwrap();
        assert!(DivisionsConfig::exists(dir.path()));

        let loaded = DivisionsConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.database.path, "my-db.duckdb");
        assert_eq!(loaded.import.max_levels, 7);
        assert!(!DivisionsConfig::is_initialized(dir.path()));
    }

    #[test]
    fn test_memory_workspace_is_initialized_by_config_alone() {
        let dir = tempdir().unwrap();
        DivisionsConfig::with_backend(DatabaseBackendType::Memory)
            .save(dir.path())
            .unwrap();
        assert!(DivisionsConfig::is_initialized(dir.path()));
    }

    #[test]
    fn test_get_duckdb_path() {
        let workspace = Path::new("/workspace");
        let mut config = DivisionsConfig::default();
        assert_eq!(
            config.get_duckdb_path(workspace),
            PathBuf::from("/workspace/.divisions.duckdb")
        );

        config.database.path = "relative.duckdb".to_string();
        assert_eq!(
            config.get_duckdb_path(workspace),
            PathBuf::from("/workspace/relative.duckdb")
        );

        config.database.path = "/data/divisions.duckdb".to_string();
        assert_eq!(
            config.get_duckdb_path(workspace),
            PathBuf::from("/data/divisions.duckdb")
        );
    }

    #[test]
    fn test_backend_type_from_str() {
        assert_eq!(
            "duckdb".parse::<DatabaseBackendType>().unwrap(),
            DatabaseBackendType::DuckDB
        );
        assert_eq!(
            "Memory".parse::<DatabaseBackendType>().unwrap(),
            DatabaseBackendType::Memory
        );
        assert!("postgres".parse::<DatabaseBackendType>().is_err());
    }
}
