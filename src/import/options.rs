//! Import tuning knobs
//!
//! `ImportOptions` is also the `[import]` section of `.divisions.toml`.

use serde::{Deserialize, Serialize};

/// Default archive size limit (50 MiB)
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;

/// Default bound on the total unpacked size of an archive (512 MiB)
pub const DEFAULT_MAX_UNPACKED_BYTES: u64 = 512 * 1024 * 1024;

/// Default bound on hierarchy depth
pub const DEFAULT_MAX_LEVELS: usize = 100;

/// What to do with rows whose parent chain never reaches a root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Abort the run before any write (default)
    #[default]
    Fail,
    /// Import the resolved levels and report unresolved rows as failed
    Skip,
}

impl std::str::FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(UnresolvedPolicy::Fail),
            "skip" => Ok(UnresolvedPolicy::Skip),
            _ => Err(format!(
                "Unknown unresolved-row policy: {}. Use 'fail' or 'skip'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedPolicy::Fail => write!(f, "fail"),
            UnresolvedPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Options for a division import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Handling of cyclic or never-rooted rows
    #[serde(default)]
    pub unresolved_rows: UnresolvedPolicy,

    /// Maximum number of hierarchy levels below the roots
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,

    /// Archives larger than this are rejected before unpacking
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    /// Unpacking stops once the entries add up to more than this
    #[serde(default = "default_max_unpacked_bytes")]
    pub max_unpacked_bytes: u64,

    /// Extension of the manifest file (case-insensitive, without dot)
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,

    /// Extension of geometry files (case-insensitive, without dot)
    #[serde(default = "default_geometry_extension")]
    pub geometry_extension: String,

    /// Log progress every N rows within a level
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_max_levels() -> usize {
    DEFAULT_MAX_LEVELS
}

fn default_max_archive_bytes() -> u64 {
    DEFAULT_MAX_ARCHIVE_BYTES
}

fn default_max_unpacked_bytes() -> u64 {
    DEFAULT_MAX_UNPACKED_BYTES
}

fn default_manifest_extension() -> String {
    "csv".to_string()
}

fn default_geometry_extension() -> String {
    "geojson".to_string()
}

fn default_progress_interval() -> usize {
    10
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            unresolved_rows: UnresolvedPolicy::default(),
            max_levels: default_max_levels(),
            max_archive_bytes: default_max_archive_bytes(),
            max_unpacked_bytes: default_max_unpacked_bytes(),
            manifest_extension: default_manifest_extension(),
            geometry_extension: default_geometry_extension(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl ImportOptions {
    /// Set the unresolved-row policy
    pub fn with_unresolved_rows(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved_rows = policy;
        self
    }

    /// Set the archive size limit
    pub fn with_max_archive_bytes(mut self, limit: u64) -> Self {
        self.max_archive_bytes = limit;
        self
    }

    /// Set the limit on the total unpacked size
    pub fn with_max_unpacked_bytes(mut self, limit: u64) -> Self {
        self.max_unpacked_bytes = limit;
        self
    }
}

/// Case-insensitive extension check on an archive path
pub(crate) fn has_extension(path: &str, extension: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
}
