//! Manifest row model
//!
//! One row of the CSV index shipped inside a division archive.

use serde::{Deserialize, Serialize};

use super::division::LocalizedName;

/// A parsed manifest row (transient; lives for one import run)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRow {
    /// Unique within the batch, never empty
    pub import_id: String,
    pub national_id: String,
    /// Empty for roots
    #[serde(default)]
    pub parent_import_id: String,
    /// Basename of the GeoJSON file, matched case-insensitively
    pub geodata_filename: String,
    /// Labels from every language column with a non-empty value
    #[serde(default)]
    pub name: LocalizedName,
    /// 1-based line number in the manifest (header is line 1)
    #[serde(default)]
    pub line: usize,
}

impl ManifestRow {
    /// The parent import id, or `None` for roots
    pub fn parent(&self) -> Option<&str> {
        if self.parent_import_id.is_empty() {
            None
        } else {
            Some(&self.parent_import_id)
        }
    }

    /// Check if this row declares no parent
    pub fn is_root(&self) -> bool {
        self.parent_import_id.is_empty()
    }
}
