//! Geometry file lookup
//!
//! Manifest rows name their geometry file by basename only, so geometry
//! files are indexed by lowercase basename wherever they sit in the archive.

use std::collections::HashMap;

use super::options::has_extension;

/// Case-insensitive, basename-only index of geometry files
///
/// Collision policy: when two files share a basename (in different
/// directories, or differing only in case), the one appearing later in
/// archive order wins. Shadowed paths are kept in [`collisions`](Self::collisions)
/// so callers can report them.
#[derive(Debug, Clone, Default)]
pub struct GeometryLookup {
    files: HashMap<String, String>,
    collisions: Vec<LookupCollision>,
}

/// A geometry path hidden by a later file with the same basename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupCollision {
    pub key: String,
    pub shadowed: String,
    pub winner: String,
}

impl GeometryLookup {
    /// Index every path ending in `extension`, in the order given
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a str>, extension: &str) -> Self {
        let mut lookup = Self::default();
        for path in paths.into_iter().filter(|p| has_extension(p, extension)) {
            let key = Self::key(path);
            if let Some(shadowed) = lookup.files.insert(key.clone(), path.to_string()) {
                tracing::warn!(
                    "Geometry file {} shadows {} (same basename '{}')",
                    path,
                    shadowed,
                    key
                );
                lookup.collisions.push(LookupCollision {
                    key,
                    shadowed,
                    winner: path.to_string(),
                });
            }
        }
        lookup
    }

    /// Normalised lookup key for a file name or path
    pub fn key(name: &str) -> String {
        name.rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .trim()
            .to_lowercase()
    }

    /// Archive path for a manifest file name
    pub fn resolve(&self, filename: &str) -> Option<&str> {
        self.files.get(&Self::key(filename)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn collisions(&self) -> &[LookupCollision] {
        &self.collisions
    }
}
