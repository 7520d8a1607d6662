//! Archive reader
//!
//! Unpacks an in-memory zip archive once and serves entries by path. The
//! manifest is the single file with the manifest extension; everything else
//! is looked up on demand by the node importer.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read};

use super::ImportError;
use super::options::has_extension;

/// Resource-fork folder added by the macOS archiver
const MACOS_METADATA_DIR: &str = "__MACOSX/";

/// A file unpacked from the archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Full path inside the archive
    pub path: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    /// Entry contents as UTF-8 text
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }
}

/// Unpacked archive contents, in archive order
#[derive(Debug)]
pub struct ArchiveReader {
    entries: Vec<ArchiveEntry>,
    by_path: HashMap<String, usize>,
    sha256: String,
}

impl ArchiveReader {
    /// Unpack an archive held in memory
    ///
    /// Archives larger than `max_bytes` are rejected before unpacking, and
    /// unpacking stops once the entries add up to more than `max_unpacked`
    /// bytes. Entry sizes declared in the archive are not trusted.
    /// Directory entries and `__MACOSX/` metadata are skipped.
    pub fn from_bytes(bytes: &[u8], max_bytes: u64, max_unpacked: u64) -> Result<Self, ImportError> {
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(ImportError::ArchiveTooLarge {
                size,
                limit: max_bytes,
            });
        }

        let sha256 = format!("{:x}", Sha256::digest(bytes));

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ImportError::Archive(format!("Failed to open archive: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut by_path = HashMap::with_capacity(archive.len());
        let mut remaining = max_unpacked;
        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| {
                ImportError::Archive(format!("Failed to read archive entry {}: {}", i, e))
            })?;
            let path = file.name().to_string();
            if file.is_dir() || path.starts_with(MACOS_METADATA_DIR) {
                continue;
            }

            // One byte past the budget is enough to tell that it was exceeded
            let mut data = Vec::new();
            file.take(remaining.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|e| {
                    ImportError::Archive(format!("Failed to read archive entry {}: {}", path, e))
                })?;
            remaining = remaining
                .checked_sub(data.len() as u64)
                .ok_or(ImportError::UnpackedTooLarge {
                    limit: max_unpacked,
                })?;

            by_path.insert(path.clone(), entries.len());
            entries.push(ArchiveEntry { path, data });
        }

        Ok(Self {
            entries,
            by_path,
            sha256,
        })
    }

    /// Hex SHA-256 of the raw archive bytes
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Number of file entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File paths in archive order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// Get an entry by its exact path
    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    /// Find the single manifest file
    pub fn manifest(&self, extension: &str) -> Result<&ArchiveEntry, ImportError> {
        let mut manifests = self
            .entries
            .iter()
            .filter(|e| has_extension(&e.path, extension));

        let Some(first) = manifests.next() else {
            return Err(ImportError::MissingManifest(extension.to_string()));
        };

        let rest: Vec<&ArchiveEntry> = manifests.collect();
        if !rest.is_empty() {
            let mut paths = vec![first.path.clone()];
            paths.extend(rest.iter().map(|e| e.path.clone()));
            return Err(ImportError::MultipleManifests(paths));
        }

        Ok(first)
    }
}
