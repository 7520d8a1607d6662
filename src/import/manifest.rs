//! Manifest parser
//!
//! Parses the CSV index of a division archive. Header names are exact and
//! case-sensitive: `id`, `parent`, `geodata` and `national_id` are required,
//! and every other column is a language column (`en` is mandatory).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::ImportError;
use crate::models::{LocalizedName, ManifestRow};

/// Column holding the import id
pub const COLUMN_ID: &str = "id";
/// Column holding the parent's import id (empty for roots)
pub const COLUMN_PARENT: &str = "parent";
/// Column holding the geometry file name
pub const COLUMN_GEODATA: &str = "geodata";
/// Column holding the national identifier
pub const COLUMN_NATIONAL_ID: &str = "national_id";
/// Language column every manifest must carry
pub const REQUIRED_LANGUAGE: &str = "en";

/// Required, non-language columns
pub const REQUIRED_COLUMNS: [&str; 4] =
    [COLUMN_ID, COLUMN_PARENT, COLUMN_GEODATA, COLUMN_NATIONAL_ID];

static RE_LANGUAGE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}$").expect("Invalid regex"));

/// A manifest row that was dropped without failing the import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: usize,
    pub import_id: Option<String>,
    pub reason: String,
}

/// Parsed manifest: valid rows in file order plus an import-id index
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    rows: Vec<ManifestRow>,
    index: HashMap<String, usize>,
    languages: Vec<String>,
    skipped: Vec<SkippedRow>,
}

impl Manifest {
    /// Valid rows in file order
    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn get(&self, import_id: &str) -> Option<&ManifestRow> {
        self.index.get(import_id).map(|&i| &self.rows[i])
    }

    pub fn contains(&self, import_id: &str) -> bool {
        self.index.contains_key(import_id)
    }

    /// Language columns, in header order
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Rows dropped during parsing
    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// CSV manifest parser
pub struct ManifestParser;

impl ManifestParser {
    /// Parse manifest text
    ///
    /// Header problems, duplicate import ids and a manifest with no usable
    /// row are fatal. Rows with an empty `id` are dropped silently; rows
    /// without `geodata` or `national_id` are dropped with a warning.
    pub fn parse(text: &str) -> Result<Manifest, ImportError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ImportError::Csv(format!("Failed to read headers: {}", e)))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let columns = Self::validate_headers(&headers)?;
        let languages: Vec<String> = columns
            .languages
            .iter()
            .map(|&i| headers[i].clone())
            .collect();

        for lang in languages.iter().filter(|l| !RE_LANGUAGE_CODE.is_match(l)) {
            tracing::warn!(
                "Manifest column '{}' does not look like a language code; treating it as one",
                lang
            );
        }

        let mut manifest = Manifest {
            languages,
            ..Default::default()
        };

        for (n, result) in reader.records().enumerate() {
            let record =
                result.map_err(|e| ImportError::Csv(format!("Failed to read record: {}", e)))?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(n + 2);
            let field = |i: usize| record.get(i).unwrap_or("").to_string();

            let import_id = field(columns.id);
            if import_id.is_empty() {
                manifest.skipped.push(SkippedRow {
                    line,
                    import_id: None,
                    reason: "empty id".to_string(),
                });
                continue;
            }

            let geodata_filename = field(columns.geodata);
            let national_id = field(columns.national_id);
            let missing = match (geodata_filename.is_empty(), national_id.is_empty()) {
                (true, true) => Some("missing geodata and national_id"),
                (true, false) => Some("missing geodata"),
                (false, true) => Some("missing national_id"),
                (false, false) => None,
            };
            if let Some(reason) = missing {
                tracing::warn!("Skipping manifest row {} (line {}): {}", import_id, line, reason);
                manifest.skipped.push(SkippedRow {
                    line,
                    import_id: Some(import_id),
                    reason: reason.to_string(),
                });
                continue;
            }

            if let Some(&first) = manifest.index.get(&import_id) {
                return Err(ImportError::DuplicateImportId {
                    import_id,
                    first_line: manifest.rows[first].line,
                    line,
                });
            }

            let name: LocalizedName = columns
                .languages
                .iter()
                .filter_map(|&i| {
                    let value = record.get(i).unwrap_or("");
                    (!value.is_empty()).then(|| (headers[i].clone(), value.to_string()))
                })
                .collect();

            manifest.index.insert(import_id.clone(), manifest.rows.len());
            manifest.rows.push(ManifestRow {
                import_id,
                national_id,
                parent_import_id: field(columns.parent),
                geodata_filename,
                name,
                line,
            });
        }

        if manifest.rows.is_empty() {
            return Err(ImportError::NoValidRows);
        }

        Ok(manifest)
    }

    fn validate_headers(headers: &[String]) -> Result<ColumnIndexes, ImportError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| position(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        if position(REQUIRED_LANGUAGE).is_none() {
            return Err(ImportError::MissingLanguageColumn);
        }

        let languages = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty() && !REQUIRED_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .collect();

        Ok(ColumnIndexes {
            id: position(COLUMN_ID).unwrap_or_default(),
            parent: position(COLUMN_PARENT).unwrap_or_default(),
            geodata: position(COLUMN_GEODATA).unwrap_or_default(),
            national_id: position(COLUMN_NATIONAL_ID).unwrap_or_default(),
            languages,
        })
    }
}

struct ColumnIndexes {
    id: usize,
    parent: usize,
    geodata: usize,
    national_id: usize,
    languages: Vec<usize>,
}
