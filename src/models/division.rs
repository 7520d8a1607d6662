//! Administrative division models
//!
//! Defines the persisted division node and the record the importer hands to a
//! [`DivisionStore`](crate::database::DivisionStore) for an upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Localized label keyed by language code (`en`, `fr`, `ar`, ...)
pub type LocalizedName = BTreeMap<String, String>;

/// Axis-aligned envelope of a division geometry (WGS84 lon/lat)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check if this envelope contains a point
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if this envelope fully contains another one
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Check if two envelopes share at least one point
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Reject query envelopes that are empty or outside lon/lat range
    pub fn validate_query(&self) -> Result<(), String> {
        if self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(format!(
                "invalid bounding box [{}, {}, {}, {}]: min values must be less than max values",
                self.min_x, self.min_y, self.max_x, self.max_y
            ));
        }
        let in_range = |lon: f64, lat: f64| lon.abs() <= 180.0 && lat.abs() <= 90.0;
        if !in_range(self.min_x, self.min_y) || !in_range(self.max_x, self.max_y) {
            return Err(format!(
                "invalid bounding box [{}, {}, {}, {}]: longitude must be within ±180 and latitude within ±90",
                self.min_x, self.min_y, self.max_x, self.max_y
            ));
        }
        Ok(())
    }

    /// The envelope as a closed GeoJSON polygon
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[
                [self.min_x, self.min_y],
                [self.max_x, self.min_y],
                [self.max_x, self.max_y],
                [self.min_x, self.max_y],
                [self.min_x, self.min_y],
            ]]
        })
    }
}

/// How a stored envelope must relate to a query envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxRelation {
    /// The envelopes share at least one point
    #[default]
    Intersects,
    /// The stored envelope covers the query envelope
    Contains,
    /// The stored envelope lies inside the query envelope
    Within,
}

impl BoxRelation {
    pub fn holds(&self, stored: &BoundingBox, query: &BoundingBox) -> bool {
        match self {
            BoxRelation::Intersects => stored.intersects(query),
            BoxRelation::Contains => stored.contains(query),
            BoxRelation::Within => query.contains(stored),
        }
    }
}

/// A persisted administrative division
///
/// Every division belongs to exactly one tenant. `level` is 1 for roots and
/// `parent.level + 1` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionNode {
    /// Tenant-scoped identifier, generated on first insert
    pub id: Uuid,
    /// External, batch-stable identifier from the manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub name: LocalizedName,
    /// Raw GeoJSON document as found in the archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson: Option<serde_json::Value>,
    /// Repaired geometry (GeoJSON geometry object)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    pub level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DivisionNode {
    /// Check if this division is a root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Pick a display label, preferring the given languages in order and
    /// falling back to `en`, then to any available label.
    pub fn label(&self, langs: &[&str]) -> Option<&str> {
        langs
            .iter()
            .chain(std::iter::once(&"en"))
            .find_map(|lang| self.name.get(*lang))
            .or_else(|| self.name.values().next())
            .map(String::as_str)
    }
}

/// Field set written by an idempotent upsert keyed by `(tenant, import_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionRecord {
    pub import_id: String,
    pub national_id: String,
    pub parent_id: Option<Uuid>,
    pub name: LocalizedName,
    pub geojson: serde_json::Value,
    pub geometry: serde_json::Value,
    pub bounding_box: BoundingBox,
    pub level: i64,
}

/// Whether an upsert created a new division or mutated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOperation {
    Inserted,
    Updated,
}

impl std::fmt::Display for UpsertOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertOperation::Inserted => write!(f, "inserted"),
            UpsertOperation::Updated => write!(f, "updated"),
        }
    }
}

/// Outcome of a single committed upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub operation: UpsertOperation,
}
