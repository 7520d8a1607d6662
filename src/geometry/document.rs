//! GeoJSON document model
//!
//! A GeoJSON file in a division archive may hold a `FeatureCollection`, a
//! single `Feature` or a bare geometry. [`GeoJsonDocument`] classifies the
//! document once and exposes one extraction rule per shape:
//!
//! - `FeatureCollection` → geometry of the first feature
//! - `Feature` → its `geometry` member
//! - bare geometry → the document itself
//!
//! Geometry objects are decoded into `geo_types` and encoded back through
//! the `geojson` crate.

use geo_types::Geometry;
use serde_json::Value;

/// The nine GeoJSON `type` values accepted at the document root
pub const GEOJSON_TYPES: [&str; 9] = [
    "Feature",
    "FeatureCollection",
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiPolygon",
    "GeometryCollection",
];

/// Error classifying a GeoJSON document or extracting its geometry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoJsonError {
    #[error("missing 'type' property")]
    MissingType,
    #[error("unknown type '{0}'")]
    UnsupportedType(String),
    #[error("FeatureCollection has no features")]
    EmptyFeatureCollection,
    #[error("no geometry found")]
    NoGeometry,
}

/// Error decoding a GeoJSON geometry object
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("geometry is missing 'type'")]
    MissingType,
    #[error("'{0}' is not a geometry type")]
    UnsupportedType(String),
    #[error("invalid {kind}: {reason}")]
    Invalid { kind: String, reason: String },
    #[error("geometry is empty after repair")]
    Empty,
}

/// A classified GeoJSON document borrowing from the parsed JSON value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoJsonDocument<'a> {
    FeatureCollection { features: &'a [Value] },
    Feature { geometry: Option<&'a Value> },
    Geometry(&'a Value),
}

impl<'a> GeoJsonDocument<'a> {
    /// Classify a parsed document by its `type` member
    pub fn classify(document: &'a Value) -> Result<Self, GeoJsonError> {
        let kind = match document.get("type") {
            None | Some(Value::Null) => return Err(GeoJsonError::MissingType),
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(GeoJsonError::UnsupportedType(other.to_string())),
        };

        match kind {
            "FeatureCollection" => Ok(Self::FeatureCollection {
                features: document
                    .get("features")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            }),
            "Feature" => Ok(Self::Feature {
                geometry: non_null(document.get("geometry")),
            }),
            other if GEOJSON_TYPES.contains(&other) => Ok(Self::Geometry(document)),
            other => Err(GeoJsonError::UnsupportedType(other.to_string())),
        }
    }

    /// The geometry object to persist for this document
    pub fn extract_geometry(&self) -> Result<&'a Value, GeoJsonError> {
        match self {
            Self::FeatureCollection { features } => {
                let first = features
                    .first()
                    .ok_or(GeoJsonError::EmptyFeatureCollection)?;
                non_null(first.get("geometry")).ok_or(GeoJsonError::NoGeometry)
            }
            Self::Feature { geometry } => geometry.ok_or(GeoJsonError::NoGeometry),
            Self::Geometry(value) => Ok(value),
        }
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Decode a GeoJSON geometry object
pub fn geometry_from_geojson(value: &Value) -> Result<Geometry<f64>, GeometryError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeometryError::MissingType)?;
    if matches!(kind, "Feature" | "FeatureCollection") || !GEOJSON_TYPES.contains(&kind) {
        return Err(GeometryError::UnsupportedType(kind.to_string()));
    }

    let invalid = |reason: String| GeometryError::Invalid {
        kind: kind.to_string(),
        reason,
    };
    let parsed = geojson::Geometry::from_json_value(value.clone())
        .map_err(|e| invalid(e.to_string()))?;
    if !has_planar_positions(&parsed.value) {
        return Err(invalid("position needs at least two numbers".to_string()));
    }

    parsed
        .try_into()
        .map_err(|e: geojson::Error| invalid(e.to_string()))
}

fn has_planar_positions(value: &geojson::Value) -> bool {
    use geojson::Value as G;
    match value {
        G::Point(p) => p.len() >= 2,
        G::MultiPoint(ps) | G::LineString(ps) => ps.iter().all(|p| p.len() >= 2),
        G::MultiLineString(ls) | G::Polygon(ls) => ls.iter().flatten().all(|p| p.len() >= 2),
        G::MultiPolygon(ps) => ps.iter().flatten().flatten().all(|p| p.len() >= 2),
        G::GeometryCollection(gs) => gs.iter().all(|g| has_planar_positions(&g.value)),
    }
}

/// Encode a geometry as a GeoJSON geometry object
pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> Value {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    serde_json::Value::Object(geojson::JsonObject::from(&geometry))
}
