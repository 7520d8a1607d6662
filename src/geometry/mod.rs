//! Geometry functionality
//!
//! - GeoJSON document classification and geometry extraction
//! - GeoJSON ⇄ `geo_types` conversion through the `geojson` crate
//! - Geometry repair ("make valid") and envelopes

pub mod document;
pub mod repair;

pub use document::{
    GEOJSON_TYPES, GeoJsonDocument, GeoJsonError, GeometryError, geometry_from_geojson,
    geometry_to_geojson,
};
pub use repair::{DerivedGeometry, derive, envelope, make_valid};
