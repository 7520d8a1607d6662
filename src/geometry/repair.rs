//! Geometry repair and envelopes
//!
//! Source boundaries are frequently dirty: repeated vertices, unclosed rings,
//! slivers, wrong winding order. [`make_valid`] repairs what can be repaired
//! and drops what collapses; self-intersections are kept as they are so a
//! minor topology error never rejects a division. [`derive`] chains decoding,
//! repair and the envelope computation for the importer.

use geo::BoundingRect;
use geo::orient::{Direction, Orient};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Polygon,
};
use serde_json::Value;

use super::document::{GeometryError, geometry_from_geojson, geometry_to_geojson};
use crate::models::BoundingBox;

/// Repaired geometry plus its envelope
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedGeometry {
    pub geometry: Geometry<f64>,
    pub bounding_box: BoundingBox,
}

impl DerivedGeometry {
    /// The repaired geometry as a GeoJSON geometry object
    pub fn to_geojson(&self) -> Value {
        geometry_to_geojson(&self.geometry)
    }
}

/// Decode, repair and envelope a GeoJSON geometry object
pub fn derive(value: &Value) -> Result<DerivedGeometry, GeometryError> {
    let geometry = make_valid(geometry_from_geojson(value)?).ok_or(GeometryError::Empty)?;
    let bounding_box = envelope(&geometry).ok_or(GeometryError::Empty)?;
    Ok(DerivedGeometry {
        geometry,
        bounding_box,
    })
}

/// Repair a geometry, returning `None` when nothing usable remains
pub fn make_valid(geometry: Geometry<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(p) => finite(&p.0).then_some(Geometry::Point(p)),
        Geometry::Line(l) => make_valid(Geometry::LineString(LineString::from(l))),
        Geometry::LineString(ls) => repair_line(ls).map(Geometry::LineString),
        Geometry::Polygon(p) => repair_polygon(p).map(Geometry::Polygon),
        Geometry::MultiPoint(mp) => {
            let points: Vec<_> = mp.0.into_iter().filter(|p| finite(&p.0)).collect();
            (!points.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(points)))
        }
        Geometry::MultiLineString(mls) => {
            let lines: Vec<_> = mls.0.into_iter().filter_map(repair_line).collect();
            (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines)))
        }
        Geometry::MultiPolygon(mp) => {
            let polygons: Vec<_> = mp.0.into_iter().filter_map(repair_polygon).collect();
            (!polygons.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        Geometry::GeometryCollection(gc) => {
            let members: Vec<_> = gc.0.into_iter().filter_map(make_valid).collect();
            (!members.is_empty())
                .then(|| Geometry::GeometryCollection(GeometryCollection::from(members)))
        }
        Geometry::Rect(r) => make_valid(Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => make_valid(Geometry::Polygon(t.to_polygon())),
    }
}

/// Envelope of a geometry
pub fn envelope(geometry: &Geometry<f64>) -> Option<BoundingBox> {
    let rect = geometry.bounding_rect()?;
    Some(BoundingBox::new(
        rect.min().x,
        rect.min().y,
        rect.max().x,
        rect.max().y,
    ))
}

fn finite(c: &Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

fn dedup(coords: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let mut coords: Vec<_> = coords.into_iter().filter(finite).collect();
    coords.dedup();
    coords
}

fn repair_line(ls: LineString<f64>) -> Option<LineString<f64>> {
    let coords = dedup(ls.0);
    (coords.len() >= 2).then(|| LineString::new(coords))
}

/// Closed ring, or `None` if its vertices cannot enclose an area
fn repair_ring(ls: LineString<f64>) -> Option<LineString<f64>> {
    let mut coords = dedup(ls.0);
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 || collinear(&coords) {
        return None;
    }
    coords.push(coords[0]);
    Some(LineString::new(coords))
}

fn repair_polygon(polygon: Polygon<f64>) -> Option<Polygon<f64>> {
    let (exterior, interiors) = polygon.into_inner();
    let exterior = repair_ring(exterior)?;
    let interiors = interiors.into_iter().filter_map(repair_ring).collect();
    Some(Polygon::new(exterior, interiors).orient(Direction::Default))
}

fn collinear(coords: &[Coord<f64>]) -> bool {
    let origin = coords[0];
    let Some(direction) = coords.iter().find(|c| **c != origin).map(|c| *c - origin) else {
        return true;
    };
    coords.iter().all(|c| {
        let v = *c - origin;
        direction.x * v.y - direction.y * v.x == 0.0
    })
}

#[cfg(test)]
fn shoelace(coords: &[Coord<f64>]) -> f64 {
    let n = coords.len();
    (0..n)
        .map(|i| {
            let a = coords[i];
            let b = coords[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}
