#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the map analysis pipeline.
//!
//! Features and boundaries are carried as [`geo`] geometries so that the
//! clipping stage can hand them straight to `geo`'s boolean operations.
//! Renderer descriptors, styles and legend entries are plain `serde` types
//! so they can be read from layer metadata and written into reports.

mod renderer;
mod style;

use std::collections::BTreeMap;

use geo::{
    Area, BoundingRect, Coord, Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use renderer::{ClassBreak, RendererDescriptor, RendererKind, UniqueValueInfo};
pub use style::{Rgba, Style};

/// Fewest segments used to approximate a buffered click.
pub const MIN_BUFFER_SEGMENTS: usize = 8;

/// Errors raised while building model values from raw input.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A `GeoJSON` geometry could not be converted.
    #[error("Geometry error: {message}")]
    Geometry {
        /// Description of what went wrong.
        message: String,
    },

    /// A feature carried no geometry.
    #[error("Feature has no geometry")]
    MissingGeometry,

    /// The geometry cannot be used as an analysis boundary.
    #[error("Unsupported boundary geometry: {kind}")]
    UnsupportedBoundary {
        /// Geometry type that was supplied.
        kind: String,
    },

    /// The boundary has no polygons or points.
    #[error("Boundary is empty")]
    EmptyBoundary,
}

/// A scalar attribute value.
///
/// Equality is strict: `Number(1.0)` never equals `Text("1")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any numeric value.
    Number(f64),
    /// Any text value.
    Text(String),
}

impl AttributeValue {
    /// The numeric value, if this is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is [`AttributeValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&serde_json::Value> for AttributeValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Field name -> value.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Declared type of a layer attribute field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// String field.
    Text,
    /// Integer field of any width.
    Integer,
    /// Floating-point field.
    Double,
    /// Anything else (dates, ids, blobs); values are compared as given.
    #[default]
    Other,
}

impl FieldType {
    /// Whether values of this field are numbers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

/// Geometry type of a feature layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GeometryKind {
    /// Point or multipoint layer.
    Point,
    /// Polygon layer.
    Polygon,
    /// Line layer.
    Polyline,
    /// 3D multipatch layer.
    Multipatch,
    /// Anything the pipeline does not recognise.
    Unknown(String),
}

impl GeometryKind {
    /// Parses either an Esri geometry type (`esriGeometryPolygon`) or a
    /// plain name (`polygon`). Never fails; unrecognised names become
    /// [`GeometryKind::Unknown`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let plain = trimmed.strip_prefix("esriGeometry").unwrap_or(trimmed);

        match plain.to_ascii_lowercase().as_str() {
            "point" | "multipoint" => Self::Point,
            "polygon" | "multipolygon" => Self::Polygon,
            "polyline" | "linestring" | "multilinestring" => Self::Polyline,
            "multipatch" => Self::Multipatch,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }
}

impl From<String> for GeometryKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<GeometryKind> for String {
    fn from(value: GeometryKind) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Polygon => write!(f, "polygon"),
            Self::Polyline => write!(f, "polyline"),
            Self::Multipatch => write!(f, "multipatch"),
            Self::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// Short type name of a geometry, for messages.
#[must_use]
pub const fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// A single queried feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Attribute values keyed by field name.
    pub attributes: Attributes,
    /// Feature geometry.
    pub geometry: Geometry<f64>,
    /// Spatial reference id of `geometry`, if known.
    pub wkid: Option<u32>,
}

impl Feature {
    /// Creates a feature.
    #[must_use]
    pub const fn new(attributes: Attributes, geometry: Geometry<f64>, wkid: Option<u32>) -> Self {
        Self {
            attributes,
            geometry,
            wkid,
        }
    }

    /// Converts a `GeoJSON` feature, copying its properties as attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the feature has no geometry or the
    /// geometry cannot be converted.
    pub fn from_geojson(feature: geojson::Feature, wkid: Option<u32>) -> Result<Self, ModelError> {
        let geometry = feature.geometry.ok_or(ModelError::MissingGeometry)?;
        let geometry: Geometry<f64> =
            geometry
                .try_into()
                .map_err(|e: geojson::Error| ModelError::Geometry {
                    message: e.to_string(),
                })?;

        let attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let value = AttributeValue::from(&value);
                (key, value)
            })
            .collect();

        Ok(Self::new(attributes, geometry, wkid))
    }

    /// Looks up an attribute.
    #[must_use]
    pub fn attribute(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes.get(field)
    }
}

/// The user-selected analysis region.
///
/// One boundary is active at a time; a new selection replaces it.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// A drawn or buffered polygonal region.
    Area(MultiPolygon<f64>),
    /// A bare point selection.
    Points(MultiPoint<f64>),
}

impl Boundary {
    /// Builds a boundary from a drawn geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedBoundary`] for lines and
    /// collections, and [`ModelError::EmptyBoundary`] for empty multi
    /// geometries.
    pub fn from_geometry(geometry: Geometry<f64>) -> Result<Self, ModelError> {
        let boundary = match geometry {
            Geometry::Polygon(polygon) => Self::Area(MultiPolygon::new(vec![polygon])),
            Geometry::MultiPolygon(mp) => Self::Area(mp),
            Geometry::Rect(rect) => Self::Area(MultiPolygon::new(vec![rect.to_polygon()])),
            Geometry::Triangle(triangle) => {
                Self::Area(MultiPolygon::new(vec![triangle.to_polygon()]))
            }
            Geometry::Point(point) => Self::Points(MultiPoint::new(vec![point])),
            Geometry::MultiPoint(points) => Self::Points(points),
            other => {
                return Err(ModelError::UnsupportedBoundary {
                    kind: geometry_type_name(&other).to_string(),
                });
            }
        };

        if boundary.is_empty() {
            return Err(ModelError::EmptyBoundary);
        }

        Ok(boundary)
    }

    /// Parses a boundary from `GeoJSON` text.
    ///
    /// Accepts a bare geometry, a feature, or a feature collection whose
    /// polygons (or points) are merged into one boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the text is not `GeoJSON` or holds no
    /// usable geometry.
    pub fn from_geojson_str(text: &str) -> Result<Self, ModelError> {
        let geojson: geojson::GeoJson = text.parse().map_err(|e: geojson::Error| {
            ModelError::Geometry {
                message: e.to_string(),
            }
        })?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            geojson::GeoJson::Geometry(geometry) => vec![geometry],
            geojson::GeoJson::Feature(feature) => {
                vec![feature.geometry.ok_or(ModelError::MissingGeometry)?]
            }
            geojson::GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .filter_map(|feature| feature.geometry)
                .collect(),
        };

        let mut polygons = Vec::new();
        let mut points = Vec::new();
        for geometry in geometries {
            let geometry: Geometry<f64> =
                geometry
                    .try_into()
                    .map_err(|e: geojson::Error| ModelError::Geometry {
                        message: e.to_string(),
                    })?;
            match Self::from_geometry(geometry)? {
                Self::Area(mp) => polygons.extend(mp.0),
                Self::Points(mp) => points.extend(mp.0),
            }
        }

        match (polygons.is_empty(), points.is_empty()) {
            (false, true) => Ok(Self::Area(MultiPolygon::new(polygons))),
            (true, false) => Ok(Self::Points(MultiPoint::new(points))),
            (true, true) => Err(ModelError::EmptyBoundary),
            (false, false) => Err(ModelError::UnsupportedBoundary {
                kind: "mixed points and polygons".to_string(),
            }),
        }
    }

    /// Approximates a clicked point buffered by `radius` as a regular
    /// polygon with at least [`MIN_BUFFER_SEGMENTS`] sides.
    ///
    /// A zero, negative or non-finite radius yields a bare point boundary.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn around_point(center: Point<f64>, radius: f64, segments: usize) -> Self {
        if !(radius.is_finite() && radius > 0.0) {
            return Self::Points(MultiPoint::new(vec![center]));
        }

        let segments = segments.max(MIN_BUFFER_SEGMENTS);
        let ring: Vec<Coord<f64>> = (0..segments)
            .map(|i| {
                let theta = std::f64::consts::TAU * i as f64 / segments as f64;
                Coord {
                    x: radius.mul_add(theta.cos(), center.x()),
                    y: radius.mul_add(theta.sin(), center.y()),
                }
            })
            .collect();

        Self::Area(MultiPolygon::new(vec![Polygon::new(
            LineString::from(ring),
            vec![],
        )]))
    }

    /// The polygons of an area boundary.
    #[must_use]
    pub const fn polygons(&self) -> Option<&MultiPolygon<f64>> {
        match self {
            Self::Area(mp) => Some(mp),
            Self::Points(_) => None,
        }
    }

    /// The boundary as a plain geometry.
    #[must_use]
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            Self::Area(mp) => Geometry::MultiPolygon(mp.clone()),
            Self::Points(points) => Geometry::MultiPoint(points.clone()),
        }
    }

    /// Bounding box, `None` when empty.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Area(mp) => mp.bounding_rect(),
            Self::Points(points) => points.bounding_rect(),
        }
    }

    /// Planar area in squared map units (zero for points).
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Area(mp) => mp.unsigned_area(),
            Self::Points(_) => 0.0,
        }
    }

    /// Whether the boundary has no geometry at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Area(mp) => mp.0.is_empty(),
            Self::Points(points) => points.0.is_empty(),
        }
    }
}

/// Everything the pipeline needs to know about a layer besides its
/// features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescription {
    /// Layer display name.
    pub name: String,
    /// Geometry type of the layer's features.
    pub geometry_kind: GeometryKind,
    /// How the layer is drawn.
    pub renderer: RendererDescriptor,
    /// Spatial reference id of the layer, if known.
    pub wkid: Option<u32>,
}

/// A label and the style it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    /// Text shown next to the swatch.
    pub label: String,
    /// Swatch style.
    pub style: Style,
}

impl LegendEntry {
    /// Creates a legend entry.
    #[must_use]
    pub fn new(label: impl Into<String>, style: Style) -> Self {
        Self {
            label: label.into(),
            style,
        }
    }
}

/// A polygon feature cut down to the boundary, with its resolved style.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedFeature {
    /// Attributes of the original feature.
    pub attributes: Attributes,
    /// Intersection of the original geometry and the boundary.
    pub geometry: MultiPolygon<f64>,
    /// Resolved drawing style.
    pub style: Style,
    /// Label of the renderer class that matched, `None` if unclassified.
    pub class_label: Option<String>,
}

impl ClippedFeature {
    /// Planar area of the clipped geometry.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Whether no renderer class matched this feature.
    #[must_use]
    pub const fn is_unclassified(&self) -> bool {
        self.class_label.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_equality_is_strict() {
        assert_ne!(
            AttributeValue::Number(1.0),
            AttributeValue::Text("1".to_string())
        );
        assert_eq!(AttributeValue::Number(1.0), AttributeValue::Number(1.0));
    }

    #[test]
    fn attribute_values_from_json() {
        assert_eq!(
            AttributeValue::from(&serde_json::json!(42)),
            AttributeValue::Number(42.0)
        );
        assert_eq!(
            AttributeValue::from(&serde_json::json!("A")),
            AttributeValue::Text("A".to_string())
        );
        assert_eq!(
            AttributeValue::from(&serde_json::Value::Null),
            AttributeValue::Null
        );
    }

    #[test]
    fn parses_geometry_kinds() {
        assert_eq!(GeometryKind::parse("esriGeometryPolygon"), GeometryKind::Polygon);
        assert_eq!(GeometryKind::parse("esriGeometryMultipoint"), GeometryKind::Point);
        assert_eq!(GeometryKind::parse("polyline"), GeometryKind::Polyline);
        assert_eq!(
            GeometryKind::parse("esriGeometryEnvelope"),
            GeometryKind::Unknown("esriGeometryEnvelope".to_string())
        );
    }

    #[test]
    fn buffered_click_is_a_regular_polygon() {
        let boundary = Boundary::around_point(Point::new(10.0, 20.0), 2.0, 3);
        let mp = boundary.polygons().unwrap();
        // Closed ring: segments + closing coordinate.
        assert_eq!(mp.0[0].exterior().0.len(), MIN_BUFFER_SEGMENTS + 1);

        let rect = boundary.bounding_rect().unwrap();
        assert!((rect.max().x - 12.0).abs() < 1e-9);
        assert!((rect.min().x - 8.0).abs() < 1e-9);
        assert!(boundary.area() > 0.0);
    }

    #[test]
    fn zero_radius_click_is_a_point_boundary() {
        let boundary = Boundary::around_point(Point::new(1.0, 1.0), 0.0, 32);
        assert!(matches!(boundary, Boundary::Points(_)));
        assert!(boundary.area().abs() < f64::EPSILON);
    }

    #[test]
    fn parses_boundary_from_feature_collection() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[5, 5], [6, 5], [6, 6], [5, 6], [5, 5]]]
                    }
                }
            ]
        })
        .to_string();

        let boundary = Boundary::from_geojson_str(&text).unwrap();
        assert_eq!(boundary.polygons().unwrap().0.len(), 2);
        assert!((boundary.area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_line_boundary() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        assert!(matches!(
            Boundary::from_geometry(line),
            Err(ModelError::UnsupportedBoundary { .. })
        ));
    }

    #[test]
    fn rejects_empty_boundary() {
        let empty = Geometry::MultiPolygon(MultiPolygon::<f64>::new(vec![]));
        assert!(matches!(
            Boundary::from_geometry(empty),
            Err(ModelError::EmptyBoundary)
        ));
    }

    #[test]
    fn converts_geojson_feature() {
        let feature: geojson::Feature = serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "properties": {"NAME": "Ward 1", "POP": 1200},
            "geometry": {"type": "Point", "coordinates": [-77.0, 38.9]}
        }))
        .unwrap();

        let feature = Feature::from_geojson(feature, Some(4326)).unwrap();
        assert_eq!(
            feature.attribute("NAME"),
            Some(&AttributeValue::Text("Ward 1".to_string()))
        );
        assert_eq!(feature.attribute("POP"), Some(&AttributeValue::Number(1200.0)));
        assert!(matches!(feature.geometry, Geometry::Point(_)));
        assert_eq!(feature.wkid, Some(4326));
    }

    #[test]
    fn feature_without_geometry_is_rejected() {
        let feature: geojson::Feature = serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "properties": {"NAME": "Nowhere"},
            "geometry": null
        }))
        .unwrap();

        assert!(matches!(
            Feature::from_geojson(feature, None),
            Err(ModelError::MissingGeometry)
        ));
    }

    #[test]
    fn geometry_kind_round_trips_through_serde() {
        let kind: GeometryKind =
            serde_json::from_value(serde_json::json!("esriGeometryPoint")).unwrap();
        assert_eq!(kind, GeometryKind::Point);
        assert_eq!(serde_json::to_value(&kind).unwrap(), serde_json::json!("point"));
    }
}
