//! Polygon clipping.
//!
//! Feature envelopes go into an R-tree so only features whose bounding
//! boxes touch the boundary's bounding box reach the (expensive) boolean
//! intersection.

use geo::{Area, BooleanOps, BoundingRect, Geometry, MultiPolygon};
use map_analysis_layer_models::{
    Attributes, Boundary, ClippedFeature, Feature, RendererDescriptor, Style,
    geometry_type_name,
};
use rstar::{AABB, RTree, RTreeObject};

use crate::ClipError;

/// A feature envelope stored in the R-tree, pointing back at its input
/// position.
struct EnvelopeEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EnvelopeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The geometric part of a clip: which input feature survived and what is
/// left of it inside the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection<'a> {
    /// Position of the feature in the input slice.
    pub index: usize,
    /// Attributes of the input feature.
    pub attributes: &'a Attributes,
    /// `feature ∩ boundary`, never empty.
    pub geometry: MultiPolygon<f64>,
}

/// Intersects every polygon feature with the boundary.
///
/// Features entirely outside the boundary are dropped without error, as
/// are features whose geometry is not polygonal (logged). Survivors keep
/// their input order.
///
/// # Errors
///
/// Returns [`ClipError::BoundaryNotPolygonal`] if the boundary is a point
/// selection.
pub fn intersect_features<'a>(
    features: &'a [Feature],
    boundary: &Boundary,
) -> Result<Vec<Intersection<'a>>, ClipError> {
    let area = boundary.polygons().ok_or(ClipError::BoundaryNotPolygonal)?;
    let Some(boundary_rect) = area.bounding_rect() else {
        return Ok(Vec::new());
    };

    let mut polygons: Vec<Option<MultiPolygon<f64>>> = Vec::with_capacity(features.len());
    let mut entries = Vec::with_capacity(features.len());

    for (index, feature) in features.iter().enumerate() {
        let polygon = as_multipolygon(&feature.geometry);
        if polygon.is_none() {
            log::warn!(
                "Skipping feature {index}: {} geometry in a polygon layer",
                geometry_type_name(&feature.geometry)
            );
        }
        if let Some(rect) = polygon.as_ref().and_then(BoundingRect::bounding_rect) {
            entries.push(EnvelopeEntry {
                index,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            });
        }
        polygons.push(polygon);
    }

    let tree = RTree::bulk_load(entries);
    let query = AABB::from_corners(
        [boundary_rect.min().x, boundary_rect.min().y],
        [boundary_rect.max().x, boundary_rect.max().y],
    );

    let mut candidates: Vec<usize> = tree
        .locate_in_envelope_intersecting(&query)
        .map(|entry| entry.index)
        .collect();
    candidates.sort_unstable();

    log::debug!(
        "{} of {} features pass the envelope test",
        candidates.len(),
        features.len()
    );

    let mut survivors = Vec::with_capacity(candidates.len());
    for index in candidates {
        let Some(polygon) = &polygons[index] else {
            continue;
        };

        let geometry = non_degenerate(polygon.intersection(area));
        if geometry.0.is_empty() {
            continue;
        }

        survivors.push(Intersection {
            index,
            attributes: &features[index].attributes,
            geometry,
        });
    }

    Ok(survivors)
}

/// Clips polygon features to the boundary and resolves each survivor's
/// style with `renderer`, falling back to `default` when no class
/// matches.
///
/// Deterministic: the same `(features, boundary)` always yields the same
/// survivors and geometries.
///
/// # Errors
///
/// Returns [`ClipError::BoundaryNotPolygonal`] if the boundary is a point
/// selection.
pub fn clip(
    features: &[Feature],
    boundary: &Boundary,
    renderer: &RendererDescriptor,
    default: Style,
) -> Result<Vec<ClippedFeature>, ClipError> {
    let intersections = intersect_features(features, boundary)?;

    Ok(intersections
        .into_iter()
        .map(|intersection| {
            let resolved =
                map_analysis_renderer::resolve_style(renderer, intersection.attributes, default);
            ClippedFeature {
                attributes: intersection.attributes.clone(),
                geometry: intersection.geometry,
                style: resolved.style,
                class_label: resolved.label.map(ToString::to_string),
            }
        })
        .collect())
}

fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(rect) => Some(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Some(MultiPolygon::new(vec![triangle.to_polygon()])),
        _ => None,
    }
}

/// Drops zero-area slivers that boolean ops leave along shared edges.
fn non_degenerate(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        mp.0.into_iter()
            .filter(|polygon| polygon.unsigned_area() > 0.0)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Point, Polygon, polygon};
    use map_analysis_layer_models::{AttributeValue, ClassBreak, Rgba};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    fn feature(id: f64, geometry: Geometry<f64>) -> Feature {
        let mut attributes = Attributes::new();
        attributes.insert("ID".to_string(), AttributeValue::Number(id));
        Feature::new(attributes, geometry, Some(3857))
    }

    fn boundary() -> Boundary {
        // A non-rectangular boundary so containment is not just a bbox test.
        Boundary::Area(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 5.0, y: 15.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]]))
    }

    fn by_id() -> RendererDescriptor {
        RendererDescriptor::ClassBreaks {
            field: "ID".to_string(),
            breaks: vec![ClassBreak {
                min: 0.0,
                max: 2.0,
                style: Style::fill_only(Rgba::opaque(200, 0, 0)),
                label: "First".to_string(),
            }],
        }
    }

    fn features() -> Vec<Feature> {
        vec![
            // Straddles the right edge.
            feature(1.0, Geometry::Polygon(square(8.0, 2.0, 4.0))),
            // Fully outside.
            feature(2.0, Geometry::Polygon(square(20.0, 20.0, 3.0))),
            // Fully inside.
            feature(3.0, Geometry::Polygon(square(2.0, 2.0, 2.0))),
            // Pokes through the sloped roof.
            feature(4.0, Geometry::Polygon(square(3.0, 11.0, 4.0))),
        ]
    }

    #[test]
    fn clipped_geometry_is_contained_in_boundary() {
        let boundary = boundary();
        let area = boundary.polygons().unwrap();
        let clipped = clip(&features(), &boundary, &by_id(), Style::unclassified()).unwrap();

        assert_eq!(clipped.len(), 3);
        for feature in &clipped {
            let outside = feature.geometry.difference(area).unsigned_area();
            assert!(outside < 1e-9, "clipped area outside boundary: {outside}");
            assert!(feature.area() > 0.0);
        }
    }

    #[test]
    fn features_outside_boundary_are_dropped() {
        let clipped = clip(&features(), &boundary(), &by_id(), Style::unclassified()).unwrap();
        let ids: Vec<f64> = clipped
            .iter()
            .filter_map(|f| f.attributes.get("ID").and_then(AttributeValue::as_f64))
            .collect();
        assert_eq!(ids, [1.0, 3.0, 4.0]);
    }

    #[test]
    fn straddling_feature_is_cut_to_the_edge() {
        let clipped = clip(&features(), &boundary(), &by_id(), Style::unclassified()).unwrap();
        // 4x4 square with half its width past x = 10.
        assert!((clipped[0].area() - 8.0).abs() < 1e-9);
        // Fully inside square is unchanged.
        assert!((clipped[1].area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn clipping_is_idempotent() {
        let features = features();
        let boundary = boundary();
        let first = clip(&features, &boundary, &by_id(), Style::unclassified()).unwrap();
        let second = clip(&features, &boundary, &by_id(), Style::unclassified()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn survivors_carry_resolved_styles() {
        let clipped = clip(&features(), &boundary(), &by_id(), Style::unclassified()).unwrap();
        assert_eq!(clipped[0].class_label.as_deref(), Some("First"));
        assert_eq!(clipped[0].style.fill(), Rgba::opaque(200, 0, 0));
        assert!(clipped[1].is_unclassified());
        assert_eq!(clipped[1].style, Style::unclassified());
    }

    #[test]
    fn edge_touching_feature_is_dropped() {
        // Shares only the x = 10 edge with the boundary.
        let touching = vec![feature(1.0, Geometry::Polygon(square(10.0, 2.0, 2.0)))];
        let clipped = clip(&touching, &boundary(), &by_id(), Style::unclassified()).unwrap();
        assert!(clipped.is_empty());
    }

    #[test]
    fn non_polygon_features_are_skipped() {
        let mixed = vec![
            feature(1.0, Geometry::Point(Point::new(5.0, 5.0))),
            feature(
                2.0,
                Geometry::LineString(LineString::from(vec![(1.0, 1.0), (2.0, 2.0)])),
            ),
            feature(3.0, Geometry::Polygon(square(1.0, 1.0, 1.0))),
        ];
        let clipped = intersect_features(&mixed, &boundary()).unwrap();
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].index, 2);
    }

    #[test]
    fn multipolygon_feature_keeps_inside_parts_only() {
        let parts = MultiPolygon::new(vec![square(1.0, 1.0, 1.0), square(30.0, 30.0, 1.0)]);
        let input = [feature(1.0, Geometry::MultiPolygon(parts))];
        let clipped = intersect_features(&input, &boundary()).unwrap();
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].geometry.0.len(), 1);
    }

    #[test]
    fn point_boundary_cannot_clip_polygons() {
        let points = Boundary::around_point(Point::new(1.0, 1.0), 0.0, 8);
        assert!(matches!(
            intersect_features(&features(), &points),
            Err(ClipError::BoundaryNotPolygonal)
        ));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let clipped = clip(&[], &boundary(), &by_id(), Style::unclassified()).unwrap();
        assert!(clipped.is_empty());
    }
}
