//! Boundary filter for point layers.
//!
//! Points are never re-geometrised. Instead the clipper hands back an
//! `intersects(boundary)` predicate that the feature-query side applies,
//! either remotely as a spatial query or locally with [`SpatialFilter::matches`].

use geo::{Geometry, Intersects};
use map_analysis_layer_models::{Boundary, Feature};

/// An `intersects(boundary)` predicate over features.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFilter {
    boundary: Boundary,
    geometry: Geometry<f64>,
}

impl SpatialFilter {
    /// The boundary this filter tests against.
    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Whether the feature's geometry intersects the boundary.
    #[must_use]
    pub fn matches(&self, feature: &Feature) -> bool {
        feature.geometry.intersects(&self.geometry)
    }

    /// Keeps the features that intersect the boundary, in input order.
    #[must_use]
    pub fn apply<'a>(&self, features: &'a [Feature]) -> Vec<&'a Feature> {
        features.iter().filter(|f| self.matches(f)).collect()
    }
}

/// Builds the boundary predicate for a point layer.
#[must_use]
pub fn build_filter_predicate(boundary: &Boundary) -> SpatialFilter {
    SpatialFilter {
        boundary: boundary.clone(),
        geometry: boundary.to_geometry(),
    }
}
