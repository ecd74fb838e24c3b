#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clipping features against an analysis boundary.
//!
//! Polygon layers are intersected with the boundary using `geo`'s boolean
//! operations, producing new geometries. Point layers are not clipped;
//! they get a [`SpatialFilter`] predicate instead. Any other layer geometry
//! type is rejected with [`ClipError::UnsupportedGeometryKind`].

pub mod filter;
pub mod polygon;

use map_analysis_layer_models::{
    Boundary, ClippedFeature, Feature, GeometryKind, RendererDescriptor, Style,
};
use thiserror::Error;

pub use filter::{SpatialFilter, build_filter_predicate};
pub use polygon::{Intersection, clip, intersect_features};

/// Errors that can occur while clipping a layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipError {
    /// The layer is neither a point nor a polygon layer.
    #[error("Unsupported geometry kind: {0}")]
    UnsupportedGeometryKind(GeometryKind),

    /// Polygon features can only be clipped to an area boundary.
    #[error("Boundary is a point selection; polygon features need an area boundary")]
    BoundaryNotPolygonal,
}

/// Result of clipping one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOutput {
    /// Polygon layer: survivors with intersected geometry and style.
    Clipped(Vec<ClippedFeature>),
    /// Point layer: predicate for the feature-query side.
    Filter(SpatialFilter),
}

/// Clips a layer according to its geometry kind.
///
/// # Errors
///
/// * [`ClipError::UnsupportedGeometryKind`] for line, multipatch or unknown
///   layers.
/// * [`ClipError::BoundaryNotPolygonal`] when a polygon layer meets a point
///   boundary.
pub fn clip_layer(
    kind: &GeometryKind,
    features: &[Feature],
    boundary: &Boundary,
    renderer: &RendererDescriptor,
    default: Style,
) -> Result<ClipOutput, ClipError> {
    match kind {
        GeometryKind::Polygon => {
            clip(features, boundary, renderer, default).map(ClipOutput::Clipped)
        }
        GeometryKind::Point => Ok(ClipOutput::Filter(build_filter_predicate(boundary))),
        other => Err(ClipError::UnsupportedGeometryKind(other.clone())),
    }
}
