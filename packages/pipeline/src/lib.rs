#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis orchestration.
//!
//! Runs the clip → style → legend pipeline over a set of datasets for one
//! boundary. Each dataset is described and queried through the
//! [`FeatureSource`] trait, and each one succeeds or fails on its own: a
//! failing dataset yields an error outcome while the rest carry on.

pub mod local;
pub mod progress;
pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use map_analysis_clip::{ClipError, ClipOutput, SpatialFilter, build_filter_predicate, clip_layer};
use map_analysis_layer_models::{
    ClippedFeature, Feature, GeometryKind, LayerDescription, LegendEntry, RendererKind, Style,
};
use map_analysis_legend::{LegendAccumulator, legend_for_clipped};
use map_analysis_renderer::resolve_style;

pub use local::LocalFeatureSource;
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use session::{AnalysisSession, RunTicket};

/// Failure reported by a [`FeatureSource`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    /// Description of what went wrong.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// A query error without an underlying cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A query error wrapping `source`.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Errors that end the analysis of one dataset, or of a whole run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The dataset has no layer view to read metadata from.
    #[error("Dataset {dataset} has no layer view")]
    MissingLayerView {
        /// Dataset id.
        dataset: String,
    },

    /// The dataset's geometry type cannot be analysed.
    #[error("Dataset {dataset} has unsupported geometry kind {kind}")]
    UnsupportedGeometryKind {
        /// Dataset id.
        dataset: String,
        /// The offending geometry kind.
        kind: GeometryKind,
    },

    /// Describing or querying the dataset failed.
    #[error("Query failed for dataset {dataset}: {source}")]
    QueryFailure {
        /// Dataset id.
        dataset: String,
        /// What the source reported.
        #[source]
        source: QueryError,
    },

    /// A polygon dataset was analysed against a point selection.
    #[error("Dataset {dataset} is a polygon layer but the boundary is a point selection")]
    BoundaryNotPolygonal {
        /// Dataset id.
        dataset: String,
    },

    /// No boundary has been selected yet.
    #[error("No analysis boundary selected")]
    NoBoundary,

    /// A newer run or boundary superseded this run.
    #[error("Run {generation} is stale; current generation is {current}")]
    StaleRun {
        /// Generation of the discarded run.
        generation: u64,
        /// Generation the session is at.
        current: u64,
    },
}

impl AnalysisError {
    fn from_clip(dataset: &str, error: ClipError) -> Self {
        match error {
            ClipError::UnsupportedGeometryKind(kind) => Self::UnsupportedGeometryKind {
                dataset: dataset.to_string(),
                kind,
            },
            ClipError::BoundaryNotPolygonal => Self::BoundaryNotPolygonal {
                dataset: dataset.to_string(),
            },
        }
    }
}

/// A dataset the pipeline can analyse.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Unique identifier of the dataset.
    fn id(&self) -> &str;

    /// Human-readable dataset name.
    fn name(&self) -> &str;

    /// Layer metadata. `Ok(None)` means the dataset has no layer view.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the metadata cannot be retrieved.
    async fn describe(&self) -> Result<Option<LayerDescription>, QueryError>;

    /// Features of the dataset, restricted to those matching `filter` when
    /// one is given. Sources may return extra features; the pipeline
    /// re-checks them.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the query fails.
    async fn query(&self, filter: Option<&SpatialFilter>) -> Result<Vec<Feature>, QueryError>;
}

/// A point feature inside the boundary with its resolved style.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledPoint {
    /// The feature as returned by the source.
    pub feature: Feature,
    /// Resolved drawing style.
    pub style: Style,
    /// Label of the matching renderer class, `None` if unclassified.
    pub class_label: Option<String>,
}

/// Successful analysis of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAnalysis {
    /// Dataset id.
    pub id: String,
    /// Dataset display name.
    pub name: String,
    /// Geometry type of the layer.
    pub geometry_kind: GeometryKind,
    /// Renderer type used to build the legend.
    pub renderer_kind: RendererKind,
    /// Clipped polygons, for polygon layers.
    pub clipped: Vec<ClippedFeature>,
    /// Points inside the boundary, for point layers.
    pub points: Vec<StyledPoint>,
    /// Legend for the features inside the boundary.
    pub legend: Vec<LegendEntry>,
}

impl DatasetAnalysis {
    /// Number of features inside the boundary.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.clipped.len() + self.points.len()
    }

    /// Total clipped area for polygon layers, `None` for point layers.
    #[must_use]
    pub fn clipped_area(&self) -> Option<f64> {
        (self.geometry_kind == GeometryKind::Polygon)
            .then(|| self.clipped.iter().map(ClippedFeature::area).sum())
    }
}

/// Result for one dataset of a run.
#[derive(Debug)]
pub struct DatasetOutcome {
    /// Dataset id.
    pub dataset: String,
    /// Dataset display name.
    pub name: String,
    /// The analysis, or why it failed.
    pub result: Result<DatasetAnalysis, AnalysisError>,
}

/// Analyses every dataset against the ticket's boundary.
///
/// Datasets are processed in order, one at a time. The returned outcomes
/// are in the same order as `sources`; failures are logged and reported in
/// their outcome without affecting other datasets.
pub async fn run_analysis(
    ticket: &RunTicket,
    sources: &[Arc<dyn FeatureSource>],
    default_style: Style,
    progress: &Arc<dyn ProgressCallback>,
) -> Vec<DatasetOutcome> {
    progress.set_total(sources.len() as u64);
    let mut outcomes = Vec::with_capacity(sources.len());
    let mut failures = 0_usize;

    for source in sources {
        progress.set_message(format!("Analysing {}", source.name()));

        let result = analyse_dataset(ticket, source.as_ref(), default_style).await;
        match &result {
            Ok(analysis) => log::info!(
                "{}: {} feature(s) inside boundary, {} legend entries",
                analysis.name,
                analysis.feature_count(),
                analysis.legend.len()
            ),
            Err(e) => {
                failures += 1;
                log::error!("{}: {e}", source.name());
            }
        }

        outcomes.push(DatasetOutcome {
            dataset: source.id().to_string(),
            name: source.name().to_string(),
            result,
        });
        progress.inc(1);
    }

    progress.finish(format!(
        "Analysed {} dataset(s), {failures} failed",
        sources.len()
    ));
    outcomes
}

async fn analyse_dataset(
    ticket: &RunTicket,
    source: &dyn FeatureSource,
    default_style: Style,
) -> Result<DatasetAnalysis, AnalysisError> {
    let dataset = source.id();
    let query_failure = |source| AnalysisError::QueryFailure {
        dataset: dataset.to_string(),
        source,
    };

    let layer = source
        .describe()
        .await
        .map_err(query_failure)?
        .ok_or_else(|| AnalysisError::MissingLayerView {
            dataset: dataset.to_string(),
        })?;

    if !matches!(
        layer.geometry_kind,
        GeometryKind::Point | GeometryKind::Polygon
    ) {
        return Err(AnalysisError::UnsupportedGeometryKind {
            dataset: dataset.to_string(),
            kind: layer.geometry_kind,
        });
    }

    let filter = build_filter_predicate(ticket.boundary());
    let features = source
        .query(Some(&filter))
        .await
        .map_err(query_failure)?;
    log::debug!("{dataset}: source returned {} feature(s)", features.len());

    let renderer_kind = layer.renderer.kind();
    let (clipped, points, legend) = match clip_layer(
        &layer.geometry_kind,
        &features,
        ticket.boundary(),
        &layer.renderer,
        default_style,
    )
    .map_err(|e| AnalysisError::from_clip(dataset, e))?
    {
        ClipOutput::Clipped(clipped) => {
            let legend = legend_for_clipped(&clipped, renderer_kind);
            (clipped, Vec::new(), legend)
        }
        ClipOutput::Filter(filter) => {
            let mut accumulator = LegendAccumulator::new();
            let points: Vec<StyledPoint> = filter
                .apply(&features)
                .into_iter()
                .map(|feature| {
                    let resolved =
                        resolve_style(&layer.renderer, &feature.attributes, default_style);
                    if let Some(label) = resolved.label {
                        accumulator.accumulate(resolved.style, label);
                    }
                    StyledPoint {
                        feature: feature.clone(),
                        style: resolved.style,
                        class_label: resolved.label.map(ToString::to_string),
                    }
                })
                .collect();
            (Vec::new(), points, accumulator.finish(renderer_kind))
        }
    };

    Ok(DatasetAnalysis {
        id: dataset.to_string(),
        name: layer.name,
        geometry_kind: layer.geometry_kind,
        renderer_kind,
        clipped,
        points,
        legend,
    })
}
