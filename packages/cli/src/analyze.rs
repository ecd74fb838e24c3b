//! The `run` command: analyse every configured dataset against one
//! boundary and write the report and legend documents.

use std::path::{Path, PathBuf};

use map_analysis_cli_utils::{IndicatifProgress, MultiProgress};
use map_analysis_layer_models::{Boundary, LegendEntry};
use map_analysis_legend::{DEFAULT_SWATCH_SIZE, to_renderable_rows};
use map_analysis_pipeline::{AnalysisSession, DatasetOutcome};
use map_analysis_report::{
    LegendSection, MapImage, ReportOptions, SummaryRow, build_sectioned_report,
};
use serde::Serialize;

use crate::config::AnalysisConfig;

/// Everything one analysis run needs.
pub struct RunOptions {
    /// Loaded configuration.
    pub config: AnalysisConfig,
    /// Analysis boundary.
    pub boundary: Boundary,
    /// Map snapshot to embed in the report.
    pub map_image: Option<PathBuf>,
    /// Where to write the report document.
    pub report_path: PathBuf,
    /// Where to write the legend document, if wanted.
    pub legend_path: Option<PathBuf>,
}

/// Legend of one dataset as written to the legend document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLegend {
    /// Dataset id.
    pub dataset: String,
    /// Dataset name.
    pub name: String,
    /// Entries in legend order.
    pub entries: Vec<LegendEntry>,
}

/// Runs the analysis and writes its outputs.
///
/// Failing datasets are reported inline and left out of the legend; the
/// run itself only fails if no boundary is available or an output cannot
/// be written.
///
/// # Errors
///
/// Returns an error if sources cannot be built, the session rejects the
/// run, or an output file cannot be written.
#[allow(clippy::future_not_send)]
pub async fn run(
    multi: &MultiProgress,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let RunOptions {
        config,
        boundary,
        map_image,
        report_path,
        legend_path,
    } = options;

    let sources = config.build_sources()?;
    log::info!(
        "Analysing {} dataset(s) against a boundary of area {:.3}",
        sources.len(),
        boundary.area()
    );

    let mut session = AnalysisSession::default();
    session.set_boundary(boundary);
    let progress = IndicatifProgress::datasets_bar(multi, "Analysing datasets");
    let outcomes = session.run(&sources, &progress).await?;

    for outcome in outcomes {
        match &outcome.result {
            Ok(analysis) => println!(
                "  {}: {} feature(s), {} legend entries",
                outcome.name,
                analysis.feature_count(),
                analysis.legend.len()
            ),
            Err(e) => println!("  {} could not be analysed: {e}", outcome.name),
        }
    }

    let image = map_image.and_then(|path| load_map_image(&path));
    let report_options = ReportOptions {
        subtitle: config.subtitle.clone(),
        summary: summarize(outcomes),
        ..ReportOptions::default()
    };
    let document = build_sectioned_report(
        &config.title,
        image.as_ref(),
        &legend_sections(outcomes),
        &report_options,
    );
    write_output(&report_path, &document.to_json()?)?;
    println!(
        "Wrote {}-page report to {}",
        document.page_count(),
        report_path.display()
    );

    if let Some(path) = legend_path {
        write_output(&path, &serde_json::to_string_pretty(&dataset_legends(outcomes))?)?;
        println!("Wrote legend to {}", path.display());
    }

    Ok(())
}

fn load_map_image(path: &Path) -> Option<MapImage> {
    if path.is_file() {
        Some(MapImage {
            path: path.to_path_buf(),
            width: None,
            height: None,
        })
    } else {
        log::warn!("Map image {} not found", path.display());
        None
    }
}

fn write_output(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// One summary row per dataset, failures included.
#[must_use]
pub fn summarize(outcomes: &[DatasetOutcome]) -> Vec<SummaryRow> {
    outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(analysis) => SummaryRow {
                dataset: outcome.name.clone(),
                feature_count: analysis.feature_count(),
                clipped_area: analysis.clipped_area(),
                error: None,
            },
            Err(e) => SummaryRow {
                dataset: outcome.name.clone(),
                feature_count: 0,
                clipped_area: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// One legend section per successfully analysed dataset.
#[must_use]
pub fn legend_sections(outcomes: &[DatasetOutcome]) -> Vec<LegendSection> {
    outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok())
        .map(|analysis| LegendSection {
            heading: Some(analysis.name.clone()),
            rows: to_renderable_rows(&analysis.legend, DEFAULT_SWATCH_SIZE),
        })
        .collect()
}

/// Legends of the successfully analysed datasets.
#[must_use]
pub fn dataset_legends(outcomes: &[DatasetOutcome]) -> Vec<DatasetLegend> {
    outcomes
        .iter()
        .filter_map(|outcome| {
            outcome.result.as_ref().ok().map(|analysis| DatasetLegend {
                dataset: outcome.dataset.clone(),
                name: outcome.name.clone(),
                entries: analysis.legend.clone(),
            })
        })
        .collect()
}
