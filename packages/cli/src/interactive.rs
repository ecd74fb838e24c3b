//! Guided analysis when no subcommand is given.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use map_analysis_cli_utils::{MultiProgress, select_datasets};

use crate::analyze::{self, RunOptions};
use crate::boundary::{DEFAULT_BUFFER_SEGMENTS, boundary_from_file, boundary_from_point};
use crate::config::AnalysisConfig;

/// How the user selects the boundary.
enum BoundaryInput {
    File,
    Point,
}

impl BoundaryInput {
    const ALL: &[Self] = &[Self::File, Self::Point];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::File => "GeoJSON file",
            Self::Point => "Point and buffer radius",
        }
    }
}

/// Prompts for a config, a boundary and the datasets, then runs the
/// analysis.
///
/// # Errors
///
/// Returns an error if a prompt fails, an input cannot be loaded, or the
/// analysis cannot write its outputs.
#[allow(clippy::future_not_send)]
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let config_path: String = Input::new()
        .with_prompt("Analysis config")
        .default("analysis.toml".to_string())
        .interact_text()?;
    let mut config = AnalysisConfig::load(&PathBuf::from(config_path))?;

    if config.datasets.is_empty() {
        println!("No datasets configured.");
        return Ok(());
    }

    let labels: Vec<String> = config
        .datasets
        .iter()
        .map(|d| format!("{} ({})", d.name, d.id))
        .collect();
    let selected = select_datasets(&labels)?;
    if selected.is_empty() {
        println!("No datasets selected.");
        return Ok(());
    }
    let ids: Vec<String> = selected
        .iter()
        .map(|&i| config.datasets[i].id.clone())
        .collect();
    config.retain_datasets(&ids)?;

    let labels: Vec<&str> = BoundaryInput::ALL.iter().map(BoundaryInput::label).collect();
    let idx = Select::new()
        .with_prompt("Boundary")
        .items(&labels)
        .default(0)
        .interact()?;
    let boundary = match BoundaryInput::ALL[idx] {
        BoundaryInput::File => {
            let path: String = Input::new()
                .with_prompt("Boundary GeoJSON")
                .interact_text()?;
            boundary_from_file(&PathBuf::from(path))?
        }
        BoundaryInput::Point => {
            let x: f64 = Input::new().with_prompt("X").interact_text()?;
            let y: f64 = Input::new().with_prompt("Y").interact_text()?;
            let radius: f64 = Input::new()
                .with_prompt("Buffer radius (0 for the bare point)")
                .default(0.0)
                .interact_text()?;
            boundary_from_point(x, y, radius, DEFAULT_BUFFER_SEGMENTS)
        }
    };

    let map_image: String = Input::new()
        .with_prompt("Map image (blank to skip)")
        .allow_empty(true)
        .interact_text()?;
    let report_path: String = Input::new()
        .with_prompt("Report output")
        .default("report.json".to_string())
        .interact_text()?;

    analyze::run(
        multi,
        RunOptions {
            config,
            boundary,
            map_image: (!map_image.trim().is_empty()).then(|| PathBuf::from(map_image.trim())),
            report_path: PathBuf::from(report_path),
            legend_path: None,
        },
    )
    .await
}
