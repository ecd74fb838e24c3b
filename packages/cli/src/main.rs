#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line map analysis.
//!
//! ```text
//! map_analysis run --config analysis.toml --boundary ward6.geojson [--map-image map.png]
//! map_analysis run --config analysis.toml --point -77.03,38.9 --radius 0.01
//! map_analysis legend --renderer zoning_renderer.json [--format esri]
//! map_analysis datasets --config analysis.toml
//! ```
//!
//! Running `map_analysis` with no subcommand enters interactive mode.
//!
//! Uses `indicatif-log-bridge` (via [`map_analysis_cli_utils::init_logger`])
//! so log lines and the progress bar never fight for the terminal.

mod analyze;
mod boundary;
mod config;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use map_analysis_layer_models::{FieldType, RendererDescriptor};
use map_analysis_legend::{DEFAULT_SWATCH_SIZE, generate_legend_items, to_renderable_rows};
use map_analysis_renderer::declared_entries;

use crate::analyze::RunOptions;
use crate::boundary::{
    DEFAULT_BUFFER_SEGMENTS, boundary_from_file, boundary_from_point, parse_point,
};
use crate::config::{AnalysisConfig, RendererFormat};

#[derive(Parser)]
#[command(
    name = "map_analysis",
    about = "Clip map datasets to a boundary and build legends and reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the configured datasets against a boundary
    Run {
        /// Analysis config file
        #[arg(long, default_value = "analysis.toml")]
        config: PathBuf,
        /// Boundary `GeoJSON` file
        #[arg(long, conflicts_with = "point", required_unless_present = "point")]
        boundary: Option<PathBuf>,
        /// Clicked point as `x,y`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Option<(f64, f64)>,
        /// Buffer radius around `--point`, in map units
        #[arg(long, default_value = "0", requires = "point")]
        radius: f64,
        /// Comma-separated dataset ids to analyse (default: all)
        #[arg(long, value_delimiter = ',')]
        datasets: Vec<String>,
        /// Map snapshot to embed in the report
        #[arg(long)]
        map_image: Option<PathBuf>,
        /// Report document output
        #[arg(long, default_value = "report.json")]
        output: PathBuf,
        /// Legend document output
        #[arg(long)]
        legend_output: Option<PathBuf>,
    },
    /// Print the legend a renderer declares
    Legend {
        /// Renderer JSON file
        #[arg(long)]
        renderer: PathBuf,
        /// Format of the renderer file
        #[arg(long, value_enum, default_value_t = RendererFormat::Native)]
        format: RendererFormat,
    },
    /// List the configured datasets
    Datasets {
        /// Analysis config file
        #[arg(long, default_value = "analysis.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = map_analysis_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Run {
            config,
            boundary,
            point,
            radius,
            datasets,
            map_image,
            output,
            legend_output,
        } => {
            let mut config = AnalysisConfig::load(&config)?;
            if !datasets.is_empty() {
                config.retain_datasets(&datasets)?;
            }
            let boundary = match (boundary, point) {
                (Some(path), _) => boundary_from_file(&path)?,
                (None, Some((x, y))) => boundary_from_point(x, y, radius, DEFAULT_BUFFER_SEGMENTS),
                (None, None) => return Err("either --boundary or --point is required".into()),
            };

            analyze::run(
                &multi,
                RunOptions {
                    config,
                    boundary,
                    map_image,
                    report_path: output,
                    legend_path: legend_output,
                },
            )
            .await?;
        }
        Commands::Legend { renderer, format } => {
            let json: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&renderer)?)?;
            let renderer: RendererDescriptor = match format {
                RendererFormat::Native => serde_json::from_value(json)?,
                RendererFormat::Esri => {
                    map_analysis_arcgis::parse_renderer(&json, |_| FieldType::Other)?
                }
            };
            let entries = generate_legend_items(
                declared_entries(&renderer)
                    .into_iter()
                    .map(|entry| (entry.style, entry.label)),
                renderer.kind(),
            );
            let rows = to_renderable_rows(&entries, DEFAULT_SWATCH_SIZE);
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Datasets { config } => {
            let config = AnalysisConfig::load(&config)?;
            if config.datasets.is_empty() {
                println!("No datasets configured.");
                return Ok(());
            }

            println!("{:<20} {:<30} SOURCE", "ID", "NAME");
            println!("{}", "-".repeat(80));
            for dataset in &config.datasets {
                let source = dataset.url.as_deref().map_or_else(
                    || {
                        dataset
                            .features
                            .as_ref()
                            .map_or_else(String::new, |p| p.display().to_string())
                    },
                    ToString::to_string,
                );
                println!("{:<20} {:<30} {source}", dataset.id, dataset.name);
            }
            println!("\n{} dataset(s)", config.datasets.len());
        }
    }

    Ok(())
}
