#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `map_analysis` binary: a per-dataset
//! progress bar, logger setup, and the dataset picker used in interactive
//! mode.

use std::sync::Arc;
use std::time::Duration;

use dialoguer::MultiSelect;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use map_analysis_pipeline::ProgressCallback;

pub use indicatif::MultiProgress;

/// Dataset progress drawn with `indicatif`.
pub struct IndicatifProgress {
    bar: ProgressBar,
    counting: ProgressStyle,
}

impl IndicatifProgress {
    /// Adds a spinner labelled `message` to `multi`. It turns into a
    /// `done/total` bar when the run announces its dataset count.
    #[must_use]
    pub fn new(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let counting = ProgressStyle::with_template(
            "{msg} {wide_bar:.green/dim} {pos}/{len} datasets [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self { bar, counting }
    }

    /// [`IndicatifProgress::new`] behind the pipeline's callback trait.
    #[must_use]
    pub fn datasets_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new(multi, message))
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.counting.clone());
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Sets up `pretty_env_logger` for the binary and returns the
/// [`MultiProgress`] that dataset bars are drawn on.
///
/// Warnings (skipped features, missing map image) are shown by default;
/// `RUST_LOG` overrides the filter. Log lines go through
/// `indicatif-log-bridge` so they print above the bars instead of through
/// them. Calling this twice keeps the first logger.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}

/// Asks which datasets to analyse. All are selected initially.
///
/// Returns the indices of the chosen `labels`.
///
/// # Errors
///
/// Returns [`dialoguer::Error`] if the terminal cannot be prompted.
pub fn select_datasets(labels: &[String]) -> Result<Vec<usize>, dialoguer::Error> {
    let defaults = vec![true; labels.len()];
    MultiSelect::new()
        .with_prompt("Datasets to analyse (space=toggle, a=all, enter=confirm)")
        .items(labels)
        .defaults(&defaults)
        .interact()
}
