//! Dataset-level progress for analysis runs.
//!
//! A run announces how many datasets it will analyse, then ticks once per
//! finished dataset with that dataset's name as the message. The CLI draws
//! this as a bar; library callers and tests pass [`null_progress`].

use std::sync::Arc;

/// Sink for the progress of an analysis run. Shared as
/// `Arc<dyn ProgressCallback>` between the session and its caller.
pub trait ProgressCallback: Send + Sync {
    /// Number of datasets in the run.
    fn set_total(&self, total: u64);

    /// `delta` more datasets are done.
    fn inc(&self, delta: u64);

    /// Names the dataset being analysed.
    fn set_message(&self, msg: String);

    /// The run is over; `msg` summarises it.
    fn finish(&self, msg: String);
}

/// Discards progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
