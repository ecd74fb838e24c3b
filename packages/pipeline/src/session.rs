//! Per-widget analysis session state.
//!
//! A session owns the active boundary and the results of the latest run.
//! Every run is stamped with a generation number; selecting a new boundary
//! or starting a new run bumps the generation, and results carrying an
//! older generation are refused at commit time instead of overwriting
//! newer ones.

use std::sync::Arc;

use map_analysis_layer_models::{Boundary, Style};

use crate::{AnalysisError, DatasetOutcome, FeatureSource, ProgressCallback, run_analysis};

/// Identifies one run and carries the boundary it was started with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTicket {
    generation: u64,
    boundary: Boundary,
}

impl RunTicket {
    /// Generation this run belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Boundary the run analyses.
    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }
}

/// State of one analysis widget.
#[derive(Debug)]
pub struct AnalysisSession {
    generation: u64,
    boundary: Option<Boundary>,
    default_style: Style,
    results: Vec<DatasetOutcome>,
    committed_generation: Option<u64>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(Style::unclassified())
    }
}

impl AnalysisSession {
    /// Creates a session with no boundary. `default_style` is applied to
    /// features no renderer class matches.
    #[must_use]
    pub const fn new(default_style: Style) -> Self {
        Self {
            generation: 0,
            boundary: None,
            default_style,
            results: Vec::new(),
            committed_generation: None,
        }
    }

    /// Style used for unclassified features.
    #[must_use]
    pub const fn default_style(&self) -> Style {
        self.default_style
    }

    /// The active boundary, if one has been selected.
    #[must_use]
    pub const fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    /// Current generation number.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the boundary wholesale. Earlier results are discarded and
    /// any in-flight run becomes stale.
    pub fn set_boundary(&mut self, boundary: Boundary) {
        self.generation += 1;
        self.boundary = Some(boundary);
        self.results.clear();
        self.committed_generation = None;
        log::debug!("Boundary replaced; now at generation {}", self.generation);
    }

    /// Starts a new run over the active boundary.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoBoundary`] if no boundary is selected.
    pub fn begin_run(&mut self) -> Result<RunTicket, AnalysisError> {
        let boundary = self.boundary.clone().ok_or(AnalysisError::NoBoundary)?;
        self.generation += 1;
        Ok(RunTicket {
            generation: self.generation,
            boundary,
        })
    }

    /// Whether results for `ticket` would still be accepted.
    #[must_use]
    pub const fn is_current(&self, ticket: &RunTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Stores the results of a run.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::StaleRun`] if a newer run or boundary has
    /// superseded `ticket`; the results are dropped.
    pub fn commit(
        &mut self,
        ticket: &RunTicket,
        results: Vec<DatasetOutcome>,
    ) -> Result<(), AnalysisError> {
        if !self.is_current(ticket) {
            log::info!(
                "Discarding results of stale run {} (current generation {})",
                ticket.generation,
                self.generation
            );
            return Err(AnalysisError::StaleRun {
                generation: ticket.generation,
                current: self.generation,
            });
        }

        self.results = results;
        self.committed_generation = Some(ticket.generation);
        Ok(())
    }

    /// Results of the latest committed run.
    #[must_use]
    pub fn results(&self) -> &[DatasetOutcome] {
        &self.results
    }

    /// Generation of the latest committed run.
    #[must_use]
    pub const fn committed_generation(&self) -> Option<u64> {
        self.committed_generation
    }

    /// Starts a run, analyses every source and commits the outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoBoundary`] if no boundary is selected.
    /// Per-dataset failures are reported inside the outcomes.
    pub async fn run(
        &mut self,
        sources: &[Arc<dyn FeatureSource>],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<&[DatasetOutcome], AnalysisError> {
        let ticket = self.begin_run()?;
        let outcomes = run_analysis(&ticket, sources, self.default_style, progress).await;
        self.commit(&ticket, outcomes)?;
        Ok(&self.results)
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;
    use crate::{LocalFeatureSource, null_progress};

    fn boundary(x: f64) -> Boundary {
        Boundary::around_point(Point::new(x, 0.0), 1.0, 8)
    }

    #[test]
    fn run_without_boundary_fails() {
        let mut session = AnalysisSession::default();
        assert!(matches!(
            session.begin_run(),
            Err(AnalysisError::NoBoundary)
        ));
    }

    #[test]
    fn generations_increase_monotonically() {
        let mut session = AnalysisSession::default();
        session.set_boundary(boundary(0.0));
        let first = session.begin_run().unwrap();
        let second = session.begin_run().unwrap();
        assert!(second.generation() > first.generation());
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
    }

    #[test]
    fn new_boundary_makes_inflight_run_stale() {
        let mut session = AnalysisSession::default();
        session.set_boundary(boundary(0.0));
        let ticket = session.begin_run().unwrap();

        session.set_boundary(boundary(5.0));

        let err = session.commit(&ticket, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::StaleRun { generation, current } if generation < current
        ));
        assert_eq!(session.committed_generation(), None);
    }

    #[test]
    fn ticket_keeps_its_own_boundary() {
        let mut session = AnalysisSession::default();
        session.set_boundary(boundary(0.0));
        let ticket = session.begin_run().unwrap();
        session.set_boundary(boundary(5.0));
        assert_eq!(ticket.boundary(), &boundary(0.0));
        assert_eq!(session.boundary(), Some(&boundary(5.0)));
    }

    #[test]
    fn current_run_commits() {
        let mut session = AnalysisSession::default();
        session.set_boundary(boundary(0.0));
        let ticket = session.begin_run().unwrap();
        session.commit(&ticket, Vec::new()).unwrap();
        assert_eq!(session.committed_generation(), Some(ticket.generation()));
    }

    #[tokio::test]
    async fn run_commits_one_outcome_per_source() {
        let mut session = AnalysisSession::default();
        session.set_boundary(boundary(0.0));
        let sources: Vec<Arc<dyn FeatureSource>> = vec![
            Arc::new(LocalFeatureSource::new("a", "A", None, Vec::new())),
            Arc::new(LocalFeatureSource::new("b", "B", None, Vec::new())),
        ];

        let outcomes = session.run(&sources, &null_progress()).await.unwrap();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.dataset.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(session.results().len(), 2);
    }

    #[tokio::test]
    async fn run_without_boundary_is_an_error() {
        let mut session = AnalysisSession::default();
        let result = session.run(&[], &null_progress()).await;
        assert!(matches!(result, Err(AnalysisError::NoBoundary)));
    }
}
