use std::time::Duration;

use super::TrainMetrics;

/// What the scheduler knows at the end of an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    /// The group-wide cost, averaged over the iteration's batches.
    pub cost: f64,
    /// Only present on evaluation iterations.
    pub train_accuracy: Option<f64>,
    pub test_accuracy: Option<f64>,
    /// Time since the first iteration started.
    pub elapsed: Duration,
}

impl IterationReport {
    pub fn evaluated(&self) -> bool {
        self.train_accuracy.is_some()
    }
}

/// The outcome of a whole training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub iterations: usize,
    pub final_cost: Option<f64>,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub elapsed: Duration,
    pub metrics: TrainMetrics,
}

/// Receives the scheduler's checkpoints.
///
/// Every member of the group calls the observer identically, deciding who reports is up to
/// the implementation.
pub trait TrainObserver {
    fn on_iteration(&mut self, _report: &IterationReport) {}

    fn on_finish(&mut self, _summary: &TrainSummary) {}
}

/// Ignores every checkpoint.
impl TrainObserver for () {}
