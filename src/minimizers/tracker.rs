//! Reduced chi-square tracking
//!
//! The tracker observes every residual evaluation, computes the reduced
//! chi-square, and narrates improvements. An "iteration" here advances only
//! when the reduced chi-square improves by more than 1% relative to the
//! previous recorded value; it is a reporting cadence, not the backend's own
//! loop counter, and never terminates the optimizer.

use ndarray::Array1;
use serde::Serialize;
use tracing::{debug, info};

/// Relative improvement required before a new iteration is recorded.
const IMPROVEMENT_THRESHOLD: f64 = 0.01;

/// One recorded improvement event.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceRecord {
    /// Reporting iteration at which the improvement was seen.
    pub iteration: usize,

    /// Previously recorded reduced chi-square, absent on the first evaluation.
    pub previous: Option<f64>,

    /// Newly recorded reduced chi-square.
    pub reduced_chi_square: f64,

    /// Whether this value was the best seen so far when recorded.
    pub best_so_far: bool,
}

/// Snapshot of the tracker state attached to a fit result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvergenceSummary {
    /// Improvement events in the order they occurred.
    pub records: Vec<ConvergenceRecord>,

    /// Number of reporting iterations (>1% improvements).
    pub iterations: usize,

    /// Total number of objective evaluations observed.
    pub evaluations: usize,

    /// Best reduced chi-square seen during the fit.
    pub best_reduced_chi_square: Option<f64>,

    /// Reporting iteration at which the best value was seen.
    pub best_iteration: Option<usize>,

    /// Last recorded reduced chi-square.
    pub final_reduced_chi_square: Option<f64>,
}

/// Tracks reduced chi-square across the life of one fit.
#[derive(Debug, Default)]
pub struct ChiSquareTracker {
    n_free: usize,
    iteration: usize,
    evaluations: usize,
    previous: Option<f64>,
    best: Option<f64>,
    best_iteration: Option<usize>,
    records: Vec<ConvergenceRecord>,
}

impl ChiSquareTracker {
    pub fn new(n_free: usize) -> Self {
        Self {
            n_free,
            ..Self::default()
        }
    }

    /// Observe one residual evaluation. Returns the reduced chi-square.
    ///
    /// The residual vector passes through unmodified; the degrees-of-freedom
    /// guard lives in the residual problem, which rejects configurations
    /// where `n_points <= n_free` before the first evaluation.
    pub fn track(&mut self, residuals: &Array1<f64>) -> f64 {
        self.evaluations += 1;

        let chi2: f64 = residuals.iter().map(|r| r.powi(2)).sum();
        let dof = residuals.len().saturating_sub(self.n_free).max(1);
        let red_chi2 = chi2 / dof as f64;

        match self.previous {
            None => {
                self.iteration = 1;
                self.previous = Some(red_chi2);
                self.best = Some(red_chi2);
                self.best_iteration = Some(1);
                self.records.push(ConvergenceRecord {
                    iteration: 1,
                    previous: None,
                    reduced_chi_square: red_chi2,
                    best_so_far: true,
                });
                info!(
                    iteration = 1,
                    reduced_chi_square = red_chi2,
                    "starting reduced chi-square"
                );
            }
            Some(previous) if (previous - red_chi2) / previous > IMPROVEMENT_THRESHOLD => {
                self.iteration += 1;
                let best_so_far = self.best.map_or(true, |b| red_chi2 < b);
                self.records.push(ConvergenceRecord {
                    iteration: self.iteration,
                    previous: Some(previous),
                    reduced_chi_square: red_chi2,
                    best_so_far,
                });
                info!(
                    iteration = self.iteration,
                    previous_reduced_chi_square = previous,
                    reduced_chi_square = red_chi2,
                    change_percent = (previous - red_chi2) / previous * 100.0,
                    "reduced chi-square improved"
                );
                self.previous = Some(red_chi2);
            }
            Some(_) => {
                debug!(
                    evaluation = self.evaluations,
                    reduced_chi_square = red_chi2,
                    "objective evaluation"
                );
            }
        }

        if self.best.map_or(true, |b| red_chi2 < b) {
            self.best = Some(red_chi2);
            self.best_iteration = Some(self.iteration);
        }

        red_chi2
    }

    /// Number of reporting iterations so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Number of objective evaluations observed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Best reduced chi-square seen so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Freeze the tracker state for reporting.
    pub fn summary(&self) -> ConvergenceSummary {
        ConvergenceSummary {
            records: self.records.clone(),
            iterations: self.iteration,
            evaluations: self.evaluations,
            best_reduced_chi_square: self.best,
            best_iteration: self.best_iteration,
            final_reduced_chi_square: self.previous,
        }
    }
}
