//! Fit orchestration.
//!
//! [`Refinement`] drives one fit end to end: collect the free parameters,
//! snapshot their starting values, hand the residual problem to the selected
//! backend, then synchronize refined values and uncertainties back onto the
//! live model objects and cache the calculated patterns. The orchestrator
//! owns the calculator and the backend selection; sample models and
//! experiments stay owned by the caller and are only borrowed per fit.

use std::fmt;

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::calculators::Calculator;
use crate::error::{RefineError, Result};
use crate::experiment::Experiments;
use crate::minimizers::{
    create_minimizer, free_parameters_mut, ConvergenceSummary, FreeParameterSet, ResidualProblem,
};
use crate::model::SampleModels;

/// Lifecycle of a refinement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitState {
    Idle,
    Collecting,
    Optimizing,
    Syncing,
    Done,
    Failed,
}

/// Per-parameter entry of a fit report.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterReport {
    /// Id of the owning sample model or experiment.
    pub block: String,

    /// Full CIF-style parameter name.
    pub name: String,

    /// Value at the start of the fit.
    pub start_value: f64,

    /// Refined value.
    pub value: f64,

    /// Standard uncertainty, absent for derivative-free backends and
    /// unconverged fits.
    pub uncertainty: Option<f64>,

    /// Whether the parameter was refined.
    pub free: bool,
}

/// Outcome of one fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    /// Whether the backend met its convergence criteria.
    pub success: bool,

    /// Human-readable outcome description.
    pub message: String,

    /// Reduced chi-square at the final parameter values.
    pub reduced_chi_square: Option<f64>,

    /// Report entries for the refined parameters, in collection order.
    pub params: Vec<ParameterReport>,

    /// Convergence history recorded during the fit.
    pub convergence: ConvergenceSummary,

    /// Number of objective evaluations.
    pub nfev: usize,

    /// Backend-specific extras.
    pub diagnostics: serde_json::Value,
}

impl FitResult {
    /// Result for a fit request with nothing to refine. Model state is left
    /// untouched and no objective evaluation takes place.
    fn no_op() -> Self {
        Self {
            success: false,
            message: "no free parameters, nothing to refine".to_string(),
            reduced_chi_square: None,
            params: Vec::new(),
            convergence: ConvergenceSummary::default(),
            nfev: 0,
            diagnostics: json!({}),
        }
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit result:")?;
        writeln!(f, "  success: {}", self.success)?;
        writeln!(f, "  message: {}", self.message)?;
        if let Some(red_chi2) = self.reduced_chi_square {
            writeln!(f, "  reduced chi-square: {:.6e}", red_chi2)?;
        }
        writeln!(f, "  evaluations: {}", self.nfev)?;
        writeln!(f, "  parameters:")?;
        for p in &self.params {
            match p.uncertainty {
                Some(su) => writeln!(
                    f,
                    "    {} {}: {:.6} -> {:.6} +/- {:.6}",
                    p.block, p.name, p.start_value, p.value, su
                )?,
                None => writeln!(
                    f,
                    "    {} {}: {:.6} -> {:.6}",
                    p.block, p.name, p.start_value, p.value
                )?,
            }
        }
        Ok(())
    }
}

/// Refinement session tying a calculator and a minimizer backend together.
pub struct Refinement {
    calculator: Option<Box<dyn Calculator>>,
    minimizer_name: String,
    state: FitState,
    results: Vec<FitResult>,
}

impl Default for Refinement {
    fn default() -> Self {
        Self::new()
    }
}

impl Refinement {
    pub fn new() -> Self {
        Self {
            calculator: None,
            minimizer_name: "leastsq".to_string(),
            state: FitState::Idle,
            results: Vec::new(),
        }
    }

    /// Install the pattern calculator used for every subsequent fit.
    pub fn set_calculator(&mut self, calculator: Box<dyn Calculator>) {
        self.calculator = Some(calculator);
    }

    /// Select the minimizer backend by registry name. Unknown names are
    /// rejected immediately rather than at fit time.
    pub fn set_minimizer_by_name(&mut self, name: &str) -> Result<()> {
        create_minimizer(name)?;
        self.minimizer_name = name.to_string();
        Ok(())
    }

    pub fn minimizer_name(&self) -> &str {
        &self.minimizer_name
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// Results of all fits run through this session, oldest first.
    pub fn results(&self) -> &[FitResult] {
        &self.results
    }

    pub fn last_result(&self) -> Option<&FitResult> {
        self.results.last()
    }

    /// Run one fit against the given sample models and experiments.
    pub fn fit(
        &mut self,
        models: &mut SampleModels,
        experiments: &mut Experiments,
    ) -> Result<FitResult> {
        match self.run_fit(models, experiments) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.state = FitState::Failed;
                Err(err)
            }
        }
    }

    fn run_fit(
        &mut self,
        models: &mut SampleModels,
        experiments: &mut Experiments,
    ) -> Result<FitResult> {
        if models.is_empty() {
            return Err(RefineError::Configuration(
                "no sample models defined".to_string(),
            ));
        }
        if experiments.is_empty() {
            return Err(RefineError::Configuration(
                "no experiments defined".to_string(),
            ));
        }
        let calculator = self
            .calculator
            .as_deref()
            .ok_or_else(|| RefineError::Configuration("no calculator set".to_string()))?;

        self.state = FitState::Collecting;
        let set = FreeParameterSet::collect(models, experiments)?;

        if set.is_empty() {
            info!("fit requested with no free parameters, skipping");
            let result = FitResult::no_op();
            self.results.push(result.clone());
            self.state = FitState::Done;
            return Ok(result);
        }

        info!(
            minimizer = %self.minimizer_name,
            n_free = set.len(),
            "starting fit"
        );

        // Snapshot starting values and clear stale uncertainties.
        for param in free_parameters_mut(models, experiments).iter_mut() {
            param.snapshot_start_value();
            param.set_uncertainty(None);
        }

        let minimizer = create_minimizer(&self.minimizer_name)?;

        self.state = FitState::Optimizing;
        let mut problem = ResidualProblem::new(models, experiments, calculator, set.len())?;
        let n_points = problem.residual_count();
        let backend_result = minimizer.fit(&mut problem, &set)?;
        let convergence = problem.tracker().summary();
        drop(problem);

        self.state = FitState::Syncing;

        // Write refined values and uncertainties onto the live parameters.
        let mut free = free_parameters_mut(models, experiments);
        if free.len() != set.len() {
            return Err(RefineError::DimensionMismatch(format!(
                "free parameter count changed during fit: {} -> {}",
                set.len(),
                free.len()
            )));
        }
        for (i, param) in free.iter_mut().enumerate() {
            param.assign(backend_result.values[i]);
            let su = if backend_result.success {
                backend_result.stderr.as_ref().map(|s| s[i])
            } else {
                None
            };
            param.set_uncertainty(su);
        }

        // Cache the calculated pattern (with background) on each experiment.
        let mut totals = Vec::with_capacity(experiments.len());
        for experiment in experiments.iter() {
            let y_calc = calculator.calculate_pattern(models, experiment)?;
            let total = match experiment.pattern.bkg() {
                Some(bkg) => y_calc + bkg,
                None => y_calc,
            };
            totals.push(total);
        }
        for (experiment, total) in experiments.iter_mut().zip(totals) {
            experiment.pattern.set_calc(total);
        }

        let dof = n_points.saturating_sub(set.len()).max(1);
        let red_chi2 = backend_result.cost / dof as f64;

        let params = set
            .iter()
            .enumerate()
            .map(|(i, fp)| ParameterReport {
                block: fp.block.clone(),
                name: fp.name.clone(),
                start_value: fp.start,
                value: backend_result.values[i],
                uncertainty: if backend_result.success {
                    backend_result.stderr.as_ref().map(|s| s[i])
                } else {
                    None
                },
                free: true,
            })
            .collect();

        let result = FitResult {
            success: backend_result.success,
            message: backend_result.message,
            reduced_chi_square: Some(red_chi2),
            params,
            convergence,
            nfev: backend_result.nfev,
            diagnostics: backend_result.diagnostics,
        };

        info!(
            success = result.success,
            reduced_chi_square = red_chi2,
            nfev = result.nfev,
            "fit finished"
        );

        self.results.push(result.clone());
        // Non-convergence is a backend-reported failure, distinct from the
        // no-op path which still ends in Done.
        self.state = if result.success {
            FitState::Done
        } else {
            FitState::Failed
        };

        Ok(result)
    }
}
