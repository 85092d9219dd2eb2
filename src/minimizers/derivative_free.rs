//! Derivative-free backend.
//!
//! Nelder-Mead simplex descent on the summed squared residuals. No gradients
//! are formed, so the backend tolerates noisy or non-smooth calculators, and
//! it reports no parameter uncertainties. Every trial vertex is clamped into
//! the parameter bounds before evaluation.

use ndarray::Array1;
use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::minimizers::free_set::FreeParameterSet;
use crate::minimizers::residual::ResidualProblem;
use crate::minimizers::{Minimizer, MinimizerResult};

/// Relative perturbation used to build the initial simplex.
const INITIAL_SIMPLEX_SCALE: f64 = 0.05;

/// Absolute perturbation for coordinates at exactly zero.
const ZERO_COORDINATE_STEP: f64 = 0.00025;

/// Configuration options for the simplex backend.
#[derive(Debug, Clone)]
pub struct DerivativeFreeConfig {
    /// Maximum number of simplex update iterations.
    pub max_iterations: usize,

    /// Convergence tolerance on the cost spread across the simplex.
    pub ftol: f64,

    /// Convergence tolerance on the simplex extent.
    pub xtol: f64,

    /// Reflection coefficient.
    pub alpha: f64,

    /// Expansion coefficient.
    pub gamma: f64,

    /// Contraction coefficient.
    pub rho: f64,

    /// Shrink coefficient.
    pub sigma: f64,
}

impl Default for DerivativeFreeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            ftol: 1e-10,
            xtol: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
        }
    }
}

/// Nelder-Mead simplex minimizer.
#[derive(Debug, Clone, Default)]
pub struct DerivativeFreeMinimizer {
    config: DerivativeFreeConfig,
}

impl DerivativeFreeMinimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DerivativeFreeConfig) -> Self {
        Self { config }
    }

    /// Set the maximum number of simplex updates.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance on the cost spread.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }
}

fn cost_of(problem: &mut ResidualProblem<'_>, x: &Array1<f64>) -> Result<f64> {
    let residuals = problem.eval(x)?;
    Ok(residuals.iter().map(|r| r.powi(2)).sum())
}

impl Minimizer for DerivativeFreeMinimizer {
    fn name(&self) -> &'static str {
        "neldermead"
    }

    fn fit(
        &self,
        problem: &mut ResidualProblem<'_>,
        params: &FreeParameterSet,
    ) -> Result<MinimizerResult> {
        let n = params.len();
        let x0 = params.clamp(&params.initial_values());

        // Initial simplex: x0 plus one perturbed vertex per dimension.
        let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
        let f0 = cost_of(problem, &x0)?;
        simplex.push((x0.clone(), f0));
        for j in 0..n {
            let mut vertex = x0.clone();
            vertex[j] = if vertex[j] != 0.0 {
                vertex[j] * (1.0 + INITIAL_SIMPLEX_SCALE)
            } else {
                ZERO_COORDINATE_STEP
            };
            let vertex = params.clamp(&vertex);
            let f = cost_of(problem, &vertex)?;
            simplex.push((vertex, f));
        }

        let mut iterations = 0;
        let mut converged = false;
        let mut message = format!(
            "did not converge within {} iterations",
            self.config.max_iterations
        );

        for iteration in 1..=self.config.max_iterations {
            iterations = iteration;
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = &simplex[0];
            let worst = &simplex[n];

            // Cost spread and simplex extent as convergence criteria.
            let spread = (worst.1 - best.1).abs();
            let extent = simplex[1..]
                .iter()
                .map(|(v, _)| {
                    v.iter()
                        .zip(best.0.iter())
                        .map(|(a, b)| (a - b).abs())
                        .fold(0.0_f64, f64::max)
                })
                .fold(0.0_f64, f64::max);

            if spread <= self.config.ftol * (best.1.abs() + self.config.ftol)
                || extent <= self.config.xtol
            {
                converged = true;
                message = "converged: simplex collapsed".to_string();
                break;
            }

            // Centroid of all vertices except the worst.
            let mut centroid = Array1::zeros(n);
            for (vertex, _) in simplex[..n].iter() {
                centroid = centroid + vertex;
            }
            centroid.mapv_inplace(|c| c / n as f64);

            let worst_point = simplex[n].0.clone();
            let worst_cost = simplex[n].1;
            let second_worst_cost = simplex[n - 1].1;
            let best_cost = simplex[0].1;

            let reflected =
                params.clamp(&(&centroid + &((&centroid - &worst_point) * self.config.alpha)));
            let f_reflected = cost_of(problem, &reflected)?;

            if f_reflected < best_cost {
                // Try to expand further along the same direction.
                let expanded = params
                    .clamp(&(&centroid + &((&reflected - &centroid) * self.config.gamma)));
                let f_expanded = cost_of(problem, &expanded)?;
                if f_expanded < f_reflected {
                    simplex[n] = (expanded, f_expanded);
                } else {
                    simplex[n] = (reflected, f_reflected);
                }
            } else if f_reflected < second_worst_cost {
                simplex[n] = (reflected, f_reflected);
            } else {
                // Contract toward the better of worst and reflected.
                let contracted = if f_reflected < worst_cost {
                    params.clamp(
                        &(&centroid + &((&reflected - &centroid) * self.config.rho)),
                    )
                } else {
                    params.clamp(
                        &(&centroid + &((&worst_point - &centroid) * self.config.rho)),
                    )
                };
                let f_contracted = cost_of(problem, &contracted)?;

                if f_contracted < worst_cost.min(f_reflected) {
                    simplex[n] = (contracted, f_contracted);
                } else {
                    // Shrink everything toward the best vertex.
                    let best_point = simplex[0].0.clone();
                    for entry in simplex[1..].iter_mut() {
                        let shrunk = params.clamp(
                            &(&best_point + &((&entry.0 - &best_point) * self.config.sigma)),
                        );
                        let f = cost_of(problem, &shrunk)?;
                        *entry = (shrunk, f);
                    }
                }
            }

            if iteration % 100 == 0 {
                debug!(iteration, best_cost = simplex[0].1, "simplex progress");
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best_point, best_cost) = simplex.swap_remove(0);

        // Leave the model state parked at the best vertex.
        let _ = problem.eval(&best_point)?;

        Ok(MinimizerResult {
            values: best_point,
            stderr: None,
            cost: best_cost,
            nfev: problem.tracker().evaluations(),
            iterations,
            success: converged,
            message,
            diagnostics: json!({
                "engine": "neldermead",
                "simplex_size": n + 1,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{Calculator, FnCalculator};
    use crate::error::RefineError;
    use crate::experiment::{BeamMode, Experiment, Experiments, RadiationProbe};
    use crate::model::{SampleModel, SampleModels};
    use approx::assert_relative_eq;

    fn linear_setup(a0: f64, b0: f64) -> (SampleModels, Experiments) {
        let mut models = SampleModels::new();
        let mut model = SampleModel::new("m");
        model.cell.length_a.assign(a0);
        model.cell.length_b.assign(b0);
        model.cell.length_a.set_free(true);
        model.cell.length_b.set_free(true);
        models.add(model);

        let mut experiments = Experiments::new();
        let mut expt = Experiment::new("e", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
        let x = Array1::linspace(0.0, 5.0, 20);
        let meas = x.mapv(|xi| 2.0 * xi + 3.0);
        let su = Array1::ones(20);
        expt.pattern.set_measured_data(x, meas, Some(su)).unwrap();
        experiments.add(expt);

        (models, experiments)
    }

    fn linear_calculator() -> impl Calculator {
        FnCalculator::new("linear", |models: &SampleModels, expt: &Experiment| {
            let model = models.iter().next().ok_or_else(|| {
                RefineError::Calculator("no sample model".to_string())
            })?;
            let a = model.cell.length_a.value();
            let b = model.cell.length_b.value();
            let x = expt
                .pattern
                .x()
                .ok_or_else(|| RefineError::Calculator("no x grid".to_string()))?;
            Ok(x.mapv(|xi| a * xi + b))
        })
    }

    #[test]
    fn test_fits_linear_model_without_derivatives() {
        let (mut models, mut experiments) = linear_setup(1.0, 1.0);
        let calc = linear_calculator();
        let set = FreeParameterSet::collect(&models, &experiments).unwrap();
        let mut problem =
            ResidualProblem::new(&mut models, &mut experiments, &calc, set.len()).unwrap();

        let result = DerivativeFreeMinimizer::new().fit(&mut problem, &set).unwrap();

        assert!(result.success, "message: {}", result.message);
        assert_relative_eq!(result.values[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.values[1], 3.0, epsilon = 1e-4);
        assert!(result.stderr.is_none());
    }

    #[test]
    fn test_bounds_are_respected() {
        let (mut models, mut experiments) = linear_setup(1.0, 1.0);
        models
            .get_mut("m")
            .unwrap()
            .cell
            .length_a
            .set_bounds(0.0, 1.5)
            .unwrap();

        let calc = linear_calculator();
        let set = FreeParameterSet::collect(&models, &experiments).unwrap();
        let mut problem =
            ResidualProblem::new(&mut models, &mut experiments, &calc, set.len()).unwrap();

        let result = DerivativeFreeMinimizer::new().fit(&mut problem, &set).unwrap();
        assert!(result.values[0] <= 1.5 + 1e-12);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let (mut models, mut experiments) = linear_setup(100.0, -50.0);
        let calc = linear_calculator();
        let set = FreeParameterSet::collect(&models, &experiments).unwrap();
        let mut problem =
            ResidualProblem::new(&mut models, &mut experiments, &calc, set.len()).unwrap();

        let minimizer = DerivativeFreeMinimizer::new().with_max_iterations(2);
        let result = minimizer.fit(&mut problem, &set).unwrap();
        assert!(!result.success);
    }
}
