//! Residual function construction
//!
//! [`ResidualProblem`] borrows the live model objects for the duration of one
//! fit and turns an optimizer's parameter vector into a normalized residual
//! vector: values are written positionally onto the free parameters, the
//! calculator recomputes each experiment's pattern, the resolved background
//! is added, and `(meas - calc) / meas_su` is concatenated across experiments
//! in declaration order.

use crate::calculators::Calculator;
use crate::error::{RefineError, Result};
use crate::experiment::Experiments;
use crate::minimizers::free_set::free_parameters_mut;
use crate::minimizers::tracker::ChiSquareTracker;
use crate::model::SampleModels;
use ndarray::Array1;

/// The objective function evaluated by the minimizer backends.
///
/// Evaluation mutates shared parameter state, so the problem is not
/// reentrant: one fit at a time per model graph.
pub struct ResidualProblem<'a> {
    models: &'a mut SampleModels,
    experiments: &'a mut Experiments,
    calculator: &'a dyn Calculator,
    tracker: ChiSquareTracker,
    n_free: usize,
    n_points: usize,
}

impl std::fmt::Debug for ResidualProblem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidualProblem")
            .field("n_free", &self.n_free)
            .field("n_points", &self.n_points)
            .finish_non_exhaustive()
    }
}

impl<'a> ResidualProblem<'a> {
    /// Build the residual problem, validating the data configuration up
    /// front: every experiment must carry measured data, and the total point
    /// count must exceed the number of free parameters or the reduced
    /// chi-square is undefined.
    pub fn new(
        models: &'a mut SampleModels,
        experiments: &'a mut Experiments,
        calculator: &'a dyn Calculator,
        n_free: usize,
    ) -> Result<Self> {
        let mut n_points = 0;
        for experiment in experiments.iter() {
            if !experiment.pattern.has_measured_data() {
                return Err(RefineError::MissingData(format!(
                    "experiment '{}' has no measured pattern",
                    experiment.id
                )));
            }
            n_points += experiment.pattern.len();
        }

        if n_points <= n_free {
            return Err(RefineError::DegreesOfFreedom { n_points, n_free });
        }

        Ok(Self {
            models,
            experiments,
            calculator,
            tracker: ChiSquareTracker::new(n_free),
            n_free,
            n_points,
        })
    }

    /// Number of elements in the optimizer's parameter vector.
    pub fn parameter_count(&self) -> usize {
        self.n_free
    }

    /// Number of residuals; constant across calls for one fit.
    pub fn residual_count(&self) -> usize {
        self.n_points
    }

    pub fn tracker(&self) -> &ChiSquareTracker {
        &self.tracker
    }

    /// Evaluate the residual vector at the given parameter values.
    pub fn eval(&mut self, values: &Array1<f64>) -> Result<Array1<f64>> {
        self.sync_parameters(values)?;

        let mut residuals = Vec::with_capacity(self.n_points);

        for experiment in self.experiments.iter() {
            let y_calc = self
                .calculator
                .calculate_pattern(self.models, experiment)?;

            let pattern = &experiment.pattern;
            if y_calc.len() != pattern.len() {
                return Err(RefineError::DimensionMismatch(format!(
                    "calculator returned {} points for experiment '{}' with {} measured points",
                    y_calc.len(),
                    experiment.id,
                    pattern.len()
                )));
            }

            let (meas, su) = match (pattern.meas(), pattern.meas_su()) {
                (Some(meas), Some(su)) => (meas, su),
                _ => {
                    return Err(RefineError::MissingData(format!(
                        "experiment '{}' lost its measured pattern mid-fit",
                        experiment.id
                    )))
                }
            };

            match pattern.bkg() {
                Some(bkg) => {
                    for i in 0..meas.len() {
                        residuals.push((meas[i] - (y_calc[i] + bkg[i])) / su[i]);
                    }
                }
                None => {
                    for i in 0..meas.len() {
                        residuals.push((meas[i] - y_calc[i]) / su[i]);
                    }
                }
            }
        }

        let residuals = Array1::from_vec(residuals);
        self.tracker.track(&residuals);

        Ok(residuals)
    }

    /// Write optimizer values onto the free parameters, in collection order.
    /// This is the only place the engine mutates domain state during
    /// optimization.
    fn sync_parameters(&mut self, values: &Array1<f64>) -> Result<()> {
        let mut free = free_parameters_mut(self.models, self.experiments);

        if values.len() != free.len() {
            return Err(RefineError::DimensionMismatch(format!(
                "optimizer passed {} values for {} free parameters",
                values.len(),
                free.len()
            )));
        }

        for (param, &value) in free.iter_mut().zip(values.iter()) {
            param.assign(value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::FnCalculator;
    use crate::experiment::{BeamMode, Experiment, RadiationProbe};
    use crate::model::{SampleModel, SampleModels};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn linear_calculator() -> impl Calculator {
        // y = a*x + b with a = cell.length_a, b = cell.length_b
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

    fn setup() -> (SampleModels, Experiments) {
        let mut models = SampleModels::new();
        let mut model = SampleModel::new("m");
        model.cell.length_a.assign(1.0);
        model.cell.length_b.assign(1.0);
        model.cell.length_a.set_free(true);
        model.cell.length_b.set_free(true);
        models.add(model);

        let mut experiments = Experiments::new();
        let mut expt = Experiment::new("e1", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
        let x = array![0.0, 1.0, 2.0, 3.0];
        let meas = x.mapv(|xi| 2.0 * xi + 3.0);
        expt.pattern
            .set_measured_data(x, meas, Some(array![1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        experiments.add(expt);

        (models, experiments)
    }

    #[test]
    fn test_eval_syncs_then_computes_residuals() {
        let (mut models, mut experiments) = setup();
        let calc = linear_calculator();
        let mut problem = ResidualProblem::new(&mut models, &mut experiments, &calc, 2).unwrap();

        // At the exact solution the residuals vanish.
        let r = problem.eval(&array![2.0, 3.0]).unwrap();
        assert_eq!(r.len(), 4);
        for ri in r.iter() {
            assert_relative_eq!(*ri, 0.0, epsilon = 1e-12);
        }

        // Values were written onto the live parameters.
        drop(problem);
        let model = models.get("m").unwrap();
        assert_relative_eq!(model.cell.length_a.value(), 2.0);
        assert_relative_eq!(model.cell.length_b.value(), 3.0);
    }

    #[test]
    fn test_background_is_added_to_calculated_pattern() {
        let (mut models, mut experiments) = setup();
        experiments
            .get_mut("e1")
            .unwrap()
            .pattern
            .set_background(array![1.0, 1.0, 1.0, 1.0])
            .unwrap();

        let calc = linear_calculator();
        let mut problem = ResidualProblem::new(&mut models, &mut experiments, &calc, 2).unwrap();

        let r = problem.eval(&array![2.0, 3.0]).unwrap();
        // meas - (calc + bkg) = -1 at every point
        for ri in r.iter() {
            assert_relative_eq!(*ri, -1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_measured_data_is_fatal() {
        let (mut models, mut experiments) = setup();
        experiments.add(Experiment::new(
            "empty",
            BeamMode::ConstantWavelength,
            RadiationProbe::Neutron,
        ));

        let calc = linear_calculator();
        let err = ResidualProblem::new(&mut models, &mut experiments, &calc, 2).unwrap_err();
        assert!(matches!(err, RefineError::MissingData(_)));
    }

    #[test]
    fn test_dof_guard() {
        let (mut models, mut experiments) = setup();
        let calc = linear_calculator();

        // 4 points, 4 free parameters: reduced chi-square undefined.
        let err = ResidualProblem::new(&mut models, &mut experiments, &calc, 4).unwrap_err();
        assert!(matches!(
            err,
            RefineError::DegreesOfFreedom {
                n_points: 4,
                n_free: 4
            }
        ));
    }

    #[test]
    fn test_calculator_error_propagates_unmodified() {
        let (mut models, mut experiments) = setup();
        let calc = FnCalculator::new("broken", |_: &SampleModels, _: &Experiment| {
            Err(RefineError::Calculator(
                "unsupported radiation probe".to_string(),
            ))
        });

        let mut problem = ResidualProblem::new(&mut models, &mut experiments, &calc, 2).unwrap();
        let err = problem.eval(&array![1.0, 1.0]).unwrap_err();
        match err {
            RefineError::Calculator(msg) => {
                assert_eq!(msg, "unsupported radiation probe")
            }
            other => panic!("expected Calculator error, got {:?}", other),
        }
    }

    #[test]
    fn test_two_experiments_concatenate_in_declaration_order() {
        let (mut models, mut experiments) = setup();
        let mut second =
            Experiment::new("e2", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
        let x = array![0.0, 1.0];
        // Offset from the true line by +1 at every point.
        let meas = x.mapv(|xi| 2.0 * xi + 4.0);
        second
            .pattern
            .set_measured_data(x, meas, Some(array![1.0, 1.0]))
            .unwrap();
        experiments.add(second);

        let calc = linear_calculator();
        let mut problem = ResidualProblem::new(&mut models, &mut experiments, &calc, 2).unwrap();
        assert_eq!(problem.residual_count(), 6);

        let r = problem.eval(&array![2.0, 3.0]).unwrap();
        assert_eq!(r.len(), 6);
        // First experiment's points come first and are exact.
        for i in 0..4 {
            assert_relative_eq!(r[i], 0.0, epsilon = 1e-12);
        }
        for i in 4..6 {
            assert_relative_eq!(r[i], 1.0, epsilon = 1e-12);
        }
    }
}
