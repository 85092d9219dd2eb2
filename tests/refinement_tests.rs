//! End-to-end refinement tests against synthetic calculators.

use approx::assert_relative_eq;
use ndarray::Array1;
use pdrefine::calculators::{Calculator, FnCalculator};
use pdrefine::experiment::{BeamMode, Experiment, Experiments, RadiationProbe};
use pdrefine::model::{SampleModel, SampleModels};
use pdrefine::{FitState, FreeParameterSet, RefineError, Refinement};

/// A synthetic "pattern": y = a * x + b with a = cell.length_a and
/// b = cell.length_b of the first sample model.
fn linear_calculator() -> Box<dyn Calculator> {
    Box::new(FnCalculator::new(
        "linear",
        |models: &SampleModels, expt: &Experiment| {
            let model = models
                .iter()
                .next()
                .ok_or_else(|| RefineError::Calculator("no sample model".to_string()))?;
            let a = model.cell.length_a.value();
            let b = model.cell.length_b.value();
            let x = expt
                .pattern
                .x()
                .ok_or_else(|| RefineError::Calculator("no x grid".to_string()))?;
            Ok(x.mapv(|xi| a * xi + b))
        },
    ))
}

fn linear_setup(n_points: usize) -> (SampleModels, Experiments) {
    let mut models = SampleModels::new();
    let mut model = SampleModel::new("m");
    model.cell.length_a.set_value(1.0).unwrap();
    model.cell.length_b.set_value(1.0).unwrap();
    model.cell.length_a.set_free(true);
    model.cell.length_b.set_free(true);
    models.add(model);

    let mut experiments = Experiments::new();
    let mut expt = Experiment::new("e1", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
    let x = Array1::linspace(0.0, 10.0, n_points);
    let meas = x.mapv(|xi| 2.0 * xi + 3.0);
    let su = Array1::ones(n_points);
    expt.pattern.set_measured_data(x, meas, Some(su)).unwrap();
    experiments.add(expt);

    (models, experiments)
}

fn configured_refinement(minimizer: &str) -> Refinement {
    let mut refinement = Refinement::new();
    refinement.set_calculator(linear_calculator());
    refinement.set_minimizer_by_name(minimizer).unwrap();
    refinement
}

#[test]
fn test_linear_fit_with_least_squares() {
    let (mut models, mut experiments) = linear_setup(50);
    let mut refinement = configured_refinement("leastsq");

    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    assert!(result.success, "message: {}", result.message);
    assert_eq!(refinement.state(), FitState::Done);

    let model = models.get("m").unwrap();
    assert_relative_eq!(model.cell.length_a.value(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(model.cell.length_b.value(), 3.0, epsilon = 1e-4);

    // Exact data: reduced chi-square collapses to zero.
    assert!(result.reduced_chi_square.unwrap() < 1e-8);

    // Successful least-squares fits report uncertainties.
    assert!(model.cell.length_a.uncertainty().is_some());
    assert!(model.cell.length_b.uncertainty().is_some());

    // Start values were snapshotted before optimization moved anything.
    assert_relative_eq!(model.cell.length_a.start_value().unwrap(), 1.0);
    assert_relative_eq!(model.cell.length_b.start_value().unwrap(), 1.0);

    // The calculated pattern was cached on the experiment.
    let expt = experiments.get("e1").unwrap();
    let calc = expt.pattern.calc().unwrap();
    let meas = expt.pattern.meas().unwrap();
    for (c, m) in calc.iter().zip(meas.iter()) {
        assert_relative_eq!(*c, *m, epsilon = 1e-3);
    }
}

#[test]
fn test_linear_fit_with_nelder_mead() {
    let (mut models, mut experiments) = linear_setup(50);
    let mut refinement = configured_refinement("neldermead");

    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    assert!(result.success, "message: {}", result.message);
    let model = models.get("m").unwrap();
    assert_relative_eq!(model.cell.length_a.value(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(model.cell.length_b.value(), 3.0, epsilon = 1e-4);

    // Derivative-free backend: no uncertainties.
    assert!(model.cell.length_a.uncertainty().is_none());
    for p in &result.params {
        assert!(p.uncertainty.is_none());
    }
}

#[test]
fn test_reduced_chi_square_never_worsens() {
    let (mut models, mut experiments) = linear_setup(50);

    // Perturb the data so the fit cannot reach zero.
    {
        let expt = experiments.get_mut("e1").unwrap();
        let x = expt.pattern.x().unwrap().clone();
        let meas = x.mapv(|xi| 2.0 * xi + 3.0 + (xi * 20.0).sin() * 0.5);
        expt.pattern
            .set_measured_data(x, meas, Some(Array1::ones(50)))
            .unwrap();
    }

    let mut refinement = configured_refinement("leastsq");
    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    let first = result.convergence.records.first().unwrap().reduced_chi_square;
    let last = result.convergence.final_reduced_chi_square.unwrap();
    assert!(last <= first);
    assert!(result.convergence.best_reduced_chi_square.unwrap() <= last);
}

#[test]
fn test_no_free_parameters_is_a_no_op() {
    let (mut models, mut experiments) = linear_setup(20);
    models.get_mut("m").unwrap().cell.length_a.set_free(false);
    models.get_mut("m").unwrap().cell.length_b.set_free(false);

    let mut refinement = configured_refinement("leastsq");
    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    assert!(!result.success);
    assert_eq!(result.nfev, 0);
    assert_eq!(refinement.state(), FitState::Done);

    // Model state untouched.
    let model = models.get("m").unwrap();
    assert_relative_eq!(model.cell.length_a.value(), 1.0);
    assert_relative_eq!(model.cell.length_b.value(), 1.0);
    assert!(model.cell.length_a.start_value().is_none());
}

#[test]
fn test_underdetermined_fit_is_rejected() {
    // 2 points, 2 free parameters: no degrees of freedom.
    let (mut models, mut experiments) = linear_setup(2);
    let mut refinement = configured_refinement("leastsq");

    let err = refinement.fit(&mut models, &mut experiments).unwrap_err();
    assert!(matches!(
        err,
        RefineError::DegreesOfFreedom {
            n_points: 2,
            n_free: 2
        }
    ));
    assert_eq!(refinement.state(), FitState::Failed);
}

#[test]
fn test_backend_switching_mid_session() {
    let (mut models, mut experiments) = linear_setup(50);
    let mut refinement = configured_refinement("leastsq");

    refinement.fit(&mut models, &mut experiments).unwrap();

    // Move the parameters off the solution and refit with the other backend.
    {
        let model = models.get_mut("m").unwrap();
        model.cell.length_a.set_value(0.5).unwrap();
        model.cell.length_b.set_value(7.0).unwrap();
    }

    refinement.set_minimizer_by_name("neldermead").unwrap();
    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    assert!(result.success);
    assert_eq!(refinement.results().len(), 2);

    // Both fits refined the same parameter identities.
    let first = &refinement.results()[0];
    let second = &refinement.results()[1];
    let names_first: Vec<&str> = first.params.iter().map(|p| p.name.as_str()).collect();
    let names_second: Vec<&str> = second.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names_first, names_second);

    let model = models.get("m").unwrap();
    assert_relative_eq!(model.cell.length_a.value(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(model.cell.length_b.value(), 3.0, epsilon = 1e-4);
}

#[test]
fn test_two_experiments_share_parameters() {
    let (mut models, mut experiments) = linear_setup(30);

    let mut second = Experiment::new("e2", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
    let x = Array1::linspace(-5.0, 5.0, 17);
    let meas = x.mapv(|xi| 2.0 * xi + 3.0);
    second
        .pattern
        .set_measured_data(x, meas, Some(Array1::ones(17)))
        .unwrap();
    experiments.add(second);

    let set = FreeParameterSet::collect(&models, &experiments).unwrap();
    assert_eq!(set.len(), 2);

    let mut refinement = configured_refinement("leastsq");
    let result = refinement.fit(&mut models, &mut experiments).unwrap();

    assert!(result.success);
    // Both experiments got their calculated patterns cached.
    assert_eq!(experiments.get("e1").unwrap().pattern.calc().unwrap().len(), 30);
    assert_eq!(experiments.get("e2").unwrap().pattern.calc().unwrap().len(), 17);
}

#[test]
fn test_calculator_failure_propagates_and_marks_session_failed() {
    let (mut models, mut experiments) = linear_setup(20);

    let mut refinement = Refinement::new();
    refinement.set_calculator(Box::new(FnCalculator::new(
        "broken",
        |_: &SampleModels, _: &Experiment| {
            Err(RefineError::Calculator(
                "unsupported radiation probe".to_string(),
            ))
        },
    )));

    let err = refinement.fit(&mut models, &mut experiments).unwrap_err();
    match err {
        RefineError::Calculator(msg) => assert_eq!(msg, "unsupported radiation probe"),
        other => panic!("expected Calculator error, got {:?}", other),
    }
    assert_eq!(refinement.state(), FitState::Failed);
}

#[test]
fn test_bounded_parameter_stays_inside_bounds() {
    let (mut models, mut experiments) = linear_setup(50);
    models
        .get_mut("m")
        .unwrap()
        .cell
        .length_a
        .set_bounds(0.0, 1.5)
        .unwrap();

    let mut refinement = configured_refinement("leastsq");
    // The fit cannot reach the true slope of 2.0, but must stay in bounds.
    let _ = refinement.fit(&mut models, &mut experiments).unwrap();

    let a = models.get("m").unwrap().cell.length_a.value();
    assert!(a <= 1.5 + 1e-12);
    assert!(a >= 0.0);
}

#[test]
fn test_missing_experiment_data_is_rejected() {
    let (mut models, mut experiments) = linear_setup(20);
    experiments.add(Experiment::new(
        "no_data",
        BeamMode::ConstantWavelength,
        RadiationProbe::Neutron,
    ));

    let mut refinement = configured_refinement("leastsq");
    let err = refinement.fit(&mut models, &mut experiments).unwrap_err();
    assert!(matches!(err, RefineError::MissingData(_)));
}
