//! # pdrefine
//!
//! `pdrefine` is a refinement engine for polycrystalline diffraction data:
//! least-squares adjustment of crystallographic and instrumental parameters
//! until calculated patterns match measured ones.
//!
//! The library provides:
//! - A parameter system with free flags, bounds, and post-fit uncertainties
//! - Sample model and experiment containers built from CIF-style components
//! - Interchangeable minimizer backends selected by name
//! - A fit orchestrator that synchronizes refined values back onto the model
//!
//! Diffraction physics itself stays outside the crate behind the
//! [`Calculator`](calculators::Calculator) trait.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use pdrefine::{Experiment, Experiments, Refinement, SampleModel, SampleModels};
//! use pdrefine::experiment::{BeamMode, RadiationProbe};
//! use pdrefine::calculators::FnCalculator;
//! use ndarray::Array1;
//!
//! let mut models = SampleModels::new();
//! let mut model = SampleModel::new("pbso4");
//! model.cell.length_a.set_free(true);
//! models.add(model);
//!
//! let mut experiments = Experiments::new();
//! let mut expt = Experiment::new("npd", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
//! let x = Array1::linspace(10.0, 140.0, 500);
//! let meas = Array1::ones(500);
//! expt.pattern.set_measured_data(x, meas, None).unwrap();
//! experiments.add(expt);
//!
//! let mut refinement = Refinement::new();
//! refinement.set_calculator(Box::new(FnCalculator::new("demo", |_models, expt| {
//!     Ok(Array1::ones(expt.pattern.len()))
//! })));
//! refinement.set_minimizer_by_name("leastsq").unwrap();
//!
//! let result = refinement.fit(&mut models, &mut experiments).unwrap();
//! println!("{}", result);
//! ```

pub mod calculators;
pub mod error;
pub mod experiment;
pub mod fitting;
pub mod minimizers;
pub mod model;
pub mod parameters;

mod utils;

// Re-exports for convenience
pub use calculators::{Calculator, FnCalculator};
pub use error::{RefineError, Result};
pub use experiment::{Experiment, Experiments};
pub use fitting::{FitResult, FitState, ParameterReport, Refinement};
pub use minimizers::{
    available_minimizers, create_minimizer, ConvergenceRecord, ConvergenceSummary,
    FreeParameterSet, Minimizer,
};
pub use model::{SampleModel, SampleModels};
pub use parameters::{Bounds, Descriptor, Parameter};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
