//! Descriptor and Parameter definitions
//!
//! `Parameter` is the fundamental building block of the refinement engine: a
//! named, boxed scalar with a free flag, bounds, and post-fit uncertainty.
//! `Descriptor` is its non-refinable sibling for informational or derived
//! quantities. Only `Parameter` instances are eligible for collection into
//! an optimization vector.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),
}

/// Sanitize a CIF-style name into an identifier safe for any minimizer
/// backend: some backends forbid punctuation in parameter names.
///
/// Rules follow CIF naming conventions: `[` becomes `_`, `]` and `'` are
/// stripped, `.` becomes `_`.
pub fn sanitize_cif_name(raw: &str) -> String {
    raw.replace('[', "_")
        .replace(']', "")
        .replace('.', "_")
        .replace('\'', "")
}

/// A non-refinable named value.
///
/// Descriptors carry the same naming metadata as parameters but are never
/// collected for refinement; they hold informational or derived quantities
/// such as a space-group symbol or an atom-site label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor<T> {
    /// CIF-style name of the descriptor (e.g. "name_H-M_alt")
    pub cif_name: String,

    /// Current value
    value: T,

    /// Units of the value, if any
    pub units: Option<String>,

    /// Human-readable description
    pub description: Option<String>,
}

impl<T> Descriptor<T> {
    /// Create a new descriptor with the given CIF name and value.
    pub fn new(cif_name: &str, value: T) -> Self {
        Self {
            cif_name: cif_name.to_string(),
            value,
            units: None,
            description: None,
        }
    }

    /// Set the units string, builder style.
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    /// Get the current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Set the value.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }
}

/// A refinable scalar parameter.
///
/// Parameters are owned by their containing domain object (a cell length, an
/// instrument offset, ...); the refinement engine only reads and writes them
/// for the duration of one fit. `start_value` is snapshotted at fit start and
/// `uncertainty` is populated only after a successful fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// CIF-style name of the parameter (e.g. "length_a")
    pub cif_name: String,

    /// Current value of the parameter
    value: f64,

    /// Whether this parameter is refined during optimization
    free: bool,

    /// Minimum and maximum bounds for the parameter value
    bounds: Bounds,

    /// Standard uncertainty of the parameter (set after a successful fit)
    uncertainty: Option<f64>,

    /// Value at the start of the most recent fit
    start_value: Option<f64>,

    /// Units of the value, if any
    pub units: Option<String>,

    /// Human-readable description
    pub description: Option<String>,
}

impl Parameter {
    /// Create a new fixed parameter with the given CIF name and value.
    pub fn new(cif_name: &str, value: f64) -> Self {
        Self {
            cif_name: cif_name.to_string(),
            value,
            free: false,
            bounds: Bounds::default(),
            uncertainty: None,
            start_value: None,
            units: None,
            description: None,
        }
    }

    /// Create a new parameter with bounds. The initial value is clamped to
    /// lie within them.
    pub fn with_bounds(cif_name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);

        Ok(Self {
            cif_name: cif_name.to_string(),
            value,
            free: false,
            bounds,
            uncertainty: None,
            start_value: None,
            units: None,
            description: None,
        })
    }

    /// Set the units string, builder style.
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    /// Get the current value of the parameter.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter, rejecting values outside bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::Bounds(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Write a value produced by an optimizer onto the parameter.
    ///
    /// Backends keep their iterates within bounds, so no bounds check is
    /// performed here; finite-difference perturbations may sit marginally
    /// outside a boundary.
    pub(crate) fn assign(&mut self, value: f64) {
        self.value = value;
    }

    /// Check whether the parameter is refined during optimization.
    pub fn free(&self) -> bool {
        self.free
    }

    /// Set whether the parameter is refined during optimization.
    pub fn set_free(&mut self, free: bool) {
        self.free = free;
    }

    /// Get the bounds of the parameter.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Set the bounds for the parameter, clamping the current value into them.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);

        Ok(())
    }

    /// Get the standard uncertainty of the parameter, if a fit produced one.
    pub fn uncertainty(&self) -> Option<f64> {
        self.uncertainty
    }

    /// Set the standard uncertainty of the parameter.
    pub fn set_uncertainty(&mut self, uncertainty: Option<f64>) {
        self.uncertainty = uncertainty;
    }

    /// Get the value the parameter held when the most recent fit started.
    pub fn start_value(&self) -> Option<f64> {
        self.start_value
    }

    /// Snapshot the current value as the fit starting point.
    pub(crate) fn snapshot_start_value(&mut self) {
        self.start_value = Some(self.value);
    }

    /// Stable identifier derived from the CIF name, safe for backends that
    /// forbid punctuation in parameter identifiers.
    pub fn id(&self) -> String {
        sanitize_cif_name(&self.cif_name)
    }
}
