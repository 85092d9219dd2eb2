//! Free parameter collection
//!
//! At the start of each fit the engine walks every sample model and every
//! experiment, extracting the parameters marked free in deterministic order:
//! sample models before experiments, insertion order within each collection,
//! declaration order within each component. Optimizer vectors are positional,
//! so this order must round-trip unambiguously back onto the same parameters.

use crate::error::{RefineError, Result};
use crate::experiment::Experiments;
use crate::model::SampleModels;
use crate::parameters::{sanitize_cif_name, Parameter};
use ndarray::Array1;
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of one free parameter taken at collection time.
#[derive(Debug, Clone, Serialize)]
pub struct FreeParam {
    /// Sanitized unique identifier (block + category + CIF name), safe for
    /// backends that forbid punctuation in parameter names.
    pub id: String,

    /// Id of the owning sample model or experiment.
    pub block: String,

    /// Full CIF-style name, e.g. `_cell.length_a`.
    pub name: String,

    /// Parameter value at collection time (the fit starting point).
    pub start: f64,

    /// Lower bound (may be -inf).
    pub min: f64,

    /// Upper bound (may be +inf).
    pub max: f64,
}

/// Ordered set of free parameters assembled fresh for one fit.
///
/// Keeps a bidirectional mapping between sanitized backend identifiers and
/// vector positions so results can be synchronized back regardless of
/// backend-side name handling.
#[derive(Debug, Clone, Serialize)]
pub struct FreeParameterSet {
    params: Vec<FreeParam>,
    index_by_id: HashMap<String, usize>,
}

impl FreeParameterSet {
    /// Walk the sample models and experiments and collect every free
    /// parameter. Fails if two distinct parameters sanitize to the same
    /// identifier (a silent collision would corrupt result synchronization).
    pub fn collect(models: &SampleModels, experiments: &Experiments) -> Result<Self> {
        let mut params = Vec::new();
        let mut index_by_id = HashMap::new();

        let mut push = |block: &str, category: String, p: &Parameter| -> Result<()> {
            let name = format!("{}.{}", category, p.cif_name);
            let id = sanitize_cif_name(&format!("{}_{}", block, name));

            if index_by_id.insert(id.clone(), params.len()).is_some() {
                return Err(RefineError::Configuration(format!(
                    "parameter id collision after sanitization: '{}'",
                    id
                )));
            }

            params.push(FreeParam {
                id,
                block: block.to_string(),
                name,
                start: p.value(),
                min: p.bounds().min,
                max: p.bounds().max,
            });
            Ok(())
        };

        for model in models.iter() {
            for component in model.components() {
                let category = component.cif_category_name();
                for p in component.parameters() {
                    if p.free() {
                        push(&model.id, category.clone(), p)?;
                    }
                }
            }
        }

        for experiment in experiments.iter() {
            for component in experiment.components() {
                let category = component.cif_category_name();
                for p in component.parameters() {
                    if p.free() {
                        push(&experiment.id, category.clone(), p)?;
                    }
                }
            }
        }

        Ok(Self {
            params,
            index_by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FreeParam> {
        self.params.iter()
    }

    pub fn get(&self, index: usize) -> Option<&FreeParam> {
        self.params.get(index)
    }

    /// Vector position of the parameter with the given sanitized id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Initial parameter vector, one entry per free parameter.
    pub fn initial_values(&self) -> Array1<f64> {
        Array1::from_iter(self.params.iter().map(|p| p.start))
    }

    /// Lower bounds aligned with the parameter vector.
    pub fn lower_bounds(&self) -> Array1<f64> {
        Array1::from_iter(self.params.iter().map(|p| p.min))
    }

    /// Upper bounds aligned with the parameter vector.
    pub fn upper_bounds(&self) -> Array1<f64> {
        Array1::from_iter(self.params.iter().map(|p| p.max))
    }

    /// Clamp a parameter vector into the bounds, entry by entry.
    pub fn clamp(&self, values: &Array1<f64>) -> Array1<f64> {
        Array1::from_iter(
            values
                .iter()
                .zip(self.params.iter())
                .map(|(&v, p)| v.max(p.min).min(p.max)),
        )
    }
}

/// Mutable references to the currently free parameters, in the same order as
/// [`FreeParameterSet::collect`] produces. Used to synchronize an optimizer
/// vector back onto the live model objects.
pub fn free_parameters_mut<'a>(
    models: &'a mut SampleModels,
    experiments: &'a mut Experiments,
) -> Vec<&'a mut Parameter> {
    let mut out = Vec::new();

    for model in models.iter_mut() {
        for component in model.components_mut() {
            for p in component.parameters_mut() {
                if p.free() {
                    out.push(p);
                }
            }
        }
    }

    for experiment in experiments.iter_mut() {
        for component in experiment.components_mut() {
            for p in component.parameters_mut() {
                if p.free() {
                    out.push(p);
                }
            }
        }
    }

    out
}
