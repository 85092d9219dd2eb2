//! Space group component
//!
//! Space-group settings are informational for the engine: symmetry never
//! enters the optimization vector, so both fields are descriptors.

use crate::parameters::{Descriptor, Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// Space group of a sample model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceGroup {
    /// Hermann-Mauguin symbol
    pub name: Descriptor<String>,

    /// International Tables number
    pub number: Descriptor<i32>,
}

impl Default for SpaceGroup {
    fn default() -> Self {
        Self {
            name: Descriptor::new("name_H-M_alt", "P 1".to_string()),
            number: Descriptor::new("IT_number", 1),
        }
    }
}

impl SpaceGroup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParameterSource for SpaceGroup {
    fn cif_category_name(&self) -> String {
        "_space_group".to_string()
    }

    fn parameters(&self) -> Vec<&Parameter> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        Vec::new()
    }
}
