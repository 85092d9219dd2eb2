//! Unit cell component

use crate::parameters::{Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// Unit cell parameters of a sample model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub length_a: Parameter,
    pub length_b: Parameter,
    pub length_c: Parameter,
    pub angle_alpha: Parameter,
    pub angle_beta: Parameter,
    pub angle_gamma: Parameter,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            length_a: Parameter::new("length_a", 10.0).with_units("Å"),
            length_b: Parameter::new("length_b", 10.0).with_units("Å"),
            length_c: Parameter::new("length_c", 10.0).with_units("Å"),
            angle_alpha: Parameter::new("angle_alpha", 90.0).with_units("deg"),
            angle_beta: Parameter::new("angle_beta", 90.0).with_units("deg"),
            angle_gamma: Parameter::new("angle_gamma", 90.0).with_units("deg"),
        }
    }
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParameterSource for Cell {
    fn cif_category_name(&self) -> String {
        "_cell".to_string()
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![
            &self.length_a,
            &self.length_b,
            &self.length_c,
            &self.angle_alpha,
            &self.angle_beta,
            &self.angle_gamma,
        ]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.length_a,
            &mut self.length_b,
            &mut self.length_c,
            &mut self.angle_alpha,
            &mut self.angle_beta,
            &mut self.angle_gamma,
        ]
    }
}
