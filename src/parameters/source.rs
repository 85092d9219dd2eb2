//! Parameter source trait
//!
//! Every domain component that owns refinable parameters implements
//! [`ParameterSource`], exposing them in fixed declaration order. Collection
//! is therefore explicit and deterministic: no attribute scanning, no
//! reflection, just typed fields listed by the component itself.

use crate::parameters::parameter::Parameter;

/// A domain component that owns refinable parameters.
pub trait ParameterSource {
    /// CIF category of this component, e.g. `_cell` or `_atom_site['Pb']`.
    fn cif_category_name(&self) -> String;

    /// All owned parameters in declaration order, free or not.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Mutable access to the same parameters, in the same order.
    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;
}
