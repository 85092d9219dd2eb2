//! Parameter system for the refinement engine
//!
//! This module provides the atomic value boxes of the engine: [`Parameter`]
//! (refinable, with bounds and post-fit uncertainty), [`Descriptor`]
//! (informational, never refinable), and the [`ParameterSource`] trait that
//! domain components implement so the collector can walk them in
//! deterministic order.

pub mod bounds;
pub mod parameter;
pub mod source;

pub use bounds::{Bounds, BoundsError};
pub use parameter::{sanitize_cif_name, Descriptor, Parameter, ParameterError};
pub use source::ParameterSource;
