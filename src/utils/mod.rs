//! Numerical utilities shared by the minimizer backends.

pub mod finite_difference;
pub mod matrix_convert;
