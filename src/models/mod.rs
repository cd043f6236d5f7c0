//! Regression design: regressors, feature sets and design rows.
//!
//! Kept as small, pure functions so fitting and simulation code can stay generic.

pub mod design;

pub use design::*;
