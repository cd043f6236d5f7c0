//! Terminal reporting for forecast runs.

pub mod format;

pub use format::*;
